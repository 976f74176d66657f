use super::key::Key;
use strum_macros::{Display, EnumString};

/// How an identifier was classified by [`Container::lookup`](super::Container::lookup).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LookupKind {
    Binding,
    Autoload,
}

/// Result of classifying an identifier.
///
/// `key` is the identifier the node resolves through: for aliases this is the
/// final target of the alias chain, not the alias itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupNode {
    pub kind: LookupKind,
    pub key: Key,
}

impl LookupNode {
    pub fn binding(key: Key) -> Self {
        Self {
            kind: LookupKind::Binding,
            key,
        }
    }

    pub fn autoload(key: Key) -> Self {
        Self {
            kind: LookupKind::Autoload,
            key,
        }
    }
}
