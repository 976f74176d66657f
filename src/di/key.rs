use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A resolved value stored in the container.
///
/// A value representing `T` holds exactly `T`; trait objects are stored as
/// `Arc<dyn Trait>` inside the outer `Arc`.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Identifier of a binding: either a string namespace or a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Namespace(String),
    Type { id: TypeId, name: &'static str },
}

impl Key {
    /// The type key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Key::Namespace(ns) => Some(ns),
            Key::Type { .. } => None,
        }
    }

    /// Applies `prefix` to namespace keys. Type keys are returned untouched.
    pub fn compile(self, prefix: Option<&str>) -> Self {
        match self {
            Key::Namespace(ns) => Key::Namespace(compile_namespace(&ns, prefix)),
            other => other,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Namespace(ns) => f.write_str(ns),
            Key::Type { name, .. } => write!(f, "type {name}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Namespace(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Namespace(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Namespace(value.clone())
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

/// Builds the full namespace for `id`.
///
/// A leading `/` marks an absolute namespace: the slash is stripped and the
/// prefix ignored.
pub fn compile_namespace(id: &str, prefix: Option<&str>) -> String {
    if let Some(absolute) = id.strip_prefix('/') {
        return absolute.to_string();
    }
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix.trim_end_matches('/'), id),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn test_compile_namespace() {
        assert_eq!(compile_namespace("Foo", Some("App")), "App/Foo");
        assert_eq!(compile_namespace("/Foo", Some("App")), "Foo");
        assert_eq!(compile_namespace("Foo", None), "Foo");
        assert_eq!(compile_namespace("Foo", Some("App/")), "App/Foo");
    }

    #[test]
    fn test_display_distinguishes_types() {
        assert_eq!(Key::from("App/Foo").to_string(), "App/Foo");
        let key = Key::of::<Marker>();
        assert!(key.to_string().starts_with("type "));
        assert!(key.to_string().ends_with("Marker"));
    }

    #[test]
    fn test_type_keys_ignore_prefix() {
        let key = Key::of::<Marker>();
        assert_eq!(key.clone().compile(Some("App")), key);
    }
}
