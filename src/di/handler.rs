use super::key::Value;
use super::Container;
use crate::error::Result;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Produces the value for a parameter or property.
pub type Resolver = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

/// Where a handler applies.
///
/// - constructor parameter: `member: None, index: Some(i)`
/// - method parameter: `member: Some(method), index: Some(i)`
/// - property: `member: Some(property), index: None`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub target: TypeId,
    pub member: Option<String>,
    pub index: Option<usize>,
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: DashMap<HandlerKey, Resolver>,
}

impl HandlerRegistry {
    pub(crate) fn register(&self, key: HandlerKey, resolver: Resolver) {
        self.handlers.insert(key, resolver);
    }

    pub(crate) fn parameter(
        &self,
        target: TypeId,
        member: Option<&str>,
        index: usize,
    ) -> Option<Resolver> {
        let key = HandlerKey {
            target,
            member: member.map(str::to_string),
            index: Some(index),
        };
        self.handlers.get(&key).map(|resolver| Arc::clone(resolver.value()))
    }

    /// Property handlers declared on any of `targets`, sorted by property name.
    pub(crate) fn properties(&self, targets: &[TypeId]) -> Vec<(String, Resolver)> {
        let mut found: Vec<(String, Resolver)> = self
            .handlers
            .iter()
            .filter(|item| item.key().index.is_none() && targets.contains(&item.key().target))
            .filter_map(|item| {
                item.key()
                    .member
                    .clone()
                    .map(|property| (property, Arc::clone(item.value())))
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    pub(crate) fn clear(&self) {
        self.handlers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    struct Other;

    fn resolver() -> Resolver {
        Arc::new(|_| Ok(Arc::new(1u8) as Value))
    }

    #[test]
    fn test_parameter_and_property_keys_are_distinct() {
        let registry = HandlerRegistry::default();
        registry.register(
            HandlerKey {
                target: TypeId::of::<Base>(),
                member: None,
                index: Some(0),
            },
            resolver(),
        );
        registry.register(
            HandlerKey {
                target: TypeId::of::<Base>(),
                member: Some("logger".into()),
                index: None,
            },
            resolver(),
        );

        assert!(registry.parameter(TypeId::of::<Base>(), None, 0).is_some());
        assert!(registry.parameter(TypeId::of::<Base>(), None, 1).is_none());
        assert!(registry.parameter(TypeId::of::<Base>(), Some("logger"), 0).is_none());

        let properties = registry.properties(&[TypeId::of::<Base>()]);
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].0, "logger");
        assert!(registry.properties(&[TypeId::of::<Other>()]).is_empty());
    }
}
