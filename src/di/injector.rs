use super::binding::Arguments;
use super::injectable::{Dependency, DependencyKind, Injectable, MethodSignature};
use super::key::Value;
use super::Container;
use crate::error::{KeystoneError, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructs [`Injectable`] types by resolving their declared dependencies.
///
/// One injector serves one top-level construction: dependencies built along
/// the way are memoized per type, so a type needed twice in the same graph is
/// built once.
pub struct Injector<'c> {
    container: &'c Container,
    constructed: HashMap<TypeId, Value>,
    resolving: Vec<(TypeId, &'static str)>,
}

impl<'c> Injector<'c> {
    pub fn new(container: &'c Container) -> Self {
        Self {
            container,
            constructed: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    pub fn container(&self) -> &'c Container {
        self.container
    }

    /// Builds a new `T`.
    ///
    /// When `runtime` holds at least as many values as `T` declares
    /// dependencies, it is used verbatim and nothing is resolved.
    pub fn inject<T: Injectable>(&mut self, runtime: Vec<Value>) -> Result<T> {
        let owner = std::any::type_name::<T>();
        let params = T::dependencies();

        let mut instance = if runtime.len() >= params.len() {
            tracing::trace!(owner, "Constructing from runtime arguments");
            T::construct(Arguments::for_owner(owner, runtime))?
        } else {
            let target = TypeId::of::<T>();
            self.enter(target, owner)?;
            let values = self.resolve_parameters(target, owner, None, &params, &runtime);
            self.resolving.pop();
            T::construct(Arguments::for_owner(owner, values?))?
        };

        self.apply_properties(&mut instance)?;
        Ok(instance)
    }

    /// Calls `f` with the resolved parameters of `signature`.
    pub fn call<R>(
        &mut self,
        signature: &MethodSignature,
        runtime: Vec<Value>,
        f: impl FnOnce(Arguments) -> Result<R>,
    ) -> Result<R> {
        let owner = format!("{}::{}", signature.owner_name, signature.name);
        let values = if runtime.len() >= signature.params.len() {
            runtime
        } else {
            self.resolve_parameters(
                signature.owner,
                &owner,
                Some(signature.name),
                &signature.params,
                &runtime,
            )?
        };
        f(Arguments::for_owner(owner, values))
    }

    pub(crate) fn memoized<T: Injectable>(&mut self) -> Result<Value> {
        let target = TypeId::of::<T>();
        if let Some(value) = self.constructed.get(&target) {
            return Ok(Arc::clone(value));
        }
        let value: Value = Arc::new(self.inject::<T>(Vec::new())?);
        self.constructed.insert(target, Arc::clone(&value));
        Ok(value)
    }

    fn enter(&mut self, target: TypeId, owner: &'static str) -> Result<()> {
        if let Some(start) = self.resolving.iter().position(|(id, _)| *id == target) {
            let mut cycle: Vec<&str> = self.resolving[start..].iter().map(|(_, name)| *name).collect();
            cycle.push(owner);
            return Err(KeystoneError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }
        self.resolving.push((target, owner));
        Ok(())
    }

    fn resolve_parameters(
        &mut self,
        target: TypeId,
        owner: &str,
        member: Option<&str>,
        params: &[Dependency],
        runtime: &[Value],
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(params.len());
        for (position, dependency) in params.iter().enumerate() {
            values.push(self.resolve_parameter(target, owner, member, position, dependency, runtime)?);
        }
        Ok(values)
    }

    fn resolve_parameter(
        &mut self,
        target: TypeId,
        owner: &str,
        member: Option<&str>,
        position: usize,
        dependency: &Dependency,
        runtime: &[Value],
    ) -> Result<Value> {
        if let Some(resolver) = self.container.handlers().parameter(target, member, position) {
            return resolver(self.container);
        }
        if !dependency.is_forward() {
            if let Some(value) = runtime.get(position) {
                return Ok(Arc::clone(value));
            }
        }

        match &dependency.kind {
            DependencyKind::Forward { create, .. } => Ok(create(self.container)),
            DependencyKind::Injected { key, build } => {
                if self.container.lookup(key, None)?.is_some() {
                    self.container.resolve_any(key)
                } else {
                    build(self)
                }
            }
            DependencyKind::Lookup(key) => self.container.resolve_any(key),
            DependencyKind::Namespace(namespace) => self.container.resolve_any(namespace.as_str()),
            DependencyKind::Contract { resolve, .. } => resolve(self.container),
            DependencyKind::Literal { type_name } => Err(KeystoneError::UninjectableParameter {
                owner: owner.to_string(),
                position,
                type_name: type_name.to_string(),
            }),
        }
    }

    fn apply_properties<T: Injectable>(&mut self, instance: &mut T) -> Result<()> {
        let mut targets = T::supertypes();
        targets.push(TypeId::of::<T>());

        for (property, resolver) in self.container.handlers().properties(&targets) {
            tracing::trace!(owner = std::any::type_name::<T>(), property, "Injecting property");
            let value = resolver(self.container)?;
            instance.inject_property(&property, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::value;

    struct Clock;

    impl Injectable for Clock {
        fn dependencies() -> Vec<Dependency> {
            Vec::new()
        }

        fn construct(_: Arguments) -> Result<Self> {
            Ok(Clock)
        }
    }

    struct Scheduler {
        clock: Arc<Clock>,
    }

    impl Injectable for Scheduler {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::injected::<Clock>()]
        }

        fn construct(args: Arguments) -> Result<Self> {
            Ok(Self { clock: args.get(0)? })
        }
    }

    struct Reporter {
        clock: Arc<Clock>,
        scheduler: Arc<Scheduler>,
    }

    impl Injectable for Reporter {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::injected::<Clock>(), Dependency::injected::<Scheduler>()]
        }

        fn construct(args: Arguments) -> Result<Self> {
            Ok(Self {
                clock: args.get(0)?,
                scheduler: args.get(1)?,
            })
        }
    }

    struct Greeting {
        name: String,
        clock: Arc<Clock>,
    }

    impl Injectable for Greeting {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::literal::<String>(), Dependency::injected::<Clock>()]
        }

        fn construct(args: Arguments) -> Result<Self> {
            Ok(Self {
                name: args.literal(0)?,
                clock: args.get(1)?,
            })
        }
    }

    #[allow(dead_code)]
    struct Ping {
        pong: Arc<Pong>,
    }

    #[allow(dead_code)]
    struct Pong {
        ping: Arc<Ping>,
    }

    impl Injectable for Ping {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::injected::<Pong>()]
        }

        fn construct(args: Arguments) -> Result<Self> {
            Ok(Self { pong: args.get(0)? })
        }
    }

    impl Injectable for Pong {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::injected::<Ping>()]
        }

        fn construct(args: Arguments) -> Result<Self> {
            Ok(Self { ping: args.get(0)? })
        }
    }

    #[test]
    fn test_shared_dependency_is_built_once_per_injector() {
        let container = Container::new();
        let reporter: Reporter = Injector::new(&container).inject(Vec::new()).unwrap();
        assert!(Arc::ptr_eq(&reporter.clock, &reporter.scheduler.clock));
    }

    #[test]
    fn test_runtime_argument_fills_literal_position() {
        let container = Container::new();
        let greeting: Greeting = Injector::new(&container)
            .inject(vec![value(String::from("ada"))])
            .unwrap();
        assert_eq!(greeting.name, "ada");
        let _ = &greeting.clock;
    }

    #[test]
    fn test_literal_without_argument_is_rejected() {
        let container = Container::new();
        let err = Injector::new(&container).inject::<Greeting>(Vec::new()).err().unwrap();
        match err {
            KeystoneError::UninjectableParameter { owner, position, .. } => {
                assert!(owner.ends_with("Greeting"));
                assert_eq!(position, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constructor_cycle_is_reported() {
        let container = Container::new();
        let err = Injector::new(&container).inject::<Ping>(Vec::new()).err().unwrap();
        match err {
            KeystoneError::CircularDependency { cycle } => {
                assert_eq!(cycle.matches("Ping").count(), 2);
                assert!(cycle.contains("Pong"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parameter_resolver_wins_over_lookup() {
        let container = Container::new();
        let replacement = Arc::new(Clock);
        let expected = Arc::clone(&replacement);
        container.register_parameter_resolver::<Scheduler, _>(0, move |_| {
            Ok(Arc::clone(&replacement) as Value)
        });

        let scheduler: Scheduler = container.construct(Vec::new()).unwrap();
        assert!(Arc::ptr_eq(&scheduler.clock, &expected));
    }

    #[test]
    fn test_method_call_resolves_parameters() {
        let container = Container::new();
        container.instance("App/Prefix", String::from(">> ")).unwrap();

        let signature = MethodSignature::of::<Reporter>(
            "render",
            vec![Dependency::namespace("App/Prefix"), Dependency::literal::<u32>()],
        );

        let err = container
            .call_method(&signature, Vec::new(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, KeystoneError::UninjectableParameter { position: 1, .. }));

        let rendered = container
            .call_method(&signature, vec![value(String::from("# ")), value(3u32)], |args| {
                Ok(format!("{}{}", args.get::<String>(0)?, args.get::<u32>(1)?))
            })
            .unwrap();
        assert_eq!(rendered, "# 3");

        container.register_method_resolver::<Reporter, _>("render", 1, |_| Ok(value(9u32)));
        let rendered = container
            .call_method(&signature, Vec::new(), |args| {
                Ok(format!("{}{}", args.get::<String>(0)?, args.get::<u32>(1)?))
            })
            .unwrap();
        assert_eq!(rendered, ">> 9");
    }
}
