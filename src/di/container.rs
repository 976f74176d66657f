use super::autoload::{self, AutoloadEntry, AutoloadTable, Loader, ModuleCache};
use super::binding::{downcast, Arguments, Binding};
use super::handler::{HandlerKey, HandlerRegistry};
use super::injectable::{Injectable, MethodSignature};
use super::injector::Injector;
use super::key::{Key, Value};
use super::lookup::{LookupKind, LookupNode};
use super::proxy::{FakeFactory, FakeRegistry, Proxy};
use crate::error::{KeystoneError, Result};
use dashmap::DashMap;
use std::any::TypeId;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Converts an implementation value into an `Arc<dyn Trait>` value.
type CasterFn = Arc<dyn Fn(Value) -> Option<Value> + Send + Sync>;

#[derive(Default)]
struct Registry {
    bindings: DashMap<Key, Binding>,
    aliases: DashMap<String, Key>,
    autoloads: AutoloadTable,
    instances: DashMap<Key, Value>,
    lookups: DashMap<Key, LookupNode>,
    modules: ModuleCache,
    trait_mappings: DashMap<TypeId, Key>,
    casters: DashMap<TypeId, CasterFn>,
    handlers: HandlerRegistry,
    fakes: FakeRegistry,
    proxies: AtomicBool,
    /// Keys whose factories are running, per resolving thread.
    resolving: DashMap<ThreadId, Vec<Key>>,
}

/// Marks `key` as being resolved on the current thread until dropped.
struct InFlight<'r> {
    registry: &'r Registry,
    thread: ThreadId,
}

impl<'r> InFlight<'r> {
    fn enter(registry: &'r Registry, key: &Key) -> Result<Self> {
        let thread = thread::current().id();
        let mut stack = registry.resolving.entry(thread).or_default();
        if let Some(start) = stack.iter().position(|active| active == key) {
            let mut cycle: Vec<String> = stack[start..].iter().map(Key::to_string).collect();
            cycle.push(key.to_string());
            return Err(KeystoneError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }
        stack.push(key.clone());
        Ok(Self { registry, thread })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mut stack) = self.registry.resolving.get_mut(&self.thread) {
            stack.pop();
        }
        self.registry
            .resolving
            .remove_if(&self.thread, |_, stack| stack.is_empty());
    }
}

/// Dependency injection container.
///
/// `Container` is a handle: clones share the same registry, so a clone can be
/// handed to factories, forward references and services freely.
///
/// Resolution classifies an identifier first ([`Container::lookup`]): an
/// explicit binding, then an alias chain, then an autoload prefix, then a
/// registered instance.
#[derive(Clone, Default)]
pub struct Container {
    registry: Arc<Registry>,
}

/// Non-owning handle to a [`Container`].
#[derive(Clone)]
pub struct WeakContainer {
    registry: Weak<Registry>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.registry.upgrade().map(|registry| Container { registry })
    }
}

fn validate(key: &Key) -> Result<()> {
    match key {
        Key::Namespace(ns) if ns.trim().is_empty() => Err(KeystoneError::InvalidBinding {
            message: "identifier cannot be empty".into(),
        }),
        _ => Ok(()),
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Registers a factory invoked on every resolution.
    pub fn bind<T, F>(&self, key: impl Into<Key>, factory: F) -> Result<&Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.insert_binding(key.into(), Binding::new(factory, false))
    }

    /// Registers a factory whose first result is cached.
    pub fn singleton<T, F>(&self, key: impl Into<Key>, factory: F) -> Result<&Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.insert_binding(key.into(), Binding::new(factory, true))
    }

    /// Binds `key` to constructor injection of `T`.
    ///
    /// Arguments passed at resolution time are forwarded to the injector.
    pub fn bind_injectable<T: Injectable>(&self, key: impl Into<Key>, singleton: bool) -> Result<&Self> {
        let factory = |container: &Container, args: &Arguments| {
            container.construct::<T>(args.values().to_vec())
        };
        self.insert_binding(key.into(), Binding::new(factory, singleton))
    }

    fn insert_binding(&self, key: Key, binding: Binding) -> Result<&Self> {
        validate(&key)?;
        tracing::debug!(key = %key, singleton = binding.singleton, "Binding");
        self.registry.instances.remove(&key);
        self.registry.bindings.insert(key, binding);
        self.registry.lookups.clear();
        Ok(self)
    }

    /// Registers an already constructed value.
    pub fn instance<T: Send + Sync + 'static>(&self, key: impl Into<Key>, value: T) -> Result<&Self> {
        self.instance_value(key, Arc::new(value))
    }

    pub fn instance_value(&self, key: impl Into<Key>, value: Value) -> Result<&Self> {
        let key = key.into();
        validate(&key)?;
        tracing::debug!(key = %key, "Registering instance");
        self.registry.instances.insert(key, value);
        self.registry.lookups.clear();
        Ok(self)
    }

    /// Makes `alias` resolve to whatever `key` resolves to.
    pub fn alias(&self, key: impl Into<Key>, alias: &str) -> Result<&Self> {
        let key = key.into();
        validate(&key)?;
        validate(&Key::from(alias))?;
        tracing::debug!(key = %key, alias, "Aliasing");
        self.registry.aliases.insert(alias.to_string(), key);
        self.registry.lookups.clear();

        // A fake registered under the bare name now belongs to the target.
        let name = Key::from(alias);
        let target = self.canonical(name.clone());
        if target != name {
            self.registry.fakes.rekey(&name, target);
        }
        Ok(self)
    }

    /// Maps a trait object type to an implementation key.
    ///
    /// `Impl` is resolved through the container when the trait is requested,
    /// then converted with `caster_fn`.
    pub fn bind_trait<Trait, Impl, F>(&self, caster_fn: F) -> &Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        let trait_id = TypeId::of::<Trait>();
        self.registry.trait_mappings.insert(trait_id, Key::of::<Impl>());

        let caster: CasterFn = Arc::new(move |instance: Value| {
            let concrete = instance.downcast::<Impl>().ok()?;
            let trait_obj: Arc<Trait> = caster_fn(concrete);
            Some(Arc::new(trait_obj) as Value)
        });
        self.registry.casters.insert(trait_id, caster);
        self
    }

    /// Registers a prefix whose keys are loaded from JSON files in `directory`.
    pub fn autoload(&self, directory: impl Into<PathBuf>, prefix: &str) -> Result<&Self> {
        self.register_autoload(directory.into(), prefix, None)
    }

    /// Registers a prefix whose keys are loaded by `loader`.
    pub fn autoload_with<F>(&self, directory: impl Into<PathBuf>, prefix: &str, loader: F) -> Result<&Self>
    where
        F: Fn(&Container, &Path) -> Result<Value> + Send + Sync + 'static,
    {
        let loader: Loader = Arc::new(loader);
        self.register_autoload(directory.into(), prefix, Some(loader))
    }

    fn register_autoload(&self, directory: PathBuf, prefix: &str, loader: Option<Loader>) -> Result<&Self> {
        validate(&Key::from(prefix))?;
        tracing::debug!(prefix, directory = %directory.display(), "Registering autoload");
        self.registry
            .autoloads
            .register(prefix, AutoloadEntry { directory, loader });
        self.registry.lookups.clear();
        Ok(self)
    }

    /// Drops every binding, alias, autoload prefix and instance.
    pub fn flush(&self) {
        tracing::debug!("Flushing container");
        self.registry.bindings.clear();
        self.registry.aliases.clear();
        self.registry.autoloads.clear();
        self.registry.instances.clear();
        self.registry.lookups.clear();
        self.registry.modules.clear();
    }

    /// Classifies `key`, applying `prefix` to namespaces.
    ///
    /// Returns `None` when the key is unknown.
    ///
    /// # Errors
    /// Fails when the key goes through a cyclic alias chain.
    pub fn lookup(&self, key: impl Into<Key>, prefix: Option<&str>) -> Result<Option<LookupNode>> {
        let key = key.into().compile(prefix);
        if let Some(node) = self.registry.lookups.get(&key) {
            return Ok(Some(node.clone()));
        }

        let node = self.classify(&key)?;
        if let Some(node) = &node {
            self.registry.lookups.insert(key, node.clone());
        }
        Ok(node)
    }

    fn classify(&self, key: &Key) -> Result<Option<LookupNode>> {
        if self.registry.bindings.contains_key(key) {
            return Ok(Some(LookupNode::binding(key.clone())));
        }
        if let Key::Namespace(ns) = key {
            if let Some(target) = self.alias_target(ns)? {
                if let Some(node) = self.classify(&target)? {
                    return Ok(Some(node));
                }
            }
            if self.registry.autoloads.matching(ns).is_some() {
                return Ok(Some(LookupNode::autoload(key.clone())));
            }
        }
        if self.registry.instances.contains_key(key) {
            return Ok(Some(LookupNode::binding(key.clone())));
        }
        Ok(None)
    }

    /// Follows the alias chain starting at `alias` to its final target.
    ///
    /// The chain stops early at a key that has its own binding.
    pub fn alias_target(&self, alias: &str) -> Result<Option<Key>> {
        let Some(mut current) = self.registry.aliases.get(alias).map(|target| target.clone()) else {
            return Ok(None);
        };
        let mut seen = vec![alias.to_string()];

        loop {
            let next = match current.namespace() {
                Some(next) => next.to_string(),
                None => return Ok(Some(current)),
            };
            if self.registry.bindings.contains_key(&current) {
                return Ok(Some(current));
            }
            if seen.contains(&next) {
                return Err(KeystoneError::AliasCycle { alias: next });
            }
            let Some(target) = self.registry.aliases.get(&next).map(|t| t.clone()) else {
                return Ok(Some(current));
            };
            seen.push(next);
            current = target;
        }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.registry.aliases.contains_key(name)
    }

    /// Whether `key` falls under a registered autoload prefix, bound or not.
    pub fn is_autoload_namespace(&self, key: impl Into<Key>) -> bool {
        match key.into() {
            Key::Namespace(ns) => self.registry.autoloads.matching(&ns).is_some(),
            Key::Type { .. } => false,
        }
    }

    /// Whether `key` can be classified. Alias cycles count as unknown.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        matches!(self.lookup(key, None), Ok(Some(_)))
    }

    /// Resolves a classified node.
    pub fn resolve_node(&self, node: &LookupNode, args: &Arguments) -> Result<Value> {
        match node.kind {
            LookupKind::Binding => self.resolve_binding(&node.key, args),
            LookupKind::Autoload => self.resolve_autoload(&node.key),
        }
    }

    fn resolve_binding(&self, key: &Key, args: &Arguments) -> Result<Value> {
        if args.is_empty() {
            if let Some(instance) = self.registry.instances.get(key) {
                tracing::trace!(key = %key, "Using cached instance");
                return Ok(Arc::clone(instance.value()));
            }
        }

        let binding = self
            .registry
            .bindings
            .get(key)
            .map(|binding| binding.clone())
            .ok_or_else(|| KeystoneError::binding_not_found(key))?;

        let in_flight = InFlight::enter(&self.registry, key)?;
        tracing::trace!(key = %key, "Invoking factory");
        let value = (binding.factory)(self, args);
        drop(in_flight);
        let value = value?;
        if binding.singleton {
            self.registry.instances.insert(key.clone(), Arc::clone(&value));
        }
        Ok(value)
    }

    fn resolve_autoload(&self, key: &Key) -> Result<Value> {
        let namespace = key
            .namespace()
            .ok_or_else(|| KeystoneError::binding_not_found(key))?;
        let found = self
            .registry
            .autoloads
            .matching(namespace)
            .ok_or_else(|| KeystoneError::binding_not_found(key))?;

        let path = autoload::locate(&found.entry.directory, &found.suffix)
            .ok_or_else(|| KeystoneError::binding_not_found(key))?;
        if let Some(loader) = &found.entry.loader {
            return loader(self, &path);
        }

        let document = self.registry.modules.load(namespace, &path)?;
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let export = autoload::unwrap_export(document, stem);

        if let serde_json::Value::String(target) = &export {
            if target != namespace && self.has(target.as_str()) {
                return self.make_key(target.as_str(), Vec::new());
            }
        }
        Ok(Arc::new(export))
    }

    /// Resolves `key` without arguments.
    pub fn resolve_any(&self, key: impl Into<Key>) -> Result<Value> {
        self.make_key(key, Vec::new())
    }

    /// Resolves `key` and downcasts the value to `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> Result<Arc<T>> {
        let key = key.into();
        let value = self.resolve_any(&key)?;
        downcast(&key, value)
    }

    /// Resolves the binding registered under `T`'s type key.
    pub fn resolve_type<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve(Key::of::<T>())
    }

    /// Resolves `key`, passing `args` to its factory.
    pub fn make_key(&self, key: impl Into<Key>, args: Vec<Value>) -> Result<Value> {
        let key = key.into();
        let node = self
            .lookup(&key, None)?
            .ok_or_else(|| KeystoneError::binding_not_found(&key))?;
        self.resolve_node(&node, &Arguments::new(args))
    }

    /// Resolves `T` through its binding when one exists, otherwise constructs
    /// it with the injector.
    pub fn make<T: Injectable>(&self, args: Vec<Value>) -> Result<Arc<T>> {
        let key = Key::of::<T>();
        match self.lookup(&key, None)? {
            Some(node) => {
                let value = self.resolve_node(&node, &Arguments::new(args))?;
                downcast(&key, value)
            }
            None => self.construct::<T>(args).map(Arc::new),
        }
    }

    /// Constructs a new `T` with a fresh injector, ignoring bindings for `T`.
    pub fn construct<T: Injectable>(&self, args: Vec<Value>) -> Result<T> {
        Injector::new(self).inject::<T>(args)
    }

    /// Calls `f` with the parameters of `signature` resolved.
    pub fn call_method<R>(
        &self,
        signature: &MethodSignature,
        runtime: Vec<Value>,
        f: impl FnOnce(Arguments) -> Result<R>,
    ) -> Result<R> {
        Injector::new(self).call(signature, runtime, f)
    }

    /// Resolves a trait object.
    ///
    /// A value registered under the trait's own type key wins; otherwise the
    /// implementation mapped by [`Container::bind_trait`] is resolved and cast.
    pub fn resolve_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let trait_key = Key::of::<T>();
        if let Some(node) = self.lookup(&trait_key, None)? {
            let value = self.resolve_node(&node, &Arguments::default())?;
            return downcast::<Arc<T>>(&trait_key, value).map(|wrapper| Arc::clone(&*wrapper));
        }

        let trait_id = TypeId::of::<T>();
        let impl_key = self
            .registry
            .trait_mappings
            .get(&trait_id)
            .map(|key| key.clone())
            .ok_or_else(|| KeystoneError::binding_not_found(&trait_key))?;
        let caster = self
            .registry
            .casters
            .get(&trait_id)
            .map(|caster| Arc::clone(caster.value()))
            .ok_or_else(|| KeystoneError::binding_not_found(&trait_key))?;

        let instance = self.resolve_any(&impl_key)?;
        let cast = caster(instance).ok_or_else(|| KeystoneError::downcast_failed::<T>(&impl_key))?;
        downcast::<Arc<T>>(&trait_key, cast).map(|wrapper| Arc::clone(&*wrapper))
    }

    /// Calls `callback` with the resolved values only when every key is known.
    pub fn with<K, R>(
        &self,
        keys: impl IntoIterator<Item = K>,
        callback: impl FnOnce(Vec<Value>) -> R,
    ) -> Result<Option<R>>
    where
        K: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            if self.lookup(key, None)?.is_none() {
                return Ok(None);
            }
        }
        let values = keys
            .iter()
            .map(|key| self.resolve_any(key))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(callback(values)))
    }

    /// Supplies constructor parameter `index` of `T`.
    pub fn register_parameter_resolver<T: 'static, F>(&self, index: usize, resolver: F) -> &Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_handler(TypeId::of::<T>(), None, Some(index), resolver)
    }

    /// Supplies parameter `index` of `T::method`.
    pub fn register_method_resolver<T: 'static, F>(&self, method: &str, index: usize, resolver: F) -> &Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_handler(TypeId::of::<T>(), Some(method), Some(index), resolver)
    }

    /// Assigns `property` on every constructed `T` (or subtype declaring `T`
    /// among its supertypes).
    pub fn register_property_handler<T: 'static, F>(&self, property: &str, resolver: F) -> &Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_handler(TypeId::of::<T>(), Some(property), None, resolver)
    }

    fn register_handler<F>(&self, target: TypeId, member: Option<&str>, index: Option<usize>, resolver: F) -> &Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        let key = HandlerKey {
            target,
            member: member.map(str::to_string),
            index,
        };
        self.registry.handlers.register(key, Arc::new(resolver));
        self
    }

    pub fn clear_handlers(&self) {
        self.registry.handlers.clear();
    }

    pub(crate) fn handlers(&self) -> &HandlerRegistry {
        &self.registry.handlers
    }

    pub(crate) fn fakes(&self) -> &FakeRegistry {
        &self.registry.fakes
    }

    fn canonical(&self, key: Key) -> Key {
        match &key {
            Key::Namespace(ns) => match self.alias_target(ns) {
                Ok(Some(target)) => target,
                _ => key,
            },
            Key::Type { .. } => key,
        }
    }

    /// Replaces `key` for every live proxy until [`Container::restore`].
    ///
    /// The factory runs once, on first use of the fake. Aliases are followed
    /// at registration; a fake registered under a name that is aliased later
    /// moves to the alias target when [`Container::alias`] runs.
    pub fn fake<T, F>(&self, key: impl Into<Key>, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let key = self.canonical(key.into());
        tracing::debug!(key = %key, "Faking");
        let factory: FakeFactory =
            Arc::new(move |container| factory(container).map(|value| Arc::new(value) as Value));
        self.registry.fakes.register(key, factory);
        self
    }

    pub fn restore(&self, key: impl Into<Key>) -> &Self {
        let key = self.canonical(key.into());
        if self.registry.fakes.remove(&key) {
            tracing::debug!(key = %key, "Restored fake");
        }
        self
    }

    pub fn has_fake(&self, key: impl Into<Key>) -> bool {
        let key = self.canonical(key.into());
        self.registry.fakes.contains(&key)
    }

    /// The fake registered for `key`.
    pub fn fake_value(&self, key: impl Into<Key>) -> Result<Value> {
        let key = self.canonical(key.into());
        self.registry
            .fakes
            .value(&key, self)?
            .ok_or_else(|| KeystoneError::FakeNotFound { id: key.to_string() })
    }

    /// The fake registered for `key`, or `fallback`.
    pub fn use_fake(&self, key: impl Into<Key>, fallback: Value) -> Result<Value> {
        let key = self.canonical(key.into());
        Ok(self.registry.fakes.value(&key, self)?.unwrap_or(fallback))
    }

    /// Turns proxy mode on or off for proxies created afterwards.
    pub fn use_proxies(&self, enable: bool) -> &Self {
        self.registry.proxies.store(enable, Ordering::SeqCst);
        self
    }

    pub fn proxies_enabled(&self) -> bool {
        self.registry.proxies.load(Ordering::SeqCst)
    }

    /// Resolves `key` behind a [`Proxy`].
    pub fn proxy<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> Result<Proxy<T>> {
        let key = key.into();
        let node = self
            .lookup(&key, None)?
            .ok_or_else(|| KeystoneError::binding_not_found(&key))?;
        let value = self.resolve_node(&node, &Arguments::default())?;
        let original = downcast(&node.key, value)?;
        Ok(Proxy::new(node.key, original, self.clone(), self.proxies_enabled()))
    }

    /// Number of explicit bindings.
    pub fn len(&self) -> usize {
        self.registry.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.bindings.is_empty()
    }
}
