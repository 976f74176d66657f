use super::binding::Arguments;
use super::injector::Injector;
use super::key::{Key, Value};
use super::lazy::Lazy;
use super::Container;
use crate::error::{KeystoneError, Result};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Trait for types the injector can construct.
///
/// This trait is typically implemented via `#[derive(Injectable)]`, which reads
/// the dependency list off the struct's fields.
///
/// # Example
/// ```
/// use keystone::{Arguments, Dependency, Injectable, Result};
/// use std::sync::Arc;
///
/// pub struct Mailer;
///
/// impl Injectable for Mailer {
///     fn dependencies() -> Vec<Dependency> {
///         Vec::new()
///     }
///
///     fn construct(_: Arguments) -> Result<Self> {
///         Ok(Mailer)
///     }
/// }
///
/// pub struct SignupService {
///     mailer: Arc<Mailer>,
/// }
///
/// impl Injectable for SignupService {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::injected::<Mailer>()]
///     }
///
///     fn construct(args: Arguments) -> Result<Self> {
///         Ok(Self { mailer: args.get::<Mailer>(0)? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor dependencies in position order.
    ///
    /// An empty list means the type has no dependencies.
    fn dependencies() -> Vec<Dependency>;

    /// Builds the value from resolved (or caller supplied) arguments.
    fn construct(args: Arguments) -> Result<Self>;

    /// Types whose property handlers also apply to this type.
    fn supertypes() -> Vec<TypeId> {
        Vec::new()
    }

    /// Assigns a value produced by a property handler.
    fn inject_property(&mut self, property: &str, value: Value) -> Result<()> {
        let _ = value;
        Err(KeystoneError::UnknownProperty {
            owner: std::any::type_name::<Self>().to_string(),
            property: property.to_string(),
        })
    }
}

type BuildFn = fn(&mut Injector<'_>) -> Result<Value>;
type ContractFn = fn(&Container) -> Result<Value>;
type ForwardFn = fn(&Container) -> Value;

#[derive(Clone)]
pub(crate) enum DependencyKind {
    Injected { key: Key, build: BuildFn },
    Lookup(Key),
    Namespace(String),
    Contract { key: Key, resolve: ContractFn },
    Forward { key: Key, create: ForwardFn },
    Literal { type_name: &'static str },
}

/// One declared parameter of a constructor or method.
#[derive(Clone)]
pub struct Dependency {
    pub(crate) kind: DependencyKind,
}

impl Dependency {
    /// Looked up by type, constructed through the injector when unbound.
    pub fn injected<T: Injectable>() -> Self {
        Self {
            kind: DependencyKind::Injected {
                key: Key::of::<T>(),
                build: build_injected::<T>,
            },
        }
    }

    /// Resolved from the container by type only.
    pub fn lookup<T: Send + Sync + 'static>() -> Self {
        Self {
            kind: DependencyKind::Lookup(Key::of::<T>()),
        }
    }

    /// Resolved from the container by namespace.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            kind: DependencyKind::Namespace(namespace.into()),
        }
    }

    /// A trait object resolved through [`Container::resolve_trait`].
    pub fn contract<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            kind: DependencyKind::Contract {
                key: Key::of::<T>(),
                resolve: resolve_contract::<T>,
            },
        }
    }

    /// A [`Lazy`] reference, resolved on first access.
    pub fn forward<T: Injectable>() -> Self {
        Self {
            kind: DependencyKind::Forward {
                key: Key::of::<T>(),
                create: create_forward::<T>,
            },
        }
    }

    /// A plain value the container cannot infer; must be passed by the caller.
    pub fn literal<T: 'static>() -> Self {
        Self {
            kind: DependencyKind::Literal {
                type_name: std::any::type_name::<T>(),
            },
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.kind, DependencyKind::Forward { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, DependencyKind::Literal { .. })
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DependencyKind::Injected { key, .. } => write!(f, "Injected({key})"),
            DependencyKind::Lookup(key) => write!(f, "Lookup({key})"),
            DependencyKind::Namespace(ns) => write!(f, "Namespace({ns})"),
            DependencyKind::Contract { key, .. } => write!(f, "Contract({key})"),
            DependencyKind::Forward { key, .. } => write!(f, "Forward({key})"),
            DependencyKind::Literal { type_name } => write!(f, "Literal({type_name})"),
        }
    }
}

fn build_injected<T: Injectable>(injector: &mut Injector<'_>) -> Result<Value> {
    injector.memoized::<T>()
}

fn resolve_contract<T: ?Sized + Send + Sync + 'static>(container: &Container) -> Result<Value> {
    container
        .resolve_trait::<T>()
        .map(|instance| Arc::new(instance) as Value)
}

fn create_forward<T: Injectable>(container: &Container) -> Value {
    Arc::new(Lazy::<T>::new(container))
}

/// Declared parameters of a method, used by [`Container::call_method`].
#[derive(Clone, Debug)]
pub struct MethodSignature {
    pub(crate) owner: TypeId,
    pub(crate) owner_name: &'static str,
    pub(crate) name: &'static str,
    pub(crate) params: Vec<Dependency>,
}

impl MethodSignature {
    pub fn of<T: 'static>(name: &'static str, params: Vec<Dependency>) -> Self {
        Self {
            owner: TypeId::of::<T>(),
            owner_name: std::any::type_name::<T>(),
            name,
            params,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }
}
