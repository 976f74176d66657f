use super::key::Value;
use super::lazy::Lazy;
use super::Container;
use crate::error::{KeystoneError, Result};
use std::fmt::Display;
use std::sync::Arc;

/// Type-erased factory stored for a binding.
pub(crate) type Factory = Arc<dyn Fn(&Container, &Arguments) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) factory: Factory,
    pub(crate) singleton: bool,
}

impl Binding {
    pub(crate) fn new<T, F>(factory: F, singleton: bool) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |container, args| {
            factory(container, args).map(|value| Arc::new(value) as Value)
        });
        Self { factory, singleton }
    }
}

/// Wraps a plain value so it can be passed as a runtime argument.
pub fn value<T: Send + Sync + 'static>(value: T) -> Value {
    Arc::new(value)
}

/// Downcasts a container value, naming `id` in the error.
pub fn downcast<T: Send + Sync + 'static>(id: impl Display, value: Value) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| KeystoneError::downcast_failed::<T>(id))
}

/// Positional arguments handed to a factory or to `Injectable::construct`.
///
/// Arguments either come from the caller verbatim or are produced by the
/// injector from a dependency list, in declaration order.
#[derive(Clone, Default)]
pub struct Arguments {
    owner: String,
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            owner: String::from("factory"),
            values,
        }
    }

    pub(crate) fn for_owner(owner: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            owner: owner.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn required(&self, position: usize) -> Result<&Value> {
        self.values
            .get(position)
            .ok_or_else(|| KeystoneError::MissingArgument {
                owner: self.owner.clone(),
                position,
            })
    }

    fn label(&self, position: usize) -> String {
        format!("argument #{position} of {}", self.owner)
    }

    /// Shared value at `position`.
    pub fn get<T: Send + Sync + 'static>(&self, position: usize) -> Result<Arc<T>> {
        let value = self.required(position)?.clone();
        downcast(self.label(position), value)
    }

    /// Trait object at `position`, stored as `Arc<dyn Trait>`.
    pub fn contract<T: ?Sized + Send + Sync + 'static>(&self, position: usize) -> Result<Arc<T>> {
        let value = self.required(position)?.clone();
        value
            .downcast::<Arc<T>>()
            .map(|wrapper| Arc::clone(&*wrapper))
            .map_err(|_| KeystoneError::downcast_failed::<Arc<T>>(self.label(position)))
    }

    /// Owned copy of a literal argument.
    pub fn literal<T: Clone + Send + Sync + 'static>(&self, position: usize) -> Result<T> {
        let shared = self.get::<T>(position)?;
        Ok(Arc::unwrap_or_clone(shared))
    }

    /// Forward reference at `position`.
    pub fn lazy<T: Send + Sync + 'static>(&self, position: usize) -> Result<Lazy<T>> {
        self.get::<Lazy<T>>(position).map(|lazy| (*lazy).clone())
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Arguments::new(values)
    }
}
