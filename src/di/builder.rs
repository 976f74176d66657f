use crate::di::{Arguments, Container, Key, Value};
use crate::error::{KeystoneError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for configuring a container up front
///
/// Registration errors are collected and reported by [`ContainerBuilder::build`],
/// so the chain itself never fails.
///
/// # Example
/// ```
/// use keystone::ContainerBuilder;
///
/// let container = ContainerBuilder::new()
///     .singleton("App/Name", |_, _| Ok(String::from("keystone")))
///     .alias("App/Name", "name")
///     .build()
///     .unwrap();
///
/// assert_eq!(*container.resolve::<String>("name").unwrap(), "keystone");
/// ```
pub struct ContainerBuilder {
    container: Container,
    error: Option<KeystoneError>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            error: None,
        }
    }

    fn apply(mut self, register: impl FnOnce(&Container) -> Result<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = register(&self.container) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Register a factory invoked on every resolution
    pub fn bind<T, F>(self, key: impl Into<Key>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        self.apply(move |container| container.bind(key, factory).map(|_| ()))
    }

    /// Register a factory whose first result is cached
    pub fn singleton<T, F>(self, key: impl Into<Key>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        self.apply(move |container| container.singleton(key, factory).map(|_| ()))
    }

    /// Register a service instance
    pub fn instance<T: 'static + Send + Sync>(self, key: impl Into<Key>, instance: T) -> Self {
        let key = key.into();
        let value: Value = Arc::new(instance);
        self.apply(move |container| container.instance_value(key, value).map(|_| ()))
    }

    pub fn alias(self, key: impl Into<Key>, alias: &str) -> Self {
        let key = key.into();
        self.apply(move |container| container.alias(key, alias).map(|_| ()))
    }

    pub fn autoload(self, directory: impl Into<PathBuf>, prefix: &str) -> Self {
        let directory = directory.into();
        self.apply(move |container| container.autoload(directory, prefix).map(|_| ()))
    }

    /// Bind a trait to a concrete implementation
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    /// The implementation must have been registered first (or will be).
    pub fn bind_trait<Trait, Impl, F>(self, caster: F) -> Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        self.container.bind_trait::<Trait, Impl, F>(caster);
        self
    }

    pub fn use_proxies(self, enable: bool) -> Self {
        self.container.use_proxies(enable);
        self
    }

    /// Build the container
    pub fn build(self) -> Result<Container> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.container),
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_is_reported() {
        let result = ContainerBuilder::new()
            .instance("App/Ok", 1u8)
            .alias("App/Ok", "")
            .instance("", 2u8)
            .build();

        match result {
            Err(KeystoneError::InvalidBinding { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_build_with_proxies() {
        let container = ContainerBuilder::new()
            .instance("App/Ok", 1u8)
            .use_proxies(true)
            .build()
            .unwrap();
        assert!(container.proxies_enabled());
        assert!(container.has("App/Ok"));
    }
}
