use super::injectable::Injectable;
use super::{Container, WeakContainer};
use crate::error::{KeystoneError, Result};
use once_cell::sync::OnceCell;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

type ResolveFn<T> = Box<dyn Fn(&Container) -> Result<Arc<T>> + Send + Sync>;

struct Shared<T> {
    container: WeakContainer,
    resolve: ResolveFn<T>,
    instance: OnceCell<Arc<T>>,
}

/// A forward reference to a service, resolved on first access.
///
/// `Lazy<T>` breaks construction cycles: when `A` needs `B` and `B` needs `A`,
/// one side holds a `Lazy` and the other side is built only when the reference
/// is first used. The resolved instance is cached and shared by every clone.
///
/// The reference holds a weak handle to the container, so it never keeps the
/// container alive on its own.
///
/// # Panics
///
/// Dereferencing panics if the service cannot be resolved. Use [`Lazy::get`]
/// to handle the error instead.
pub struct Lazy<T: 'static + Send + Sync> {
    shared: Arc<Shared<T>>,
}

impl<T: 'static + Send + Sync> Lazy<T> {
    /// Resolves `T` through [`Container::make`] on first access.
    ///
    /// This is typically called by the injector for `Lazy<T>` fields.
    pub fn new(container: &Container) -> Self
    where
        T: Injectable,
    {
        Self::with(container, |container| container.make::<T>(Vec::new()))
    }

    /// Resolves with `resolve` on first access.
    pub fn with<F>(container: &Container, resolve: F) -> Self
    where
        F: Fn(&Container) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                container: container.downgrade(),
                resolve: Box::new(resolve),
                instance: OnceCell::new(),
            }),
        }
    }

    fn instance(&self) -> Result<&Arc<T>> {
        self.shared.instance.get_or_try_init(|| {
            let container = self.shared.container.upgrade().ok_or_else(|| {
                KeystoneError::ContainerDropped {
                    type_name: std::any::type_name::<T>().to_string(),
                }
            })?;
            tracing::trace!(target_type = std::any::type_name::<T>(), "Resolving forward reference");
            (self.shared.resolve)(&container)
        })
    }

    pub fn get(&self) -> Result<Arc<T>> {
        self.instance().cloned()
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.instance.get().is_some()
    }
}

impl<T: 'static + Send + Sync> Deref for Lazy<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self.instance() {
            Ok(instance) => instance.as_ref(),
            Err(e) => panic!(
                "Failed to lazily resolve dependency '{}': {}",
                std::any::type_name::<T>(),
                e
            ),
        }
    }
}

impl<T: 'static + Send + Sync> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: 'static + Send + Sync> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("type", &std::any::type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
