//! Test doubles for container bindings.
//!
//! Fakes are registered per key on the container. A [`Proxy`] obtained while
//! proxy mode is on checks the fake registry on every access, so registering
//! or restoring a fake takes effect on proxies handed out earlier.

use super::binding::downcast;
use super::key::{Key, Value};
use super::Container;
use crate::error::{KeystoneError, Result};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub(crate) type FakeFactory = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

struct FakeEntry {
    factory: FakeFactory,
    value: OnceCell<Value>,
}

#[derive(Default)]
pub(crate) struct FakeRegistry {
    fakes: DashMap<Key, Arc<FakeEntry>>,
}

impl FakeRegistry {
    pub(crate) fn register(&self, key: Key, factory: FakeFactory) {
        self.fakes.insert(
            key,
            Arc::new(FakeEntry {
                factory,
                value: OnceCell::new(),
            }),
        );
    }

    /// Moves the fake under `from` to `to` unless `to` already has one.
    pub(crate) fn rekey(&self, from: &Key, to: Key) {
        if let Some((_, entry)) = self.fakes.remove(from) {
            self.fakes.entry(to).or_insert(entry);
        }
    }

    pub(crate) fn remove(&self, key: &Key) -> bool {
        self.fakes.remove(key).is_some()
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.fakes.contains_key(key)
    }

    /// The memoized fake for `key`, built on first request.
    pub(crate) fn value(&self, key: &Key, container: &Container) -> Result<Option<Value>> {
        let Some(entry) = self.fakes.get(key).map(|entry| Arc::clone(entry.value())) else {
            return Ok(None);
        };
        entry
            .value
            .get_or_try_init(|| (entry.factory)(container))
            .map(|value| Some(Arc::clone(value)))
    }
}

/// Handle to a resolved service that honors fakes registered after the fact.
///
/// A live proxy consults the container's fakes on every [`get`](Proxy::get).
/// A detached proxy (proxy mode off) always returns the original value.
pub struct Proxy<T: Send + Sync + 'static> {
    key: Key,
    original: Arc<T>,
    container: Container,
    live: bool,
}

impl<T: Send + Sync + 'static> Proxy<T> {
    pub(crate) fn new(key: Key, original: Arc<T>, container: Container, live: bool) -> Self {
        Self {
            key,
            original,
            container,
            live,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_faked(&self) -> bool {
        self.live && self.container.has_fake(&self.key)
    }

    /// The current target: the fake when one is registered, else the original.
    pub fn get(&self) -> Result<Arc<T>> {
        if self.live {
            if let Some(fake) = self.container.fakes().value(&self.key, &self.container)? {
                return downcast(&self.key, fake);
            }
        }
        Ok(Arc::clone(&self.original))
    }

    pub fn original(&self) -> &Arc<T> {
        &self.original
    }

    /// Gives up the indirection and returns the original value.
    ///
    /// Rejected while a fake is registered for this key.
    pub fn detach(self) -> Result<Arc<T>> {
        if self.is_faked() {
            return Err(KeystoneError::FakeActive {
                id: self.key.to_string(),
            });
        }
        Ok(self.original)
    }
}

impl<T: Send + Sync + 'static> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            original: Arc::clone(&self.original),
            container: self.container.clone(),
            live: self.live,
        }
    }
}
