//! Named event emitter
//!
//! Listeners are awaited one after another in registration order, so `emit`
//! returns only after every listener has finished. Observers that only need
//! to see events can [`subscribe`](Emitter::subscribe) to a broadcast stream
//! instead.

use crate::error::{KeystoneError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Handles an emitted event.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: &str, payload: &Value) -> anyhow::Result<()>;
}

/// An event as seen by subscribers and by the fake recorder.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

/// Identifies a registered listener for [`Emitter::off`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    listener: Arc<dyn Listener>,
    once: bool,
}

struct State {
    listeners: DashMap<String, Vec<Registration>>,
    any: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    faking: AtomicBool,
    recorded: Mutex<Vec<Event>>,
    sender: broadcast::Sender<Event>,
}

#[derive(Clone)]
pub struct Emitter {
    state: Arc<State>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            state: Arc::new(State {
                listeners: DashMap::new(),
                any: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                faking: AtomicBool::new(false),
                recorded: Mutex::new(Vec::new()),
                sender,
            }),
        }
    }

    fn registration(&self, listener: Arc<dyn Listener>, once: bool) -> Registration {
        Registration {
            id: ListenerId(self.state.next_id.fetch_add(1, Ordering::SeqCst)),
            listener,
            once,
        }
    }

    pub fn on(&self, event: &str, listener: Arc<dyn Listener>) -> ListenerId {
        self.add(event, listener, false)
    }

    /// Registers a listener removed after its first call.
    pub fn once(&self, event: &str, listener: Arc<dyn Listener>) -> ListenerId {
        self.add(event, listener, true)
    }

    fn add(&self, event: &str, listener: Arc<dyn Listener>, once: bool) -> ListenerId {
        let registration = self.registration(listener, once);
        let id = registration.id;
        self.state
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(registration);
        id
    }

    /// Registers a listener for every event.
    pub fn on_any(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let registration = self.registration(listener, false);
        let id = registration.id;
        self.any().push(registration);
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        if let Some(mut listeners) = self.state.listeners.get_mut(event) {
            let before = listeners.len();
            listeners.retain(|registration| registration.id != id);
            if listeners.len() != before {
                return true;
            }
        }
        let mut any = self.any();
        let before = any.len();
        any.retain(|registration| registration.id != id);
        any.len() != before
    }

    /// Removes the listeners of `event`, or every listener when `None`.
    pub fn clear(&self, event: Option<&str>) {
        match event {
            Some(event) => {
                self.state.listeners.remove(event);
            }
            None => {
                self.state.listeners.clear();
                self.any().clear();
            }
        }
    }

    /// Listeners for `event` plus catch-all listeners, or every listener when `None`.
    pub fn listener_count(&self, event: Option<&str>) -> usize {
        let any = self.any().len();
        match event {
            Some(event) => {
                any + self
                    .state
                    .listeners
                    .get(event)
                    .map(|listeners| listeners.len())
                    .unwrap_or(0)
            }
            None => any + self.state.listeners.iter().map(|item| item.value().len()).sum::<usize>(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.state.sender.subscribe()
    }

    /// Emits `event`, awaiting each listener in turn.
    ///
    /// The first failing listener stops the dispatch.
    pub async fn emit(&self, event: &str, payload: Value) -> Result<()> {
        let emitted = Event {
            name: event.to_string(),
            payload,
        };
        let _ = self.state.sender.send(emitted.clone());

        if self.state.faking.load(Ordering::SeqCst) {
            tracing::debug!(event, "Recording faked event");
            self.recorded().push(emitted);
            return Ok(());
        }

        let listeners = self.take_listeners(event);
        tracing::debug!(event, listeners = listeners.len(), "Emitting");
        for registration in listeners {
            registration
                .listener
                .handle(event, &emitted.payload)
                .await
                .map_err(|source| {
                    tracing::error!("Listener for {} failed: {:#}", event, source);
                    KeystoneError::Listener {
                        event: event.to_string(),
                        source,
                    }
                })?;
        }
        Ok(())
    }

    /// Snapshot of the listeners to call, dropping `once` registrations.
    fn take_listeners(&self, event: &str) -> Vec<Registration> {
        let mut selected = Vec::new();
        if let Some(mut listeners) = self.state.listeners.get_mut(event) {
            selected.extend(listeners.iter().cloned());
            listeners.retain(|registration| !registration.once);
        }
        selected.extend(self.any().iter().cloned());
        selected
    }

    /// Records emitted events instead of calling listeners.
    pub fn fake(&self) {
        self.recorded().clear();
        self.state.faking.store(true, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.state.faking.store(false, Ordering::SeqCst);
        self.recorded().clear();
    }

    pub fn is_faked(&self) -> bool {
        self.state.faking.load(Ordering::SeqCst)
    }

    /// Events emitted while faked.
    pub fn recorded_events(&self) -> Vec<Event> {
        self.recorded().clone()
    }

    pub fn was_emitted(&self, event: &str) -> bool {
        self.recorded().iter().any(|recorded| recorded.name == event)
    }

    fn any(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.state.any.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.state.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
