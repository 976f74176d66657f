//! Provider Manager
//!
//! Runs provider hooks sequentially, one phase at a time.

use super::ServiceProvider;
use crate::di::Container;
use crate::error::{KeystoneError, Result};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;

/// Provider lifecycle phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Register,
    Boot,
    Shutdown,
}

/// Owns the registered providers and drives their hooks
///
/// Hooks are awaited one after another; the first failing `register` or `boot`
/// hook aborts the phase. Shutdown keeps going past failures.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = ProviderManager::new();
/// manager.add(Arc::new(DatabaseProvider));
/// manager.add(Arc::new(MailProvider));
///
/// manager.register_all(&container).await?;
/// manager.boot_all(&container).await?;
/// // ... application runs ...
/// manager.shutdown_all(&container).await;
/// ```
#[derive(Default)]
pub struct ProviderManager {
    providers: Vec<Arc<dyn ServiceProvider>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, provider: Arc<dyn ServiceProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Execute every `register` hook in registration order
    pub async fn register_all(&self, container: &Container) -> Result<()> {
        tracing::info!("Registering providers...");

        for provider in &self.providers {
            tracing::debug!("Registering: {}", provider.name());
            provider
                .register(container)
                .await
                .map_err(|e| failed(provider.as_ref(), Phase::Register, e))?;
        }

        tracing::info!("Register complete ({} providers)", self.providers.len());
        Ok(())
    }

    /// Execute every `boot` hook in registration order
    pub async fn boot_all(&self, container: &Container) -> Result<()> {
        tracing::info!("Booting providers...");

        for provider in &self.providers {
            tracing::debug!("Booting: {}", provider.name());
            provider
                .boot(container)
                .await
                .map_err(|e| failed(provider.as_ref(), Phase::Boot, e))?;
        }

        tracing::info!("Boot complete ({} providers)", self.providers.len());
        Ok(())
    }

    /// Execute every `shutdown` hook in **reverse** order
    pub async fn shutdown_all(&self, container: &Container) {
        tracing::info!("Shutting down providers...");

        for provider in self.providers.iter().rev() {
            tracing::debug!("Shutting down: {}", provider.name());
            if let Err(e) = provider.shutdown(container).await {
                tracing::error!("Shutdown failed for {}: {:#}", provider.name(), e);
            }
        }

        tracing::info!("Shutdown complete ({} providers)", self.providers.len());
    }

    pub async fn register_all_with_timeout(&self, container: &Container, timeout: Duration) -> Result<()> {
        with_timeout(Phase::Register, timeout, self.register_all(container)).await
    }

    pub async fn boot_all_with_timeout(&self, container: &Container, timeout: Duration) -> Result<()> {
        with_timeout(Phase::Boot, timeout, self.boot_all(container)).await
    }
}

fn failed(provider: &dyn ServiceProvider, phase: Phase, source: anyhow::Error) -> KeystoneError {
    tracing::error!("{} failed for {}: {:#}", phase, provider.name(), source);
    KeystoneError::Provider {
        provider: provider.name().to_string(),
        phase: phase.to_string(),
        source,
    }
}

async fn with_timeout(
    phase: Phase,
    timeout: Duration,
    future: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| KeystoneError::Timeout {
            phase: phase.to_string(),
            message: format!("Timeout after {:?}", timeout),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_boot: bool,
    }

    impl Recording {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                fail_boot: false,
            })
        }

        fn push(&self, phase: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, phase));
        }
    }

    #[async_trait]
    impl ServiceProvider for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn register(&self, _container: &Container) -> anyhow::Result<()> {
            self.push("register");
            Ok(())
        }

        async fn boot(&self, _container: &Container) -> anyhow::Result<()> {
            self.push("boot");
            if self.fail_boot {
                anyhow::bail!("boot exploded");
            }
            Ok(())
        }

        async fn shutdown(&self, _container: &Container) -> anyhow::Result<()> {
            self.push("shutdown");
            Ok(())
        }
    }

    struct Sleepy;

    #[async_trait]
    impl ServiceProvider for Sleepy {
        fn name(&self) -> &str {
            "Sleepy"
        }

        async fn register(&self, _container: &Container) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        let mut manager = ProviderManager::new();
        manager.add(Recording::new("a", &log));
        manager.add(Recording::new("b", &log));

        manager.register_all(&container).await.unwrap();
        manager.boot_all(&container).await.unwrap();
        manager.shutdown_all(&container).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:register",
                "b:register",
                "a:boot",
                "b:boot",
                "b:shutdown",
                "a:shutdown"
            ]
        );
    }

    #[tokio::test]
    async fn test_boot_failure_names_provider() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        let mut manager = ProviderManager::new();
        manager.add(Arc::new(Recording {
            name: "broken",
            log: Arc::clone(&log),
            fail_boot: true,
        }));
        manager.add(Recording::new("after", &log));

        let err = manager.boot_all(&container).await.unwrap_err();
        match err {
            KeystoneError::Provider { provider, phase, .. } => {
                assert_eq!(provider, "broken");
                assert_eq!(phase, "boot");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["broken:boot"]);
    }

    #[tokio::test]
    async fn test_register_timeout() {
        let container = Container::new();
        let mut manager = ProviderManager::new();
        manager.add(Arc::new(Sleepy));

        let err = manager
            .register_all_with_timeout(&container, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, KeystoneError::Timeout { .. }));
    }
}
