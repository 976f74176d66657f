//! Application Bootstrap
//!
//! Wires the container, configuration, event emitter and service providers
//! together and runs the provider phases.

use super::{ProviderManager, ServiceProvider};
use crate::config::Config;
use crate::di::{Container, Key};
use crate::error::Result;
use crate::events::Emitter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// Alias under which the [`Config`] instance is bound.
pub const CONFIG_ALIAS: &str = "Keystone/Config";
/// Alias under which the [`Emitter`] instance is bound.
pub const EVENT_ALIAS: &str = "Keystone/Event";

/// A booted application.
///
/// # Example
///
/// ```rust,ignore
/// use keystone::provider::Application;
///
/// #[tokio::main]
/// async fn main() -> keystone::Result<()> {
///     let app = Application::builder()
///         .config_dir("config")
///         .provider(Arc::new(DatabaseProvider))
///         .build()
///         .await?;
///
///     let db = app.container().resolve::<Database>("App/Database")?;
///     // ... run ...
///
///     app.wait_for_shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Application {
    container: Container,
    config: Config,
    emitter: Emitter,
    providers: Arc<ProviderManager>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn providers(&self) -> &Arc<ProviderManager> {
        &self.providers
    }

    /// Runs every provider's shutdown hook, newest first.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application...");
        self.providers.shutdown_all(&self.container).await;
        tracing::info!("Application shutdown complete");
    }

    /// Waits for SIGINT or SIGTERM, then shuts down.
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown().await;
    }
}

/// Builder for [`Application`]
#[derive(Default)]
pub struct ApplicationBuilder {
    container: Option<Container>,
    providers: ProviderManager,
    config_dir: Option<PathBuf>,
    register_timeout: Option<Duration>,
    boot_timeout: Option<Duration>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing container instead of a fresh one.
    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ServiceProvider>) -> Self {
        self.providers.add(provider);
        self
    }

    /// Directory of `*.json` configuration files.
    pub fn config_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(directory.into());
        self
    }

    pub fn register_timeout(mut self, timeout: Duration) -> Self {
        self.register_timeout = Some(timeout);
        self
    }

    pub fn boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = Some(timeout);
        self
    }

    /// Loads configuration, binds the core services and runs the register
    /// and boot phases.
    pub async fn build(self) -> Result<Application> {
        let container = self.container.unwrap_or_default();

        let config = match &self.config_dir {
            Some(directory) => {
                tracing::info!(directory = %directory.display(), "Loading configuration");
                Config::load_dir(directory)?
            }
            None => Config::new(),
        };
        container
            .instance(Key::of::<Config>(), config.clone())?
            .alias(Key::of::<Config>(), CONFIG_ALIAS)?;

        let emitter = Emitter::new();
        container
            .instance(Key::of::<Emitter>(), emitter.clone())?
            .alias(Key::of::<Emitter>(), EVENT_ALIAS)?;

        match self.register_timeout {
            Some(timeout) => {
                self.providers
                    .register_all_with_timeout(&container, timeout)
                    .await?
            }
            None => self.providers.register_all(&container).await?,
        }
        match self.boot_timeout {
            Some(timeout) => self.providers.boot_all_with_timeout(&container, timeout).await?,
            None => self.providers.boot_all(&container).await?,
        }

        tracing::info!(providers = self.providers.len(), "Application booted");
        Ok(Application {
            container,
            config,
            emitter,
            providers: Arc::new(self.providers),
        })
    }
}

/// Completes when SIGINT or SIGTERM is received.
///
/// ```rust,ignore
/// tokio::select! {
///     _ = shutdown_signal() => {}
///     _ = worker.run() => {}
/// }
/// ```
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeystoneError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Greeting;

    #[async_trait]
    impl ServiceProvider for Greeting {
        fn name(&self) -> &str {
            "Greeting"
        }

        async fn register(&self, container: &Container) -> anyhow::Result<()> {
            container.singleton("App/Greeting", |c, _| {
                let config = c.resolve::<Config>(CONFIG_ALIAS)?;
                let name = config.get("app.name").and_then(|v| v.as_str().map(str::to_string));
                Ok(format!("Hello {}", name.unwrap_or_default()))
            })?;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ServiceProvider for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn register(&self, _container: &Container) -> anyhow::Result<()> {
            anyhow::bail!("missing credentials")
        }
    }

    #[tokio::test]
    async fn test_build_binds_core_services() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.json"), r#"{"name": "keystone"}"#).unwrap();

        let app = Application::builder()
            .config_dir(dir.path())
            .provider(Arc::new(Greeting))
            .build()
            .await
            .unwrap();

        let greeting = app.container().resolve::<String>("App/Greeting").unwrap();
        assert_eq!(greeting.as_str(), "Hello keystone");

        let config = app.container().resolve_type::<Config>().unwrap();
        assert_eq!(config.get("app.name"), Some(json!("keystone")));
        assert!(app.container().has(EVENT_ALIAS));
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_failure_aborts_build() {
        let result = Application::builder().provider(Arc::new(Broken)).build().await;
        assert!(matches!(result, Err(KeystoneError::Provider { .. })));
    }
}
