use crate::di::Container;
use async_trait::async_trait;

/// A unit of application setup.
///
/// Every provider's [`register`](ServiceProvider::register) runs before any
/// provider's [`boot`](ServiceProvider::boot), so `boot` may resolve bindings
/// contributed by providers registered later.
///
/// # Example
///
/// ```rust,ignore
/// use keystone::provider::ServiceProvider;
/// use keystone::{async_trait, Container};
///
/// struct MailProvider;
///
/// #[async_trait]
/// impl ServiceProvider for MailProvider {
///     fn name(&self) -> &str {
///         "MailProvider"
///     }
///
///     async fn register(&self, container: &Container) -> anyhow::Result<()> {
///         container.singleton("App/Mailer", |_, _| Ok(Mailer::default()))?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Contributes bindings. Should not resolve other services.
    async fn register(&self, container: &Container) -> anyhow::Result<()>;

    /// Runs once every provider is registered.
    async fn boot(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on application shutdown, in reverse registration order.
    async fn shutdown(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }
}
