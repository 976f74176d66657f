use crate::di::Container;
use crate::error::Result;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which implements
/// this trait and registers every provider as a singleton under its type key.
///
/// # Example
/// ```ignore
/// use keystone::module;
///
/// #[module(
///     imports = [BillingModule],
///     providers = [UserService, PostgresUserRepository],
///     bindings = [(dyn UserRepository => PostgresUserRepository)],
/// )]
/// pub struct AppModule;
/// ```
pub trait Module {
    /// Register all providers and bindings of this module
    fn register(container: &Container) -> Result<()>;

    /// Create a new container and register this module
    fn create_container() -> Result<Container> {
        let container = Container::new();
        Self::register(&container)?;
        Ok(container)
    }
}
