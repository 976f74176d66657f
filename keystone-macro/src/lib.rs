use proc_macro::TokenStream;

mod injectable;
mod module;

/// Derive macro implementing `keystone::Injectable` from a struct's fields
///
/// Each named field becomes one constructor parameter, in declaration order:
///
/// - `Arc<T>` is built by the injector (or taken from a binding for `T`)
/// - `Arc<dyn Trait>` is resolved through the trait mapping
/// - `Lazy<T>` is a forward reference resolved on first access
/// - `#[inject(lookup)] Arc<T>` is taken from the container by type only
/// - `#[inject(namespace = "App/Mailer")] Arc<T>` is taken from a namespace
/// - `#[inject(property)] Option<Arc<T>>` is filled by a property handler
/// - any other type must be passed by the caller
///
/// `#[injectable(supertypes(Base))]` makes handlers registered for `Base`
/// apply to the struct too.
///
/// # Example
/// ```ignore
/// use keystone::DeriveInjectable as Injectable;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     #[inject(namespace = "App/Mailer")]
///     mailer: Arc<Mailer>,
///     page_size: usize,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro implementing `keystone::Module`
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
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}
