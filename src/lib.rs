//! # Keystone
//!
//! An inversion-of-control container with the scaffolding an application
//! usually builds around one: service providers, configuration, events and
//! a console kernel.
//!
//! ## Features
//!
//! - **Bindings**: Factories and singletons under namespaces (`App/Mailer`) or types
//! - **Aliases**: Short names that follow chains to a binding
//! - **Autoload**: Namespace prefixes mapped onto directories of JSON documents
//! - **Constructor Injection**: `#[derive(Injectable)]` with runtime arguments,
//!   per-parameter resolvers and property handlers
//! - **Forward References**: `Lazy<T>` for circular graphs
//! - **Fakes**: Swap any binding in tests; live [`Proxy`] handles follow the swap
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keystone::{Container, DeriveInjectable as Injectable};
//! use std::sync::Arc;
//!
//! #[derive(Injectable)]
//! pub struct Mailer {}
//!
//! #[derive(Injectable)]
//! pub struct SignupService {
//!     mailer: Arc<Mailer>,
//! }
//!
//! let container = Container::new();
//! container.bind_injectable::<Mailer>("App/Mailer", true)?;
//! container.alias("App/Mailer", "Mail")?;
//!
//! let signup = container.make::<SignupService>(vec![])?;
//! let mailer = container.resolve::<Mailer>("Mail")?;
//! ```

pub mod config;
pub mod console;
pub mod di;
pub mod error;
pub mod events;
pub mod module;
pub mod provider;

// Re-export core types
pub use config::Config;
pub use di::{
    Arguments, Container, ContainerBuilder, Dependency, Injectable, Injector, Key, Lazy,
    LookupKind, LookupNode, MethodSignature, Proxy, Value, value,
};
pub use error::{KeystoneError, Result};
pub use events::Emitter;
pub use module::Module;

// Re-export macros
pub use keystone_macro::{Injectable as DeriveInjectable, module};

pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use keystone::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::console::{Command, CommandContext, Kernel};
    pub use crate::di::{
        Arguments, Container, ContainerBuilder, Dependency, Injectable, Key, Lazy, Proxy, Value,
    };
    pub use crate::error::{KeystoneError, Result};
    pub use crate::events::{Emitter, Listener};
    pub use crate::module::Module;
    pub use crate::provider::{Application, ServiceProvider};
    pub use crate::{DeriveInjectable, module};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
