//! Service providers and application bootstrap
//!
//! # Phases
//!
//! ```text
//! 1. Container creation
//!    ↓
//! 2. Configuration loading        (config bound into the container)
//!    ↓
//! 3. ServiceProvider::register    (each provider, in order)
//!    ↓
//! 4. ServiceProvider::boot        (each provider, in order)
//!    ↓
//! [Running...]
//!    ↓
//! 5. Shutdown signal (SIGTERM/SIGINT) or Application::shutdown
//!    ↓
//! 6. ServiceProvider::shutdown    (reverse order)
//! ```

mod application;
mod manager;
mod traits;

pub use application::{Application, ApplicationBuilder, shutdown_signal};
pub use manager::{Phase, ProviderManager};
pub use traits::ServiceProvider;
