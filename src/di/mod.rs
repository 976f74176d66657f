mod autoload;
mod binding;
mod builder;
mod container;
mod handler;
mod injectable;
mod injector;
mod key;
mod lazy;
mod lookup;
mod proxy;

pub use autoload::{Loader, unwrap_export};
pub use binding::{Arguments, downcast, value};
pub use builder::ContainerBuilder;
pub use container::{Container, WeakContainer};
pub use handler::{HandlerKey, Resolver};
pub use injectable::{Dependency, Injectable, MethodSignature};
pub use injector::Injector;
pub use key::{Key, Value, compile_namespace};
pub use lazy::Lazy;
pub use lookup::{LookupKind, LookupNode};
pub use proxy::Proxy;
