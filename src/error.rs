use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeystoneError>;

#[derive(Debug, Error)]
pub enum KeystoneError {
    #[error("Binding not found: {id}")]
    BindingNotFound { id: String },

    #[error("Invalid binding: {message}")]
    InvalidBinding { message: String },

    #[error("'{alias}' is aliased to itself")]
    AliasCycle { alias: String },

    #[error("Failed to autoload {namespace} from {path}")]
    Autoload {
        namespace: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse autoloaded file {path}: {source}")]
    AutoloadParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to downcast {id} to {type_name}")]
    DowncastFailed { id: String, type_name: String },

    #[error(
        "Cannot inject parameter #{position} ({type_name}) of {owner}: \
         the declared type does not say what to inject, pass it as an argument instead"
    )]
    UninjectableParameter {
        owner: String,
        position: usize,
        type_name: String,
    },

    #[error("Missing argument #{position} while constructing {owner}")]
    MissingArgument { owner: String, position: usize },

    #[error("{owner} has no injectable property named '{property}'")]
    UnknownProperty { owner: String, property: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("No fake registered for {id}")]
    FakeNotFound { id: String },

    #[error("Cannot detach the proxy for {id} while a fake is registered")]
    FakeActive { id: String },

    #[error("The container backing a forward reference to {type_name} was dropped")]
    ContainerDropped { type_name: String },

    #[error("Service provider {provider} failed during {phase}")]
    Provider {
        provider: String,
        phase: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timeout during {phase}: {message}")]
    Timeout { phase: String, message: String },

    #[error("Invalid configuration at '{path}': {message}")]
    Config { path: String, message: String },

    #[error("Listener for '{event}' failed")]
    Listener {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Command \"{name}\" is not defined")]
    CommandNotFound { name: String },

    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("Command {command} failed")]
    CommandFailed {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KeystoneError {
    pub fn binding_not_found(id: impl ToString) -> Self {
        Self::BindingNotFound { id: id.to_string() }
    }

    pub fn downcast_failed<T: ?Sized>(id: impl ToString) -> Self {
        Self::DowncastFailed {
            id: id.to_string(),
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}
