//! Console kernel
//!
//! Commands describe their arguments with a [`clap::Command`] and are
//! dispatched by name from an argv list. `list` is built in.

mod command;
mod kernel;

pub use command::{Command, CommandContext};
pub use kernel::{CommandOutput, Kernel};
