use crate::di::Container;
use async_trait::async_trait;
use clap::ArgMatches;

/// State handed to [`Command::handle`].
pub struct CommandContext<'a> {
    pub container: &'a Container,
    pub matches: ArgMatches,
    lines: Vec<String>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(container: &'a Container, matches: ArgMatches) -> Self {
        Self {
            container,
            matches,
            lines: Vec::new(),
        }
    }

    /// Writes a line of output.
    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub(crate) fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// A console command.
///
/// # Example
///
/// ```rust,ignore
/// use keystone::console::{Command, CommandContext};
/// use keystone::async_trait;
///
/// struct Greet;
///
/// #[async_trait]
/// impl Command for Greet {
///     fn name(&self) -> &'static str {
///         "greet"
///     }
///
///     fn definition(&self) -> clap::Command {
///         clap::Command::new(self.name()).arg(clap::Arg::new("who").required(true))
///     }
///
///     async fn handle(&self, ctx: &mut CommandContext<'_>) -> anyhow::Result<i32> {
///         let who = ctx.matches.get_one::<String>("who").cloned().unwrap_or_default();
///         ctx.line(format!("Hello {who}"));
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// Argument definition; the default accepts no arguments.
    fn definition(&self) -> clap::Command {
        clap::Command::new(self.name()).about(self.description())
    }

    /// Runs the command and returns its exit code.
    async fn handle(&self, ctx: &mut CommandContext<'_>) -> anyhow::Result<i32>;
}
