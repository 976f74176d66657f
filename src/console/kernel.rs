use super::{Command, CommandContext};
use crate::di::{Container, Key};
use crate::error::{KeystoneError, Result};
use clap::error::ErrorKind;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a command printed and the code it exited with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

/// Registers commands and dispatches argv to them.
pub struct Kernel {
    container: Container,
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl Kernel {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            commands: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) -> &mut Self {
        tracing::debug!(command = command.name(), "Registering command");
        self.commands.insert(command.name().to_string(), command);
        self
    }

    /// Registers a command bound in the container as `Arc<dyn Command>`.
    pub fn register_from(&mut self, key: impl Into<Key>) -> Result<&mut Self> {
        let command = self.container.resolve::<Arc<dyn Command>>(key)?;
        Ok(self.register(Arc::clone(&*command)))
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Runs the command named by the first element of `argv`.
    ///
    /// An empty argv runs `list`.
    pub async fn call<I, S>(&self, argv: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let name = argv.first().cloned().unwrap_or_else(|| String::from("list"));

        let Some(command) = self.commands.get(&name) else {
            if name == "list" {
                return Ok(self.list());
            }
            return Err(KeystoneError::CommandNotFound { name });
        };

        let mut args = argv;
        if args.is_empty() {
            args.push(name.clone());
        }
        let matches = match command.definition().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                return Ok(CommandOutput {
                    exit_code: 0,
                    lines: e.render().to_string().lines().map(str::to_string).collect(),
                });
            }
            Err(e) => {
                return Err(KeystoneError::InvalidArguments {
                    command: name,
                    message: e.render().to_string().trim_end().to_string(),
                });
            }
        };

        tracing::info!(command = %name, "Running command");
        let mut ctx = CommandContext::new(&self.container, matches);
        let exit_code = command
            .handle(&mut ctx)
            .await
            .map_err(|source| KeystoneError::CommandFailed {
                command: name.clone(),
                source,
            })?;
        tracing::debug!(command = %name, exit_code, "Command finished");

        Ok(CommandOutput {
            exit_code,
            lines: ctx.into_lines(),
        })
    }

    /// Runs `argv`, printing output and errors, and returns the exit code.
    pub async fn run<I, S>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.call(argv).await {
            Ok(output) => {
                for line in &output.lines {
                    println!("{line}");
                }
                output.exit_code
            }
            Err(e) => {
                tracing::error!("Command failed: {:#}", anyhow::Error::from(e));
                1
            }
        }
    }

    fn list(&self) -> CommandOutput {
        let width = self.commands.keys().map(String::len).max().unwrap_or(0);
        let mut lines = vec![String::from("Available commands:")];
        lines.push(format!("  {:width$}  {}", "list", "List commands", width = width.max(4)));
        for (name, command) in &self.commands {
            lines.push(format!(
                "  {:width$}  {}",
                name,
                command.description(),
                width = width.max(4)
            ));
        }
        CommandOutput { exit_code: 0, lines }
    }
}
