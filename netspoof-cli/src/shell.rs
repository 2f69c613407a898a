//! Interactive shell
//!
//! Reads commands line by line and runs them against the session's
//! parameters, aliases and modules.

use netspoof_core::{MacAddr, Result, Session};
use netspoof_module::ModuleManager;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::command::{Command, CommandParser};

const PROMPT: &[u8] = b"netspoof> ";

/// Command interpreter bound to one session
pub struct Shell {
    session: Arc<Session>,
    manager: Arc<ModuleManager>,
}

impl Shell {
    pub fn new(session: Arc<Session>, manager: Arc<ModuleManager>) -> Self {
        Self { session, manager }
    }

    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    /// Prompt, read and execute until `quit`, end of input or `shutdown`.
    ///
    /// `shutdown` is only watched while waiting for input, after any line
    /// already available. A command that is executing runs to completion.
    pub async fn run<R, W, S>(&self, mut reader: R, writer: &mut W, shutdown: S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut line = String::new();

        loop {
            writer.write_all(PROMPT).await?;
            writer.flush().await?;

            line.clear();
            let read = tokio::select! {
                biased;
                read = reader.read_line(&mut line) => read,
                _ = &mut shutdown => {
                    info!("Interrupted");
                    break;
                }
            };
            match read {
                Ok(0) => {
                    debug!("End of input");
                    break;
                }
                Ok(_) => {
                    if self.run_line(&line, writer).await? {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Error reading command");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Parse and execute one line, reporting failures to `writer`.
    ///
    /// Returns true when the shell should exit.
    pub async fn run_line<W>(&self, line: &str, writer: &mut W) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let line = line.trim();
        if line.is_empty() {
            return Ok(false);
        }

        debug!(command = %line, "Executing");

        let command = match CommandParser::parse(line) {
            Ok(command) => command,
            Err(e) => {
                Self::write_line(writer, &format!("Error: {}", e)).await?;
                return Ok(false);
            }
        };

        match self.execute(command, writer).await {
            Ok(should_exit) => Ok(should_exit),
            Err(e) if e.is_idempotency() => {
                Self::write_line(writer, &format!("Warning: {}", e)).await?;
                Ok(false)
            }
            Err(e) => {
                Self::write_line(writer, &format!("Error: {}", e)).await?;
                Ok(false)
            }
        }
    }

    /// Execute a command
    async fn execute<W>(&self, command: Command, writer: &mut W) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        match command {
            Command::Help => {
                writer
                    .write_all(CommandParser::help_text().as_bytes())
                    .await?;
            }
            Command::Modules => self.cmd_modules(writer).await?,
            Command::Set { name, value } => {
                self.session.params.set(&name, &value)?;
                let value = self.session.params.get(&name)?;
                Self::write_line(writer, &format!("{} => {}", name, value)).await?;
            }
            Command::Get { name: Some(name) } => {
                let value = self.session.params.get(&name)?;
                Self::write_line(writer, &format!("{}: '{}'", name, value)).await?;
            }
            Command::Get { name: None } => {
                for descriptor in self.session.params.descriptors() {
                    let value = self.session.params.get(&descriptor.name)?;
                    Self::write_line(
                        writer,
                        &format!("  {}: '{}'  {}", descriptor.name, value, descriptor.description),
                    )
                    .await?;
                }
            }
            Command::Alias { name, mac } => {
                let mac: MacAddr = mac.parse()?;
                self.session.set_alias(&name, mac);
                Self::write_line(writer, &format!("{} => {}", name, mac)).await?;
            }
            Command::Module(line) => self.manager.dispatch(&line).await?,
            Command::Quit => {
                self.manager.stop_all().await?;
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn cmd_modules<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for module in self.manager.list() {
            let state = if module.running { "running" } else { "stopped" };
            Self::write_line(
                writer,
                &format!("{} [{}]  {}", module.name, state, module.description),
            )
            .await?;
            for handler in module.handlers {
                Self::write_line(
                    writer,
                    &format!("    {:<20} {}", handler.name, handler.description),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn write_line<W>(writer: &mut W, text: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }
}
