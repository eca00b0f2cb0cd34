//! Admin tool wrapper around `valkey-cli` / `redis-cli` subprocesses.
//!
//! Every cluster operation is one invocation of the admin binary. This module
//! holds the configuration (which binary, which credential), the error type
//! and the process plumbing shared by the operations in
//! [`cluster_ops`](super::cluster_ops).

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};
use std::str::FromStr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that can occur while driving the admin tool.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to run command {command} {args:?}: {source}")]
    Spawn {
        command: String,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("command {command} {args:?} exited with {status}")]
    Exit {
        command: String,
        args: Vec<String>,
        status: ExitStatus,
    },

    #[error("I/O error talking to {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command {command} {args:?} cancelled")]
    Cancelled { command: String, args: Vec<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CliError {
    /// The operation was stopped through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CliError::Cancelled { .. })
    }
}

/// Which compatible admin binary to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CliName {
    Redis,
    #[default]
    Valkey,
}

impl CliName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CliName::Redis => "redis-cli",
            CliName::Valkey => "valkey-cli",
        }
    }
}

impl fmt::Display for CliName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CliName {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "redis-cli" | "redis" => Ok(CliName::Redis),
            "valkey-cli" | "valkey" => Ok(CliName::Valkey),
            other => Err(CliError::InvalidConfig(format!(
                "unknown admin tool '{}', expected redis-cli or valkey-cli",
                other
            ))),
        }
    }
}

/// Configuration for the admin tool wrapper.
#[derive(Clone, Default)]
pub struct ValkeyCliConfig {
    /// Admin tool flavor.
    pub name: CliName,
    /// Explicit path to the binary; defaults to looking `name` up on `PATH`.
    pub binary_path: Option<PathBuf>,
    /// Password passed with `-a`.
    pub password: Option<String>,
}

impl fmt::Debug for ValkeyCliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValkeyCliConfig")
            .field("name", &self.name)
            .field("binary_path", &self.binary_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ValkeyCliConfig {
    /// Create a new configuration for the given tool.
    pub fn new(name: CliName) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Set password. An empty password means no authentication.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Run the binary at `path` instead of looking the tool up on `PATH`.
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }
}

/// Stateless driver for the admin tool.
///
/// Holds configuration only, so one instance can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct ValkeyCli {
    config: ValkeyCliConfig,
}

impl ValkeyCli {
    pub fn new(config: ValkeyCliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValkeyCliConfig {
        &self.config
    }

    /// Name used in logs and error messages.
    pub fn command_name(&self) -> String {
        match &self.config.binary_path {
            Some(path) => path.display().to_string(),
            None => self.config.name.to_string(),
        }
    }

    /// Arguments as passed to the process: `args` plus the credential, if any.
    ///
    /// Log `args`, never the result of this function.
    pub(crate) fn full_args(&self, args: &[String]) -> Vec<String> {
        let mut full = args.to_vec();
        if let Some(password) = &self.config.password {
            full.push("-a".to_string());
            full.push(password.clone());
        }
        full
    }

    pub(crate) fn command(&self, args: &[String]) -> Command {
        let program = match &self.config.binary_path {
            Some(path) => path.clone().into_os_string(),
            None => self.config.name.as_str().into(),
        };
        let mut cmd = Command::new(program);
        cmd.args(self.full_args(args)).kill_on_drop(true);
        cmd
    }

    pub(crate) fn spawn_error(&self, args: &[String], source: std::io::Error) -> CliError {
        CliError::Spawn {
            command: self.command_name(),
            args: args.to_vec(),
            source,
        }
    }

    pub(crate) fn exit_error(&self, args: &[String], status: ExitStatus) -> CliError {
        CliError::Exit {
            command: self.command_name(),
            args: args.to_vec(),
            status,
        }
    }

    pub(crate) fn cancelled_error(&self, args: &[String]) -> CliError {
        CliError::Cancelled {
            command: self.command_name(),
            args: args.to_vec(),
        }
    }

    /// Run a non-interactive command and capture its stdout.
    ///
    /// Fails if the tool cannot be started, exits non-zero, or `cancel` fires
    /// first (the process is killed in that case).
    pub(crate) async fn output(
        &self,
        cancel: &CancellationToken,
        args: &[String],
    ) -> Result<Output, CliError> {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| self.spawn_error(args, e))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| self.spawn_error(args, e))?,
            _ = cancel.cancelled() => return Err(self.cancelled_error(args)),
        };

        if !output.status.success() {
            debug!(
                command = %self.command_name(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "command failed"
            );
            return Err(self.exit_error(args, output.status));
        }

        Ok(output)
    }

    /// Run a non-interactive command, discarding its output.
    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        args: &[String],
    ) -> Result<(), CliError> {
        self.output(cancel, args).await.map(|_| ())
    }

    /// Run a command that expects `input` on stdin, then closes stdin.
    pub(crate) async fn run_with_input(
        &self,
        cancel: &CancellationToken,
        args: &[String],
        input: &[u8],
    ) -> Result<(), CliError> {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(args, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input).await {
                // The tool may exit before reading; its status tells the story.
                debug!(error = %e, "failed to write command input");
            }
            drop(stdin);
        }

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| CliError::Io {
                command: self.command_name(),
                source: e,
            })?,
            _ = cancel.cancelled() => return Err(self.cancelled_error(args)),
        };

        if !output.status.success() {
            debug!(
                command = %self.command_name(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "command failed"
            );
            return Err(self.exit_error(args, output.status));
        }

        Ok(())
    }
}

/// Format a `host:port` pair the way the admin tool expects.
pub(crate) fn address(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
