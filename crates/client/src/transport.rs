//! Spawning the disposable VM and wiring up its stdio as our protocol
//! stream.
//!
//! The actual `qrexec-client-vm` invocation is intentionally the thinnest
//! layer in this crate: all we do here is spawn a child process and hand
//! back its stdio, split into a reader/writer pair. Everything above this
//! module only depends on the [`Transport`] trait, never on qrexec directly.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::prelude::*;

/// Environment variable that overrides the default RPC invocation, for
/// tests and for non-Qubes development environments.
pub const RPC_CMD_ENV_VAR: &str = "QVM_SANITIZE_RPC_CMD";

const DEFAULT_RPC_CMD: &[&str] = &["qrexec-client-vm", "@dispvm", "qubes.PdfConvert"];

/// A running disposable-VM server process, with its stdio split for use
/// with [`qvm_sanitize_protocol::framing`].
pub struct ServerProcess {
    child: Child,
    pub stdin: Option<tokio::process::ChildStdin>,
    pub stdout: tokio::io::BufReader<tokio::process::ChildStdout>,
}

impl ServerProcess {
    /// Close the write half of stdio so the server sees EOF and starts
    /// rasterizing. Takes `&mut self` rather than consuming it so the
    /// struct can still be `wait()`-ed on afterward.
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Wait for the child to exit, for diagnostics after a pipeline failure.
    pub async fn wait(mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Kill the child immediately. Used when the orchestrator cancels a file
    /// mid-flight (shutdown signal, or an earlier stage already failed).
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}

/// Spawns the untrusted-side server, in whatever form the current
/// environment provides it.
///
/// Implementors only need to know how to start the process; all protocol
/// concerns live in `qvm_sanitize_protocol::framing` on top of the returned
/// stdio.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn spawn(&self) -> Result<ServerProcess>;
}

/// The production transport: shells out to `qrexec-client-vm` (or whatever
/// [`RPC_CMD_ENV_VAR`] overrides it to).
pub struct QrexecTransport {
    argv: Vec<String>,
}

impl QrexecTransport {
    /// Build a transport from the environment, falling back to the default
    /// `qrexec-client-vm @dispvm qubes.PdfConvert` invocation.
    pub fn from_env() -> Self {
        let argv = match std::env::var(RPC_CMD_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => {
                value.split_whitespace().map(str::to_owned).collect()
            }
            _ => DEFAULT_RPC_CMD.iter().map(|s| s.to_string()).collect(),
        };
        Self { argv }
    }
}

#[async_trait]
impl Transport for QrexecTransport {
    async fn spawn(&self) -> Result<ServerProcess> {
        let (program, args) = self
            .argv
            .split_first()
            .context("RPC command must not be empty")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn `{program}`"))?;

        let stdin = child.stdin.take().context("child stdin was not piped")?;
        let stdout = child.stdout.take().context("child stdout was not piped")?;

        Ok(ServerProcess {
            child,
            stdin: Some(stdin),
            stdout: tokio::io::BufReader::new(stdout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rpc_cmd_is_used_when_env_var_unset() {
        // SAFETY: tests run single-threaded within this process via
        // `cargo test -- --test-threads=1` is not guaranteed, but this test
        // only reads an env var it doesn't itself mutate concurrently.
        unsafe { std::env::remove_var(RPC_CMD_ENV_VAR) };
        let transport = QrexecTransport::from_env();
        assert_eq!(transport.argv, vec!["qrexec-client-vm", "@dispvm", "qubes.PdfConvert"]);
    }

    #[test]
    fn env_var_overrides_rpc_cmd() {
        unsafe { std::env::set_var(RPC_CMD_ENV_VAR, "echo hello") };
        let transport = QrexecTransport::from_env();
        assert_eq!(transport.argv, vec!["echo", "hello"]);
        unsafe { std::env::remove_var(RPC_CMD_ENV_VAR) };
    }
}
