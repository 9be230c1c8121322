// SwitchLab: Blackbox integration tests for a switch routing stack
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module for executing commands on the hosts of a topology.
//!
//! A [`Probe`] runs one command in a given [`ExecContext`]: directly on the machine that runs the
//! harness, inside a named container (`docker exec`), or inside a named network namespace
//! (`ip netns exec`). The probe captures output and exit status and carries no retry logic of its
//! own; callers decide whether a failure is fatal or retryable.
//!
//! All command execution goes through the [`CommandRunner`] trait. The [`SystemRunner`] spawns
//! real processes; tests inject a scripted runner instead.

use std::{fmt, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use thiserror::Error;
use tokio::{io::AsyncReadExt, process::Command, time::timeout};

/// Where a command is executed.
///
/// The context only changes how the command line is wrapped; the probe API is the same for all
/// three.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExecContext {
    /// On the machine running the harness (used for `ip netns` management and the device CLI).
    Local,
    /// Inside a running container, via `docker exec`.
    Container(String),
    /// Inside a network namespace, via `ip netns exec`.
    Netns(String),
}

impl ExecContext {
    /// Name of the execution context, used as the `[host]` prefix in log messages.
    pub fn name(&self) -> &str {
        match self {
            ExecContext::Local => "local",
            ExecContext::Container(name) | ExecContext::Netns(name) => name,
        }
    }

    /// Build the full command line for executing `args` in this context.
    pub(crate) fn command_line(&self, args: &[impl AsRef<str>]) -> Vec<String> {
        let mut cmd: Vec<String> = match self {
            ExecContext::Local => Vec::new(),
            ExecContext::Container(name) => {
                vec!["docker".to_string(), "exec".to_string(), name.clone()]
            }
            ExecContext::Netns(name) => vec![
                "ip".to_string(),
                "netns".to_string(),
                "exec".to_string(),
                name.clone(),
            ],
        };
        cmd.extend(args.iter().map(|a| a.as_ref().to_string()));
        cmd
    }
}

/// Captured result of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl CmdOutput {
    /// Construct a successful output with the given stdout. Mostly useful in tests.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// Construct a failed output with the given exit code.
    pub fn failed(code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            code: Some(code),
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Both output streams, concatenated. Pattern matching always runs over the combined output,
    /// as the daemons under test are not consistent about which stream they use.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }
}

/// Executor of external commands. Implemented by [`SystemRunner`] for real processes; tests
/// provide scripted implementations to exercise fixtures and steps without touching the network.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute `args` in the given context and wait for it to exit.
    async fn run(&self, ctx: &ExecContext, args: &[String]) -> Result<CmdOutput, ExecError>;
}

/// The [`CommandRunner`] that spawns real processes through [`tokio::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, ctx: &ExecContext, args: &[String]) -> Result<CmdOutput, ExecError> {
        let argv = ctx.command_line(args);
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| ExecError::EmptyCommand(ctx.name().to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd.kill_on_drop(true);
        log::trace!("[{}] `{}`", ctx.name(), argv.iter().join(" "));

        let output = cmd.output().await.map_err(|e| {
            log::error!("[{}] {} failed: {}", ctx.name(), argv.iter().join(" "), e);
            ExecError::Spawn(ctx.name().to_string(), argv.iter().join(" "), e)
        })?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

/// A handle to execute commands on one host of the topology.
#[derive(Clone)]
pub struct Probe {
    ctx: ExecContext,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe").field("ctx", &self.ctx).finish()
    }
}

impl Probe {
    /// Create a probe for the given execution context.
    pub fn new(ctx: ExecContext, runner: Arc<dyn CommandRunner>) -> Self {
        Self { ctx, runner }
    }

    /// Create a probe that executes directly on the machine running the harness.
    pub fn local(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(ExecContext::Local, runner)
    }

    /// Name of the host this probe executes on.
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// The execution context of this probe.
    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    /// Execute a command without interpreting the exit status.
    pub async fn try_output(
        &self,
        args: &[impl AsRef<str> + Sync],
    ) -> Result<CmdOutput, ExecError> {
        self.runner
            .run(&self.ctx, &ctx_args(args))
            .await
    }

    /// Execute a command and return the combined output. A non-zero exit code is an error
    /// carrying the exit code and the command line.
    pub async fn output(&self, args: &[impl AsRef<str> + Sync]) -> Result<String, ExecError> {
        let out = self.try_output(args).await?;
        check_output(self.name(), out, || args.iter().map(AsRef::as_ref).join(" "))
    }

    /// Execute a command and return whether it exited successfully. Never fails on a non-zero
    /// exit code; used for existence tests and retryable checks.
    pub async fn status(&self, args: &[impl AsRef<str> + Sync]) -> Result<bool, ExecError> {
        Ok(self.try_output(args).await?.success())
    }

    /// Execute a command, expect it to succeed, and discard the output.
    pub async fn run(&self, args: &[impl AsRef<str> + Sync]) -> Result<(), ExecError> {
        self.output(args).await.map(|_| ())
    }
}

fn ctx_args(args: &[impl AsRef<str>]) -> Vec<String> {
    args.iter().map(|a| a.as_ref().to_string()).collect()
}

/// Check the output for a successful exit code. On failure, log the command together with both
/// output streams and return an error carrying the exit code.
pub fn check_output<F, S>(host: &str, out: CmdOutput, cmd: F) -> Result<String, ExecError>
where
    F: FnOnce() -> S,
    S: fmt::Display,
{
    if out.success() {
        Ok(out.combined())
    } else {
        let cmd = cmd().to_string();
        log::error!(
            "[{}] {} exited with exit code {}{}{}",
            host,
            cmd,
            out.code.unwrap_or_default(),
            if out.stdout.is_empty() {
                String::new()
            } else {
                format!("\nSTDOUT:\n{}", out.stdout)
            },
            if out.stderr.is_empty() {
                String::new()
            } else {
                format!("\nSTDERR:\n{}", out.stderr)
            }
        );
        Err(ExecError::CommandFailed(
            host.to_string(),
            cmd,
            out.code.unwrap_or_default(),
        ))
    }
}

/// A long-running background command (flood generators, packet captures, daemons under test).
///
/// The handle spawns the process detached from the calling step and kills it on [`CmdHandle::stop`]
/// (or when dropped). The captured output is returned by `stop`, so that a step can rendezvous
/// with the background command before asserting on what it saw.
pub struct CmdHandle {
    process_name: String,
    ctx: ExecContext,
    args: Vec<String>,
    child: Option<tokio::process::Child>,
}

impl CmdHandle {
    /// Create a new handle without starting the process.
    pub fn new(
        process_name: impl AsRef<str>,
        ctx: ExecContext,
        args: &[impl AsRef<str>],
    ) -> Self {
        Self {
            process_name: process_name.as_ref().to_string(),
            ctx,
            args: ctx_args(args),
            child: None,
        }
    }

    /// Spawn the command in the background. If the process is already running, this function will
    /// do nothing.
    pub fn start(&mut self) -> Result<(), ExecError> {
        if self.child.is_some() {
            return Ok(());
        }
        log::debug!("[{}] start {}!", self.ctx.name(), self.process_name);

        let argv = self.ctx.command_line(&self.args);
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| ExecError::EmptyCommand(self.ctx.name().to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(rest)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::trace!("[{}] `{}`", self.ctx.name(), argv.iter().join(" "));
        self.child = Some(
            cmd.spawn()
                .map_err(|e| ExecError::Spawn(self.ctx.name().to_string(), argv.join(" "), e))?,
        );
        Ok(())
    }

    /// Wait for the process to exit on its own (e.g., when started under `timeout`), and return
    /// its captured output. Returns an empty output if the process was never started.
    pub async fn wait(mut self) -> Result<CmdOutput, ExecError> {
        match self.child.take() {
            Some(child) => {
                let out = child.wait_with_output().await?;
                Ok(CmdOutput {
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    code: out.status.code(),
                })
            }
            None => Ok(CmdOutput::default()),
        }
    }

    /// Kill the process and return the output captured so far. If it was not started, this
    /// function will do nothing.
    pub async fn stop(mut self) -> Result<CmdOutput, ExecError> {
        log::debug!("[{}] stop {}!", self.ctx.name(), self.process_name);
        let mut result = CmdOutput::default();
        if let Some(mut child) = self.child.take() {
            child.kill().await?;
            result.code = None;
            if let Some(mut stdout) = child.stdout.take() {
                // give the pipe a moment to drain, then read whatever is buffered
                let mut buf = Vec::new();
                let _ = timeout(Duration::from_secs(1), stdout.read_to_end(&mut buf)).await;
                result.stdout = String::from_utf8_lossy(&buf).into_owned();
            }
            if let Some(mut stderr) = child.stderr.take() {
                let mut buf = Vec::new();
                let _ = timeout(Duration::from_secs(1), stderr.read_to_end(&mut buf)).await;
                result.stderr = String::from_utf8_lossy(&buf).into_owned();
            }
            if !result.stdout.is_empty() || !result.stderr.is_empty() {
                log::trace!(
                    "[{}] killed {}.{}{}",
                    self.ctx.name(),
                    self.process_name,
                    if result.stdout.is_empty() {
                        String::new()
                    } else {
                        format!("\nSTDOUT:\n{}", result.stdout)
                    },
                    if result.stderr.is_empty() {
                        String::new()
                    } else {
                        format!("\nSTDERR:\n{}", result.stderr)
                    }
                );
            }
        }
        Ok(result)
    }

    /// Name of the background process, used for logging.
    pub fn process_name(&self) -> &str {
        &self.process_name
    }
}

/// Error kind returned by [`Probe`] and [`CmdHandle`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be spawned.
    #[error("Cannot spawn `{1}` on {0}: {2}")]
    Spawn(String, String, #[source] std::io::Error),
    /// The command exited with a non-zero exit code.
    #[error("Non-zero exit code of command `{1}` on {0}: {2}")]
    CommandFailed(String, String, i32),
    /// An empty command line was passed to a probe.
    #[error("Empty command on {0}")]
    EmptyCommand(String),
    /// I/O error while interacting with a child process.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Return the exit code if the error was a [`ExecError::CommandFailed`]. Otherwise, return
    /// `None`.
    pub fn status(&self) -> Option<i32> {
        if let ExecError::CommandFailed(_, _, status) = self {
            Some(*status)
        } else {
            None
        }
    }
}
