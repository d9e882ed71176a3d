// src/system/executor.rs

//! The stage runner: spawns one process, feeds it, drains it, and enforces the
//! timeout → terminate → kill escalation.

use crate::core::environment::EnvMap;
use crate::core::tokenizer::TokenizeError;
use crate::models::{ArgumentVector, RunOptions};
use crate::system::backend::{Backend, BoxedWriter, Process, SpawnRequest};
use crate::system::capture::{self, SharedCapture};
use crate::system::signals::{self, SignalKind};
use std::io;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time;

/// How long readers may keep draining once a time-limited process is gone.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error("Command '{command}' could not be executed: {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Piped commands cannot be connected interactively ({stages} stages given).")]
    PipedConnect { stages: usize },
    #[error("Standard input of '{0}' is already closed.")]
    StdinClosed(String),
    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("The blocking API cannot be called from inside an async runtime; use the async variant.")]
    NestedRuntime,
    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// When to give up on a stage and how hard to push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Time the process may run before escalation. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Time between the terminate and kill steps.
    pub kill_timeout: Duration,
}

impl From<&RunOptions> for TerminationPolicy {
    fn from(options: &RunOptions) -> Self {
        Self {
            timeout: options.timeout,
            kill_timeout: options.kill_timeout.unwrap_or(Duration::ZERO),
        }
    }
}

/// Shared, read-only inputs of every stage in one run.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub backend: &'a dyn Backend,
    pub env: &'a EnvMap,
    pub cwd: Option<&'a Path>,
    pub policy: TerminationPolicy,
    pub capture_limit: Option<usize>,
}

/// What a finished stage produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status_code: i32,
    /// True when the timeout fired and the escalation ran.
    pub timed_out: bool,
}

/// Lifecycle of a stage's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Created,
    Running { pid: Option<u32> },
    Terminated { status_code: i32 },
}

/// Owns one pipeline stage from spawn to exit.
#[derive(Debug)]
pub struct StageRunner {
    argv: ArgumentVector,
    state: StageState,
}

impl StageRunner {
    pub fn new(argv: ArgumentVector) -> Self {
        Self {
            argv,
            state: StageState::Created,
        }
    }

    pub fn argv(&self) -> &ArgumentVector {
        &self.argv
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// The exit code, present only once the process has terminated.
    pub fn status_code(&self) -> Option<i32> {
        match self.state {
            StageState::Terminated { status_code } => Some(status_code),
            _ => None,
        }
    }

    /// Runs the stage to completion.
    ///
    /// `input` is written to stdin and stdin is closed; without input stdin is
    /// closed right away. The process races `policy.timeout`; on expiry it gets
    /// a terminate signal, then `policy.kill_timeout` to exit, then a kill.
    /// This never returns while the process is still alive.
    ///
    /// # Errors
    /// `SpawnFailure` when the program cannot be started, `Io` when waiting on
    /// it fails. A non-zero exit or a timeout is not an error.
    pub async fn run(
        &mut self,
        input: Option<Vec<u8>>,
        context: &StageContext<'_>,
    ) -> Result<StageOutput, ExecutionError> {
        let command_line = self.argv.to_string();
        let request = SpawnRequest {
            argv: &self.argv,
            env: context.env,
            cwd: context.cwd,
        };
        let mut process =
            context
                .backend
                .spawn(&request)
                .map_err(|e| ExecutionError::SpawnFailure {
                    command: command_line.clone(),
                    source: e,
                })?;
        self.state = StageState::Running {
            pid: process.pid(),
        };

        let stdio = process.take_stdio();
        let feeder = tokio::spawn(feed_stdin(stdio.stdin, input, command_line.clone()));
        let stdout_capture = SharedCapture::new(context.capture_limit);
        let stderr_capture = SharedCapture::new(context.capture_limit);
        let stdout_reader = capture::spawn_reader(stdio.stdout, stdout_capture.clone(), "stdout");
        let stderr_reader = capture::spawn_reader(stdio.stderr, stderr_capture.clone(), "stderr");

        let (status, timed_out) = supervise(process.as_mut(), &context.policy, &command_line)
            .await
            .map_err(|e| ExecutionError::Io {
                command: command_line.clone(),
                source: e,
            })?;
        // Whatever input is left has nowhere to go.
        feeder.abort();

        // Without a timeout, output is read until every holder of the pipes closes them.
        let grace = (timed_out || context.policy.timeout.is_some()).then_some(OUTPUT_DRAIN_GRACE);
        let (stdout, stderr) = tokio::join!(
            capture::finish(stdout_reader, &stdout_capture, grace, "stdout"),
            capture::finish(stderr_reader, &stderr_capture, grace, "stderr"),
        );

        let status_code = signals::status_code(status);
        self.state = StageState::Terminated { status_code };
        log::debug!(
            "Stage '{}' finished with status {} ({} bytes stdout, {} bytes stderr)",
            command_line,
            status_code,
            stdout.len(),
            stderr.len()
        );

        Ok(StageOutput {
            stdout,
            stderr,
            status_code,
            timed_out,
        })
    }
}

/// Writes `input` (if any) and closes the child's stdin.
async fn feed_stdin(stdin: Option<BoxedWriter>, input: Option<Vec<u8>>, command: String) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if let Some(data) = input {
        match stdin.write_all(&data).await {
            Ok(()) => log::trace!("Fed {} bytes to '{}'", data.len(), command),
            // The consumer exited before reading everything (`head`, for instance).
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("'{}' closed its stdin early", command);
            }
            Err(e) => log::warn!("Failed to write stdin of '{}': {}", command, e),
        }
    }
    drop(stdin);
}

/// Waits for the process, escalating if the timeout expires first.
/// Returns the exit status and whether the escalation ran.
async fn supervise(
    process: &mut dyn Process,
    policy: &TerminationPolicy,
    command: &str,
) -> io::Result<(ExitStatus, bool)> {
    let Some(limit) = policy.timeout else {
        return Ok((process.wait().await?, false));
    };

    match time::timeout(limit, process.wait()).await {
        Ok(status) => Ok((status?, false)),
        Err(_) => {
            log::warn!("'{}' exceeded its {:?} timeout; terminating.", command, limit);
            let status = escalate(process, policy.kill_timeout, command).await?;
            Ok((status, true))
        }
    }
}

/// Terminate, wait up to `kill_timeout`, then kill and wait without bound.
pub async fn escalate(
    process: &mut dyn Process,
    kill_timeout: Duration,
    command: &str,
) -> io::Result<ExitStatus> {
    if let Err(e) = process.signal(SignalKind::Terminate) {
        log::warn!("Failed to terminate '{}': {}", command, e);
    }
    if let Ok(status) = time::timeout(kill_timeout, process.wait()).await {
        return status;
    }

    log::warn!(
        "'{}' still running {:?} after terminate; killing.",
        command,
        kill_timeout
    );
    process.signal(SignalKind::Kill)?;
    process.wait().await
}
