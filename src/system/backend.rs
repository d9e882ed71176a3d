//! # Process Backends
//!
//! The seam between the execution engine and the operating system. The engine
//! only ever talks to a [`Backend`] (to spawn) and a [`Process`] (to feed,
//! drain, wait for and signal a running child), so an alternate spawning
//! strategy can be plugged in without touching the stage runner or the
//! interactive connection.
//!
//! [`TokioBackend`] is the default implementation, built on `tokio::process`.

use crate::core::environment::EnvMap;
use crate::models::ArgumentVector;
use crate::system::signals::{self, SignalKind};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command as TokioCommand};

/// Write half of a child's stdin.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
/// Read half of a child's stdout or stderr.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Everything needed to start one process.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    /// Program and arguments.
    pub argv: &'a ArgumentVector,
    /// The complete environment of the child (nothing else is inherited).
    pub env: &'a EnvMap,
    /// Working directory, or the caller's when `None`.
    pub cwd: Option<&'a Path>,
}

/// The three piped standard streams of a freshly spawned process.
#[derive(Default)]
pub struct ProcessStdio {
    /// Closing (dropping) it signals end of input to the child.
    pub stdin: Option<BoxedWriter>,
    pub stdout: Option<BoxedReader>,
    pub stderr: Option<BoxedReader>,
}

impl fmt::Debug for ProcessStdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessStdio")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// A strategy for starting processes with piped standard streams.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Starts the process described by `request` with stdin, stdout and stderr piped.
    fn spawn(&self, request: &SpawnRequest<'_>) -> io::Result<Box<dyn Process>>;
}

/// A running (or finished but not yet observed) child process.
#[async_trait]
pub trait Process: Send + fmt::Debug {
    /// OS process id, `None` once the process has been reaped.
    fn pid(&self) -> Option<u32>;

    /// Hands over the piped streams. Subsequent calls return empty handles.
    fn take_stdio(&mut self) -> ProcessStdio;

    /// Waits for the process to exit. Must be cancel-safe: dropping the future
    /// leaves the process untouched.
    async fn wait(&mut self) -> io::Result<ExitStatus>;

    /// Returns the exit status if the process has already exited.
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Delivers one escalation step. Benign on a process that already exited.
    fn signal(&mut self, kind: SignalKind) -> io::Result<()>;
}

/// Spawns processes through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackend;

impl Backend for TokioBackend {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn spawn(&self, request: &SpawnRequest<'_>) -> io::Result<Box<dyn Process>> {
        let program = request.argv.program().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector")
        })?;

        let mut command = TokioCommand::new(program);
        command
            .args(request.argv.args())
            .env_clear()
            .envs(request.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Guarantees the child does not outlive a dropped handle.
            .kill_on_drop(true);
        if let Some(cwd) = request.cwd {
            command.current_dir(dunce::simplified(cwd));
        }

        let child = command.spawn()?;
        log::debug!(
            "[{}] Spawned '{}' (PID: {:?})",
            self.name(),
            request.argv,
            child.id()
        );
        Ok(Box::new(TokioProcess { child }))
    }
}

#[derive(Debug)]
struct TokioProcess {
    child: Child,
}

#[async_trait]
impl Process for TokioProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdio(&mut self) -> ProcessStdio {
        ProcessStdio {
            stdin: self
                .child
                .stdin
                .take()
                .map(|stdin| Box::new(stdin) as BoxedWriter),
            stdout: self
                .child
                .stdout
                .take()
                .map(|stdout| Box::new(stdout) as BoxedReader),
            stderr: self
                .child
                .stderr
                .take()
                .map(|stderr| Box::new(stderr) as BoxedReader),
        }
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    fn signal(&mut self, kind: SignalKind) -> io::Result<()> {
        signals::send(&mut self.child, kind)
    }
}
