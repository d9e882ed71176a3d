//! # Interactive Connection
//!
//! A single long-lived process driven by hand: write lines to its stdin, peek at
//! what it printed so far, wait for it or kill it. Unlike a pipeline run nothing
//! here blocks until asked to.
//!
//! A connection whose exit has not been observed kills its process when dropped,
//! so the child never outlives the scope that owns it, even when that scope is
//! left through an error.

use crate::constants::DEFAULT_LINE_ENDING;
use crate::core::environment;
use crate::core::tokenizer::tokenize;
use crate::models::{ArgumentVector, CommandLine, ConnectOptions};
use crate::system::backend::{Backend, BoxedWriter, Process, SpawnRequest, TokioBackend};
use crate::system::capture::{self, SharedCapture};
use crate::system::executor::ExecutionError;
use crate::system::runtime;
use crate::system::signals::{self, SignalKind};
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

/// How long readers may keep draining once a killed process is gone.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A running process with open standard streams.
pub struct Connection {
    command: ArgumentVector,
    process: Box<dyn Process>,
    stdin: Option<BoxedWriter>,
    stdout: SharedCapture,
    stderr: SharedCapture,
    readers: Option<(JoinHandle<()>, JoinHandle<()>)>,
    status_code: Option<i32>,
    killed: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("command", &self.command)
            .field("pid", &self.process.pid())
            .field("stdin_open", &self.stdin.is_some())
            .field("status_code", &self.status_code)
            .field("killed", &self.killed)
            .finish()
    }
}

impl Connection {
    /// Spawns `command` with the default backend without waiting for it.
    pub fn open(
        command: impl Into<CommandLine>,
        options: &ConnectOptions,
    ) -> Result<Self, ExecutionError> {
        Self::open_with(&TokioBackend, command, options)
    }

    /// Spawns `command` through `backend` without waiting for it.
    ///
    /// # Errors
    /// * `PipedConnect` if the command has more than one stage.
    /// * `SpawnFailure` if the program cannot be started.
    /// * `NestedRuntime` if called from inside an async runtime.
    pub fn open_with(
        backend: &dyn Backend,
        command: impl Into<CommandLine>,
        options: &ConnectOptions,
    ) -> Result<Self, ExecutionError> {
        runtime::ensure_blocking_allowed()?;

        let mut stages = tokenize(command)?;
        if stages.len() > 1 {
            return Err(ExecutionError::PipedConnect {
                stages: stages.len(),
            });
        }
        let argv = stages.pop().unwrap_or_default();
        let env = environment::child_env(&options.env);
        let request = SpawnRequest {
            argv: &argv,
            env: &env,
            cwd: options.cwd.as_deref(),
        };

        let shared = runtime::shared()?;
        let stdout = SharedCapture::new(None);
        let stderr = SharedCapture::new(None);
        // Spawning and the reader tasks need the runtime context; blocking calls must not.
        let (process, stdin, readers) = {
            let _guard = shared.enter();
            let mut process = backend
                .spawn(&request)
                .map_err(|e| ExecutionError::SpawnFailure {
                    command: argv.to_string(),
                    source: e,
                })?;
            let stdio = process.take_stdio();
            let readers = (
                capture::spawn_reader(stdio.stdout, stdout.clone(), "stdout"),
                capture::spawn_reader(stdio.stderr, stderr.clone(), "stderr"),
            );
            (process, stdio.stdin, readers)
        };
        log::debug!("Connected to '{}' (PID: {:?})", argv, process.pid());

        let mut connection = Self {
            command: argv,
            process,
            stdin,
            stdout,
            stderr,
            readers: Some(readers),
            status_code: None,
            killed: false,
        };
        if let Some(input) = &options.input {
            connection.write(input)?;
        }
        Ok(connection)
    }

    /// The argument vector this connection runs.
    pub fn command(&self) -> &ArgumentVector {
        &self.command
    }

    /// The process id, `None` once the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// The exit code, `None` until `block` or `poll` has seen the process exit.
    pub fn status_code(&self) -> Option<i32> {
        self.status_code
    }

    /// Everything the process wrote to stdout so far.
    pub fn std_out(&self) -> String {
        String::from_utf8_lossy(&self.stdout.snapshot()).into_owned()
    }

    /// Everything the process wrote to stderr so far.
    pub fn std_err(&self) -> String {
        String::from_utf8_lossy(&self.stderr.snapshot()).into_owned()
    }

    /// Writes `text` followed by a newline to the process's stdin.
    pub fn send(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.send_with_ending(text, DEFAULT_LINE_ENDING)
    }

    /// Writes `text` followed by `line_ending` to the process's stdin.
    pub fn send_with_ending(&mut self, text: &str, line_ending: &str) -> Result<(), ExecutionError> {
        let mut line = String::with_capacity(text.len() + line_ending.len());
        line.push_str(text);
        line.push_str(line_ending);
        self.write(line.as_bytes())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ExecutionError> {
        let command = &self.command;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ExecutionError::StdinClosed(command.to_string()))?;
        runtime::block_on(async {
            stdin.write_all(bytes).await?;
            stdin.flush().await
        })?
        .map_err(|e| ExecutionError::Io {
            command: command.to_string(),
            source: e,
        })
    }

    /// Closes stdin so the process sees end of input. Idempotent.
    pub fn close_stdin(&mut self) {
        if self.stdin.take().is_some() {
            log::trace!("Closed stdin of '{}'", self.command);
        }
    }

    /// Blocks until the process exits and its output is drained, then returns
    /// (and records) its status code. Calling it again returns the same code.
    ///
    /// Output is read until every holder of the pipes closes them, so a
    /// background descendant that keeps writing is waited for. After `kill` the
    /// drain is bounded instead.
    pub fn block(&mut self) -> Result<i32, ExecutionError> {
        let status_code = match self.status_code {
            Some(code) => code,
            None => {
                let status =
                    runtime::block_on(self.process.wait())?.map_err(|e| ExecutionError::Io {
                        command: self.command.to_string(),
                        source: e,
                    })?;
                self.record_exit(signals::status_code(status))
            }
        };
        self.drain_readers()?;
        Ok(status_code)
    }

    /// Checks, without blocking, whether the process has exited.
    ///
    /// Output may still be arriving after an exit is seen here; `block` waits for
    /// the rest of it.
    pub fn poll(&mut self) -> Result<Option<i32>, ExecutionError> {
        if let Some(code) = self.status_code {
            return Ok(Some(code));
        }
        let exited = {
            let _guard = runtime::shared()?.enter();
            self.process.try_wait()
        }
        .map_err(|e| ExecutionError::Io {
            command: self.command.to_string(),
            source: e,
        })?;
        Ok(exited.map(|status| self.record_exit(signals::status_code(status))))
    }

    /// Forcefully stops the process. Does nothing once its exit has been observed.
    pub fn kill(&mut self) -> Result<(), ExecutionError> {
        if self.status_code.is_some() {
            return Ok(());
        }
        self.killed = true;
        self.process
            .signal(SignalKind::Kill)
            .map_err(|e| ExecutionError::Io {
                command: self.command.to_string(),
                source: e,
            })
    }

    fn record_exit(&mut self, status_code: i32) -> i32 {
        self.stdin = None;
        self.status_code = Some(status_code);
        log::debug!("'{}' exited with status {}", self.command, status_code);
        status_code
    }

    fn drain_readers(&mut self) -> Result<(), ExecutionError> {
        let Some((stdout_reader, stderr_reader)) = self.readers.take() else {
            return Ok(());
        };
        let grace = self.killed.then_some(OUTPUT_DRAIN_GRACE);
        runtime::block_on(async {
            tokio::join!(
                capture::wait_reader(stdout_reader, grace, "stdout"),
                capture::wait_reader(stderr_reader, grace, "stderr"),
            )
        })?;
        log::trace!(
            "'{}' output drained ({} bytes stdout, {} bytes stderr)",
            self.command,
            self.stdout.snapshot().len(),
            self.stderr.snapshot().len()
        );
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.status_code.is_none() {
            log::debug!("Connection to '{}' dropped while running; killing it.", self.command);
            if let Err(e) = self.process.signal(SignalKind::Kill) {
                log::warn!("Failed to kill '{}': {}", self.command, e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_status_code_is_none_while_running() {
        let mut connection = Connection::open("sleep 5", &ConnectOptions::new()).unwrap();
        assert_eq!(connection.status_code(), None);
        assert!(connection.pid().is_some());
        connection.kill().unwrap();
    }

    #[test]
    fn test_block_records_status_code() {
        let mut connection = Connection::open("sleep 0.2", &ConnectOptions::new()).unwrap();
        assert_eq!(connection.status_code(), None);

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.status_code(), Some(0));
        // Idempotent.
        assert_eq!(connection.block().unwrap(), 0);
    }

    #[test]
    fn test_echo_output_is_captured() {
        let mut connection = Connection::open("echo hi", &ConnectOptions::new()).unwrap();
        thread::sleep(Duration::from_millis(200));

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "hi\n");
        assert_eq!(connection.std_err(), "");
    }

    #[test]
    fn test_status_is_not_polled_automatically() {
        let mut connection = Connection::open("true", &ConnectOptions::new()).unwrap();
        thread::sleep(Duration::from_millis(300));
        // The process is long gone, but nobody looked yet.
        assert_eq!(connection.status_code(), None);

        let mut observed = connection.poll().unwrap();
        for _ in 0..50 {
            if observed.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
            observed = connection.poll().unwrap();
        }
        assert_eq!(observed, Some(0));
        assert_eq!(connection.status_code(), Some(0));
    }

    #[test]
    fn test_block_waits_for_late_writers() {
        // --- Setup ---
        let mut connection = Connection::open(
            "sh -c '(sleep 3; echo late) & echo early'",
            &ConnectOptions::new(),
        )
        .unwrap();

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "early\nlate\n");
    }

    #[test]
    fn test_poll_does_not_wait_for_output_drain() {
        // --- Setup ---
        // The shell exits at once while a background child keeps stdout open.
        let mut connection = Connection::open(
            "sh -c '(sleep 3; echo late) & echo early'",
            &ConnectOptions::new(),
        )
        .unwrap();

        let mut observed = None;
        for _ in 0..50 {
            let started = Instant::now();
            observed = connection.poll().unwrap();
            assert!(started.elapsed() < Duration::from_secs(1));
            if observed.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert_eq!(observed, Some(0));
        assert!(!connection.std_out().contains("late"));

        // `block` still collects whatever arrives afterwards.
        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "early\nlate\n");
    }

    #[test]
    fn test_send_lines_to_stdin() {
        let mut connection = Connection::open("cat", &ConnectOptions::new()).unwrap();
        connection.send("hello").unwrap();
        connection.send_with_ending("world", "\r\n").unwrap();
        connection.close_stdin();

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "hello\nworld\r\n");
    }

    #[test]
    fn test_initial_input_is_written_and_stdin_stays_open() {
        let options = ConnectOptions::new().input("first\n");
        let mut connection = Connection::open("cat", &options).unwrap();
        connection.send("second").unwrap();
        connection.close_stdin();

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "first\nsecond\n");
    }

    #[test]
    fn test_send_after_close_fails() {
        let mut connection = Connection::open("cat", &ConnectOptions::new()).unwrap();
        connection.close_stdin();

        assert!(matches!(
            connection.send("late"),
            Err(ExecutionError::StdinClosed(_))
        ));
        assert_eq!(connection.block().unwrap(), 0);
    }

    #[test]
    fn test_kill_stops_process() {
        let mut connection = Connection::open("sleep 30", &ConnectOptions::new()).unwrap();
        connection.kill().unwrap();

        assert_eq!(connection.block().unwrap(), -9);
        // Killing an exited process is harmless.
        connection.kill().unwrap();
    }

    #[test]
    fn test_env_is_passed_to_child() {
        let options = ConnectOptions::new().env("CONDUIT_CONNECT_VAR", "present");
        let mut connection =
            Connection::open("sh -c 'printf %s \"$CONDUIT_CONNECT_VAR\"'", &options).unwrap();

        assert_eq!(connection.block().unwrap(), 0);
        assert_eq!(connection.std_out(), "present");
    }

    #[test]
    fn test_piped_command_is_rejected() {
        let result = Connection::open("echo hi | cat", &ConnectOptions::new());
        assert!(matches!(
            result,
            Err(ExecutionError::PipedConnect { stages: 2 })
        ));
    }

    #[test]
    fn test_drop_kills_running_process() {
        let pid = {
            let connection = Connection::open("sleep 30", &ConnectOptions::new()).unwrap();
            connection.pid().unwrap()
        };
        // After the kill the PID either vanished or is a zombie awaiting the reaper.
        thread::sleep(Duration::from_millis(300));
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid));
        if let Ok(stat) = stat {
            assert!(stat.contains(") Z"), "process still alive: {}", stat);
        }
    }
}
