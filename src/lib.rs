//! # conduit
//!
//! Run shell-style command pipelines (`"cat log | grep ERROR | wc -l"`) without
//! a shell: each stage is spawned directly, fed the previous stage's output, and
//! supervised with a timeout that escalates from terminate to kill. A single
//! process can also be driven interactively through a [`Connection`].
//!
//! ```no_run
//! use conduit::RunOptions;
//! use std::time::Duration;
//!
//! let options = RunOptions::new().timeout(Duration::from_secs(5));
//! let response = conduit::run("echo hello | tr a-z A-Z", &options)?;
//! assert_eq!(response.std_out(), "HELLO\n");
//! assert_eq!(response.history().len(), 1);
//! # Ok::<(), conduit::ExecutionError>(())
//! ```

pub mod cli;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod system;

pub use crate::core::environment::merge_env;
pub use crate::core::pipeline::Pipeline;
pub use crate::core::settings::{Settings, SettingsError};
pub use crate::core::tokenizer::{TokenizeError, tokenize};
pub use crate::models::{ArgumentVector, CommandLine, ConnectOptions, Response, RunOptions};
pub use crate::system::connection::Connection;
pub use crate::system::executor::ExecutionError;

/// Runs `command` to completion, blocking the calling thread.
///
/// Must not be called from inside an async runtime (it fails with
/// [`ExecutionError::NestedRuntime`]); use [`run_async`] there.
pub fn run(
    command: impl Into<CommandLine>,
    options: &RunOptions,
) -> Result<Response, ExecutionError> {
    Pipeline::parse(command)?.run(options)
}

/// Async form of [`run`].
pub async fn run_async(
    command: impl Into<CommandLine>,
    options: &RunOptions,
) -> Result<Response, ExecutionError> {
    Pipeline::parse(command)?.execute(options).await
}

/// Starts `command` without waiting for it and returns a handle to drive it.
pub fn connect(
    command: impl Into<CommandLine>,
    options: &ConnectOptions,
) -> Result<Connection, ExecutionError> {
    Connection::open(command, options)
}
