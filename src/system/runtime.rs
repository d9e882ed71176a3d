// src/system/runtime.rs

use crate::system::executor::ExecutionError;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Returns the process-wide runtime behind the blocking API, building it on first use.
pub fn shared() -> Result<&'static Runtime, ExecutionError> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("conduit-io")
        .enable_all()
        .build()
        .map_err(ExecutionError::Runtime)?;
    // If another thread won the race, our runtime is simply dropped.
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// Fails with `NestedRuntime` when called from inside an async runtime, where
/// blocking would panic.
pub fn ensure_blocking_allowed() -> Result<(), ExecutionError> {
    if Handle::try_current().is_ok() {
        return Err(ExecutionError::NestedRuntime);
    }
    Ok(())
}

/// Drives `future` to completion on the shared runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, ExecutionError> {
    ensure_blocking_allowed()?;
    Ok(shared()?.block_on(future))
}
