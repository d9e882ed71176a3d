//! # System Interaction Layer
//!
//! Everything that touches real processes lives here, behind the pure command
//! and option models of the crate root.
//!
//! ## Modules
//!
//! - **`backend`**: The `Backend`/`Process` traits and the default tokio implementation.
//! - **`capture`**: Background tasks draining stdout and stderr into shared buffers.
//! - **`connection`**: A single interactive process driven through `send`, `block` and `kill`.
//! - **`executor`**: The stage runner and its timeout → terminate → kill escalation.
//! - **`runtime`**: The shared runtime that backs the blocking API.
//! - **`signals`**: Platform differences in stopping a process and reading its status.

pub mod backend;
pub mod capture;
pub mod connection;
pub mod executor;
pub mod runtime;
pub mod signals;
