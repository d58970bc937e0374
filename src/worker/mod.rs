//! External worker process management.
//!
//! - `supervisor`: spawning, exit notification, and idempotent termination.

pub mod supervisor;

pub use supervisor::{WorkerExit, WorkerProcess};
