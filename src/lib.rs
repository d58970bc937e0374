#![forbid(unsafe_code)]

//! `worker-harness` launches an image-processing worker, sends it one
//! request over WebSocket, and reports the responses.

pub mod cli;
pub mod config;
pub mod connection;
pub mod errors;
pub mod harness;
pub mod protocol;
pub mod worker;

pub use config::{Endpoint, HarnessConfig};
pub use errors::{AppError, Result};
