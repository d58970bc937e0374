//! Worker event protocol.
//!
//! - `codec`: JSON encoding of requests and typed decoding of inbound frames.
//! - `dispatcher`: exhaustive routing of decoded events to an
//!   [`EventHandler`](dispatcher::EventHandler).

pub mod codec;
pub mod dispatcher;
