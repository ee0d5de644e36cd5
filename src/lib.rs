//! HTTP/1.1 framing over raw TCP.
//!
//! - [`http`]: header map, incremental request-head parser, state-enforced
//!   response writer with chunked bodies and trailers.
//! - [`net`]: one-task-per-connection server that parses a request and hands
//!   it to a [`Handler`](handler::Handler).
//! - [`handler`]: the handler contract plus the demo router and streaming
//!   proxy.

pub mod config;
pub mod handler;
pub mod http;
pub mod net;
