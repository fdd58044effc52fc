//! Control socket: drive a running daemon from another process.
//!
//! - [`ControlServer`] Unix socket server in the daemon
//! - [`send`] one request/response round trip from the CLI
//! - [`Request`], [`Response`] newline-delimited JSON messages

mod client;
mod protocol;
mod server;

pub use client::send;
pub use protocol::{Request, Response};
pub use server::ControlServer;
