//! IPC front-end that accepts commands over a local socket.
//!
//! The board UI (or any script) connects to the socket and sends
//! newline-delimited JSON commands; each gets one JSON reply line.  A
//! `"Subscribe"` request turns the connection into a stream of link
//! reports.

pub mod listener;

pub use listener::{Endpoint, ListenerError, SocketListener};
