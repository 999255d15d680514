//! RTMP server core: handshake, chunk stream framing, message codecs, the per connection
//! session that answers commands, and the registry that relays published streams to
//! players.
//!
//! A server binds a listener, builds one `ServerContext` and hands every accepted socket
//! to `serve_connection` on its own thread.

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod chunk_io;
pub mod config;
pub mod connection;
pub mod context;
pub mod handshake;
pub mod messages;
pub mod outbound;
pub mod relay;
pub mod sessions;
pub mod time;

pub use config::ServerConfig;
pub use connection::{serve_connection, ConnectionError};
pub use context::ServerContext;
pub use relay::{LiveStreamNotifier, NoopNotifier, StreamRegistry};
