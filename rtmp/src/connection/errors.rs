use crate::chunk_io::{ChunkDeserializationError, ChunkSerializationError};
use crate::handshake::HandshakeError;
use crate::sessions::ServerSessionError;
use std::io;
use thiserror::Error;

/// The reason a connection was torn down
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Handshake failed: {0}")]
    HandshakeError(#[from] HandshakeError),

    #[error("Failed to read RTMP chunks: {0}")]
    ChunkDeserializationError(#[from] ChunkDeserializationError),

    #[error("Failed to write RTMP chunks: {0}")]
    ChunkSerializationError(#[from] ChunkSerializationError),

    #[error("Session failed: {0}")]
    ServerSessionError(#[from] ServerSessionError),

    /// Includes idle timeouts, which surface as `WouldBlock` or `TimedOut`
    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
}
