use std::io;
use thiserror::Error;

/// Errors that end a handshake.  None of them are recoverable, the connection has to be
/// closed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// C0 did not carry RTMP version 3
    #[error("First byte of the handshake was {version} instead of 3")]
    BadVersionId { version: u8 },

    /// C2 did not echo the time sent in S1
    #[error("Peer did not send the correct time back")]
    IncorrectPeerTime,

    /// C2 did not echo the random data sent in S1
    #[error("Peer did not send the correct random data back")]
    IncorrectRandomData,

    /// Reading from or writing to the peer failed, including the peer hanging up early
    #[error("{0}")]
    Io(#[from] io::Error),
}
