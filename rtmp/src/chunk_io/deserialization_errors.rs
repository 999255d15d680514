use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while deserializing
/// RTMP chunks.  Every variant is fatal to the connection, as the framing state of the
/// peer can no longer be trusted once a chunk has been misread.
#[derive(Debug, Error)]
pub enum ChunkDeserializationError {
    /// The `fmt` bits of a basic header held a value outside of 0 through 3
    #[error("Received a chunk with an unknown header format of {format}")]
    UnknownChunkFormat { format: u8 },

    /// The max chunk size does not allow chunk sizes more than 2,147,483,647 (since it's encoded in only
    /// 31 bits of the SetChunkSize message) or a chunk size of zero.
    #[error("Requested an invalid max chunk size of {chunk_size}.  Chunk sizes must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: usize },

    /// A message header was received on a chunk stream that was still in the middle of
    /// receiving another message
    #[error("Received a new message header on csid {csid} with {received} of {declared} bytes of the previous message read")]
    InterruptedMessage {
        csid: u32,
        declared: u32,
        received: usize,
    },

    /// An I/O error occurred while reading the input, including the peer closing the socket
    #[error("{0}")]
    Io(#[from] io::Error),
}
