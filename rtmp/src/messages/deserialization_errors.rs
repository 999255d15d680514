use rtmp_relay_amf0::Amf0DeserializationError;
use std::io;
use thiserror::Error;

/// Enumeration that represents the various errors that may occur while trying to
/// deserialize a RTMP message
#[derive(Debug, Error)]
pub enum MessageDeserializationError {
    /// The bytes or amf0 values contained in the message were not what were expected, and thus
    /// the message could not be parsed.
    #[error("The message was not encoded in an expected format")]
    InvalidMessageFormat,

    /// A SetChunkSize message carried a zero size or had its reserved high bit set
    #[error("Peer requested an invalid chunk size of {size}")]
    InvalidChunkSize { size: u32 },

    /// The user control message carried an event id that is not known
    #[error("Unknown user control event type {event_id}")]
    UnknownUserControlEvent { event_id: u16 },

    /// The bytes in the message that were expected to be AMF0 values were not properly encoded,
    /// and thus could not be read
    #[error("The message did no contain valid Amf0 encoded values: {0}")]
    Amf0DeserializationError(#[from] Amf0DeserializationError),

    /// Failed to read the values from the input buffer
    #[error("An IO error occurred while reading the input: {0}")]
    Io(#[from] io::Error),
}
