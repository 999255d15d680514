use rtmp_relay_amf0::Amf0SerializationError;
use std::io;
use thiserror::Error;

/// Enumeration that represents the various errors that may occur while trying to
/// serialize a RTMP message into a raw RTMP payload.
#[derive(Debug, Error)]
pub enum MessageSerializationError {
    /// An invalid chunk size value was provided
    #[error("Cannot serialize a SetChunkSize message with a size of 0 or of 2147483648 or greater")]
    InvalidChunkSize,

    /// A user control event was missing the field its event type requires
    #[error("User control event {event_type} requires a {field} value")]
    MissingUserControlField {
        event_type: &'static str,
        field: &'static str,
    },

    /// The values provided could not be serialized into valid AMF0 encoded data
    #[error("The values provided could not be serialized into valid AMF0 encoded data: {0}")]
    Amf0SerializationError(#[from] Amf0SerializationError),

    /// Failed to write the values to the output buffer
    #[error("An IO error occurred while writing the output: {0}")]
    Io(#[from] io::Error),
}
