use crate::messages::MessageSerializationError;
use thiserror::Error;

/// Errors raised by the stream registry.  The first two are expected application level
/// outcomes that sessions answer with a negative status.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Stream key '{stream_key}' is already being published")]
    StreamAlreadyPublished { stream_key: String },

    #[error("Stream key '{stream_key}' is not being published")]
    StreamNotFound { stream_key: String },

    /// The joining player's own outbound queue could not take the start of playback
    #[error("Outbound queue of connection {connection_id} is full or closed")]
    SubscriberQueueUnavailable { connection_id: u64 },

    #[error("Failed to serialize relayed message: {0}")]
    MessageSerializationError(#[from] MessageSerializationError),
}
