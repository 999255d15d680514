use crate::messages::{MessageDeserializationError, MessageSerializationError};
use crate::relay::RelayError;
use thiserror::Error;

/// Errors a server session can hit while handling a message.  All of them are fatal
/// to the connection.
#[derive(Debug, Error)]
pub enum ServerSessionError {
    /// Encountered when an error occurs while turning an RTMP message into an message payload
    #[error("An error occurred while attempting to turn an RTMP message into a message payload: {0}")]
    MessageSerializationError(#[from] MessageSerializationError),

    /// Encountered when an error occurs while turning a message payload into an RTMP message
    #[error("An error occurred while attempting to turn a message payload into an RTMP message: {0}")]
    MessageDeserializationError(#[from] MessageDeserializationError),

    #[error("Stream registry failure: {0}")]
    RelayError(#[from] RelayError),

    /// The writer side of the connection is gone, so nothing more can be sent
    #[error("The connection's outbound queue has been closed")]
    OutboundQueueClosed,
}
