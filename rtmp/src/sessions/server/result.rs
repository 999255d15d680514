use super::events::ServerSessionEvent;
use crate::messages::MessagePayload;

/// A single result returned when a server session processes a message
#[derive(PartialEq, Debug)]
pub enum ServerSessionResult {
    /// The peer changed the maximum size of the chunks it sends.  The connection's chunk
    /// deserializer must switch to this size before reading the next chunk.
    ReadChunkSizeChanged { size: u32 },

    /// An event the server session is raising so the connection can log or act on it
    RaisedEvent(ServerSessionEvent),

    /// The server session received a message that it could not handle.  This result
    /// allows the consumer to do something with it if it wants to (special logging)
    UnhandleableMessageReceived(MessagePayload),
}
