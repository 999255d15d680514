use crate::time::RtmpTimestamp;
use rtmp_relay_amf0::Amf0Value;

/// An event that a server session can raise
#[derive(Debug, PartialEq, Clone)]
pub enum ServerSessionEvent {
    /// The client's `connect` request on the specified application was accepted
    ConnectionAccepted { app_name: String },

    /// The client was rejected because its `connect` request lacked an application name
    ConnectionRejected,

    /// The client now owns the stream key and its media is being relayed
    PublishStreamStarted {
        app_name: String,
        stream_key: String,
        stream_id: u32,
    },

    /// The client stopped publishing on the specified stream key
    PublishStreamFinished { app_name: String, stream_key: String },

    /// Another connection already holds the requested stream key
    PublishStreamRejected { app_name: String, stream_key: String },

    /// The client changed the metadata of the stream it is publishing
    StreamMetadataChanged { app_name: String, stream_key: String },

    /// The client is now receiving the specified stream
    PlayStreamStarted {
        app_name: String,
        stream_key: String,
        stream_id: u32,
    },

    /// The client asked to play a stream key that nobody is publishing
    PlayStreamNotFound { app_name: String, stream_key: String },

    /// The client is finished with playback of the specified stream
    PlayStreamFinished { app_name: String, stream_key: String },

    /// The client sent an Amf0 command that was not able to be handled
    UnhandleableAmf0Command {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_values: Vec<Amf0Value>,
    },

    /// The client has sent an acknowledgement that they have received the specified number of bytes
    AcknowledgementReceived { bytes_received: u32 },

    /// The client has responded to a ping request
    PingResponseReceived { timestamp: RtmpTimestamp },
}
