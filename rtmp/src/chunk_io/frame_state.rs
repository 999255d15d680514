use super::chunk_header::ChunkHeaderFormat;
use crate::time::RtmpTimestamp;
use bytes::BytesMut;

/// Framing state for a single chunk stream id on one connection.
///
/// Chunks that omit header fields (formats 1 through 3) inherit them from here, and
/// the payload of a message split across several chunks accumulates here until the
/// declared length has been read.
#[derive(Debug)]
pub struct ChunkFrameState {
    pub last_format: ChunkHeaderFormat,

    /// Timestamp or delta from the most recent message header, after any extended
    /// timestamp has been applied
    pub timestamp_field: u32,

    /// Running clock for messages on this chunk stream
    pub clock: RtmpTimestamp,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub has_extended_timestamp: bool,
    pub payload: BytesMut,
}

impl ChunkFrameState {
    pub fn new() -> ChunkFrameState {
        ChunkFrameState {
            last_format: ChunkHeaderFormat::Full,
            timestamp_field: 0,
            clock: RtmpTimestamp::new(0),
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
            has_extended_timestamp: false,
            payload: BytesMut::new(),
        }
    }

    /// True when no bytes of a message have been read yet, so the next chunk starts a new one
    pub fn is_between_messages(&self) -> bool {
        self.payload.is_empty()
    }
}

impl Default for ChunkFrameState {
    fn default() -> Self {
        ChunkFrameState::new()
    }
}
