//! Conversion between RTMP messages and the RTMP chunk stream format.
//!
//! Reading is done through a blocking `ChunkDeserializer` that owns the socket's read
//! half, while writing produces self contained `Packet`s that can be handed to whatever
//! thread owns the write half.

mod chunk_header;
mod deserialization_errors;
mod deserializer;
mod frame_state;
mod serialization_errors;
mod serializer;

pub use self::chunk_header::{
    read_basic_header, write_basic_header, BasicHeader, ChunkHeaderFormat, MAX_CHUNK_STREAM_ID,
    MIN_CHUNK_STREAM_ID,
};
pub use self::deserialization_errors::ChunkDeserializationError;
pub use self::deserializer::{ChunkDeserializer, ClockMode, InboundMessage, INITIAL_MAX_CHUNK_SIZE};
pub use self::frame_state::ChunkFrameState;
pub use self::serialization_errors::ChunkSerializationError;
pub use self::serializer::{csid_for_message_type, ChunkSerializer, Packet};
