use super::chunk_header::{write_basic_header, ChunkHeaderFormat};
use super::deserializer::INITIAL_MAX_CHUNK_SIZE;
use super::ChunkSerializationError;
use crate::messages::{MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

const MAX_INITIAL_TIMESTAMP: u32 = 16777215;
const MAX_MESSAGE_LENGTH: usize = 16777215;
const LARGEST_MAX_CHUNK_SIZE: u32 = 2147483647;

/// An outbound data packet containing at least one RTMP chunk with a single RTMP message.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub bytes: Vec<u8>,
}

/// Allows serializing RTMP messages into RTMP chunks.
///
/// Every message is written as a format 0 chunk followed by format 3 continuation
/// chunks on the same chunk stream id.  No header compression is attempted, so the
/// serializer only needs to remember the negotiated chunk size.  The same serializer
/// must still be used for every message sent to a peer, since the peer tracks that
/// chunk size as well.
pub struct ChunkSerializer {
    max_chunk_size: u32,
}

impl ChunkSerializer {
    /// Creates a new `ChunkSerializer`.
    ///
    /// By default (per the RTMP specification) the serializer will break any message into RTMP
    /// chunks with a max size of 128.  To change this amount a call to `set_max_chunk_size()` is
    /// required.
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE as u32,
        }
    }

    /// Changes the maximum amount of bytes from RTMP messages that can be in a single RTMP chunk.
    ///
    /// Changing the maximum chunk size requires notifying the receiver of the change, as it will
    /// affect every chunk you send out from here on out.  Therefore, when this method is called
    /// we automatically serialize a `SetChunkSize` RTMP message to be sent to the peer.  This
    /// packet *must* be sent before any packet serialized after this call.
    pub fn set_max_chunk_size(
        &mut self,
        new_size: u32,
        time: RtmpTimestamp,
    ) -> Result<Packet, ChunkSerializationError> {
        if new_size == 0 || new_size > LARGEST_MAX_CHUNK_SIZE {
            return Err(ChunkSerializationError::InvalidMaxChunkSize {
                attempted_chunk_size: new_size,
            });
        }

        let set_chunk_size_message = RtmpMessage::SetChunkSize { size: new_size };
        let message_payload = MessagePayload::from_rtmp_message(set_chunk_size_message, time, 0)?;
        let packet = self.serialize(&message_payload, csid_for_message_type(message_payload.type_id))?;

        self.max_chunk_size = new_size;
        Ok(packet)
    }

    pub fn get_max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Turns an RTMP message payload into binary data (representing RTMP chunks) that can be
    /// sent over the network on the specified chunk stream.
    pub fn serialize(
        &self,
        message: &MessagePayload,
        chunk_stream_id: u32,
    ) -> Result<Packet, ChunkSerializationError> {
        if message.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ChunkSerializationError::MessageTooLong {
                size: message.data.len(),
            });
        }

        let chunk_size = self.max_chunk_size as usize;
        let chunk_count = std::cmp::max(1, (message.data.len() + chunk_size - 1) / chunk_size);
        let mut bytes = Vec::with_capacity(message.data.len() + 16 + chunk_count * 3);

        write_basic_header(&mut bytes, ChunkHeaderFormat::Full, chunk_stream_id)?;
        write_full_message_header(&mut bytes, message)?;

        let mut slices = message.data.chunks(chunk_size);
        if let Some(first) = slices.next() {
            bytes.write_all(first)?;
        }

        for slice in slices {
            write_basic_header(&mut bytes, ChunkHeaderFormat::Empty, chunk_stream_id)?;
            bytes.write_all(slice)?;
        }

        Ok(Packet { bytes })
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        ChunkSerializer::new()
    }
}

/// Picks the chunk stream a message type is sent on, so that control traffic, commands
/// and each kind of media never share framing state.
pub fn csid_for_message_type(message_type_id: u8) -> u32 {
    match message_type_id {
        1..=6 => 2,
        20 => 3,
        9 => 4,
        8 => 5,
        18 => 6,
        _ => 7,
    }
}

fn write_full_message_header(
    bytes: &mut Vec<u8>,
    message: &MessagePayload,
) -> Result<(), ChunkSerializationError> {
    let timestamp = message.timestamp.value;
    let is_extended = timestamp >= MAX_INITIAL_TIMESTAMP;

    if is_extended {
        bytes.write_u24::<BigEndian>(MAX_INITIAL_TIMESTAMP)?;
    } else {
        bytes.write_u24::<BigEndian>(timestamp)?;
    }

    bytes.write_u24::<BigEndian>(message.data.len() as u32)?;
    bytes.write_u8(message.type_id)?;
    bytes.write_u32::<LittleEndian>(message.message_stream_id)?;

    if is_extended {
        bytes.write_u32::<BigEndian>(timestamp)?;
    }

    Ok(())
}
