use super::chunk_header::{read_basic_header, ChunkHeaderFormat};
use super::frame_state::ChunkFrameState;
use super::ChunkDeserializationError;
use crate::messages::MessagePayload;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::cmp::min;
use std::collections::HashMap;
use std::io::Read;

pub const INITIAL_MAX_CHUNK_SIZE: usize = 128;
const MAX_INITIAL_TIMESTAMP: u32 = 16777215;
const LARGEST_MAX_CHUNK_SIZE: usize = 2147483647;

/// Payloads are copied in pieces of at most this size, so memory only grows with bytes
/// that actually arrived and never with the length a peer merely declared
const PAYLOAD_READ_STEP: usize = 4096;

/// How the running clock of a chunk stream reacts to message headers.
///
/// With `Accumulate` every decoded timestamp field is added to the clock, including the
/// absolute timestamp of a format 0 header.  This is the behavior the server has always
/// had and remains the default.  `Strict` follows the RTMP specification: a format 0
/// header replaces the clock and type 3 chunks repeat the extended timestamp field
/// whenever the chunk stream is using one.
///
/// In both modes the clock only moves when a chunk starts a new message.  Continuation
/// chunks of a message never advance it.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum ClockMode {
    #[default]
    Accumulate,
    Strict,
}

/// A fully reassembled message along with the chunk stream it arrived on
#[derive(PartialEq, Debug)]
pub struct InboundMessage {
    pub chunk_stream_id: u32,
    pub payload: MessagePayload,
}

/// Reads RTMP chunks off of a blocking byte stream and reassembles them into RTMP
/// message payloads.
///
/// Every byte received from a peer after the handshake must go through the same
/// `ChunkDeserializer`, as chunks rely on the framing state left behind by previous
/// chunks on the same chunk stream id.  Chunks of messages on different chunk streams
/// may be interleaved freely.
pub struct ChunkDeserializer<R> {
    reader: R,
    max_chunk_size: usize,
    clock_mode: ClockMode,
    frame_states: HashMap<u32, ChunkFrameState>,
    bytes_read: u64,
}

impl<R: Read> ChunkDeserializer<R> {
    /// Create a new `ChunkDeserializer` with its initial properties.
    ///
    /// Per the RTMP specification an initial `ChunkDeserializer` is expecting RTMP chunks with
    /// a max size of 128 bytes.
    pub fn new(reader: R, clock_mode: ClockMode) -> ChunkDeserializer<R> {
        ChunkDeserializer {
            reader,
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
            clock_mode,
            frame_states: HashMap::new(),
            bytes_read: 0,
        }
    }

    /// Blocks until a complete RTMP message has been read.
    ///
    /// If the peer sends a `SetChunkSize` message the caller must apply it through
    /// `set_max_chunk_size()` before calling this again, as the very next chunk may
    /// already be sized by it.
    pub fn read_message(&mut self) -> Result<InboundMessage, ChunkDeserializationError> {
        loop {
            if let Some(message) = self.read_chunk()? {
                return Ok(message);
            }
        }
    }

    /// Reads exactly one chunk.  Returns the message it completed, if any.
    pub fn read_chunk(&mut self) -> Result<Option<InboundMessage>, ChunkDeserializationError> {
        let basic_header = read_basic_header(&mut self.reader)?;
        self.bytes_read += basic_header.byte_count as u64;

        let format = ChunkHeaderFormat::from_id(basic_header.format_id)?;
        let csid = basic_header.chunk_stream_id;

        // A chunk stream that has never been seen starts from zeroed state, whatever
        // format its first chunk uses.
        let state = self.frame_states.entry(csid).or_default();
        let starts_message = state.is_between_messages();
        if format != ChunkHeaderFormat::Empty && !starts_message {
            return Err(ChunkDeserializationError::InterruptedMessage {
                csid,
                declared: state.message_length,
                received: state.payload.len(),
            });
        }

        if format != ChunkHeaderFormat::Empty {
            let mut timestamp_field = self.reader.read_u24::<BigEndian>()?;
            self.bytes_read += 3;

            if format != ChunkHeaderFormat::TimeDeltaOnly {
                state.message_length = self.reader.read_u24::<BigEndian>()?;
                state.message_type_id = self.reader.read_u8()?;
                self.bytes_read += 4;
            }

            if format == ChunkHeaderFormat::Full {
                // Intentionally little endian, unlike every other header field
                state.message_stream_id = self.reader.read_u32::<LittleEndian>()?;
                self.bytes_read += 4;
            }

            state.has_extended_timestamp = timestamp_field == MAX_INITIAL_TIMESTAMP;
            if state.has_extended_timestamp {
                timestamp_field = self.reader.read_u32::<BigEndian>()?;
                self.bytes_read += 4;
            }

            state.timestamp_field = timestamp_field;
        } else if self.clock_mode == ClockMode::Strict && state.has_extended_timestamp {
            let timestamp_field = self.reader.read_u32::<BigEndian>()?;
            self.bytes_read += 4;

            if starts_message {
                state.timestamp_field = timestamp_field;
            }
        }

        if starts_message {
            state.clock = match (format, self.clock_mode) {
                (ChunkHeaderFormat::Full, ClockMode::Strict) => {
                    let mut clock = state.clock;
                    clock.set(state.timestamp_field);
                    clock
                }

                _ => state.clock + state.timestamp_field,
            };

            state.payload.reserve(min(state.message_length as usize, PAYLOAD_READ_STEP));
        }

        state.last_format = format;

        let message_length = state.message_length as usize;
        let remaining = message_length - state.payload.len();
        let size = min(remaining, self.max_chunk_size);
        let mut buffer = [0_u8; PAYLOAD_READ_STEP];
        let mut left = size;
        while left > 0 {
            let step = min(left, PAYLOAD_READ_STEP);
            self.reader.read_exact(&mut buffer[..step])?;
            state.payload.extend_from_slice(&buffer[..step]);
            left -= step;
        }

        self.bytes_read += size as u64;

        if state.payload.len() < message_length {
            return Ok(None);
        }

        let payload = MessagePayload {
            timestamp: state.clock,
            type_id: state.message_type_id,
            message_stream_id: state.message_stream_id,
            data: state.payload.split().freeze(),
        };

        Ok(Some(InboundMessage {
            chunk_stream_id: csid,
            payload,
        }))
    }

    /// Tells the deserializer that the peer will start sending RTMP chunks with a different
    /// max chunk size.
    ///
    /// This should only be called in reaction to receiving a `SetChunkSize` message from the
    /// peer.  Any mismatch between the sender's and receiver's chunk size corrupts every
    /// message that follows.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkDeserializationError> {
        if new_size == 0 || new_size > LARGEST_MAX_CHUNK_SIZE {
            return Err(ChunkDeserializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    /// Returns the maximum size of any RTMP chunks that should be received
    pub fn get_max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Total number of bytes consumed from the reader so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
