use super::{ChunkDeserializationError, ChunkSerializationError};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Lowest chunk stream id a peer can send on.  0 and 1 are raw values signalling the
/// 2 and 3 byte basic header forms.
pub const MIN_CHUNK_STREAM_ID: u32 = 2;

/// Highest chunk stream id expressible with a 3 byte basic header
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

const FORMAT_SHIFT: u8 = 6;
const CSID_MASK: u8 = 0b0011_1111;

/// The `fmt` field of a chunk's basic header, which decides which message header
/// fields follow it.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ChunkHeaderFormat {
    Full,                            // Format 0
    TimeDeltaWithoutMessageStreamId, // Format 1
    TimeDeltaOnly,                   // Format 2
    Empty,                           // Format 3
}

impl ChunkHeaderFormat {
    pub fn from_id(format_id: u8) -> Result<ChunkHeaderFormat, ChunkDeserializationError> {
        match format_id {
            0 => Ok(ChunkHeaderFormat::Full),
            1 => Ok(ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId),
            2 => Ok(ChunkHeaderFormat::TimeDeltaOnly),
            3 => Ok(ChunkHeaderFormat::Empty),
            x => Err(ChunkDeserializationError::UnknownChunkFormat { format: x }),
        }
    }

    pub fn id(&self) -> u8 {
        match *self {
            ChunkHeaderFormat::Full => 0,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 1,
            ChunkHeaderFormat::TimeDeltaOnly => 2,
            ChunkHeaderFormat::Empty => 3,
        }
    }
}

/// Raw contents of a basic header as read off the wire
#[derive(PartialEq, Eq, Debug)]
pub struct BasicHeader {
    pub format_id: u8,
    pub chunk_stream_id: u32,
    pub byte_count: usize,
}

/// Reads a 1, 2 or 3 byte basic header.
pub fn read_basic_header<R: Read>(reader: &mut R) -> Result<BasicHeader, ChunkDeserializationError> {
    let first_byte = reader.read_u8()?;
    let format_id = first_byte >> FORMAT_SHIFT;

    let (chunk_stream_id, byte_count) = match first_byte & CSID_MASK {
        0 => (reader.read_u8()? as u32 + 64, 2),
        1 => {
            let low = reader.read_u8()? as u32;
            let high = reader.read_u8()? as u32;
            ((high * 256) + low + 64, 3)
        }

        x => (x as u32, 1),
    };

    Ok(BasicHeader {
        format_id,
        chunk_stream_id,
        byte_count,
    })
}

/// Writes the smallest basic header able to carry the chunk stream id
pub fn write_basic_header<W: Write>(
    bytes: &mut W,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), ChunkSerializationError> {
    if !(MIN_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID).contains(&csid) {
        return Err(ChunkSerializationError::InvalidChunkStreamId { csid });
    }

    let format_bits = format.id() << FORMAT_SHIFT;
    match csid {
        x if x <= 63 => bytes.write_u8(format_bits | x as u8)?,
        x if x <= 319 => {
            bytes.write_u8(format_bits)?;
            bytes.write_u8((x - 64) as u8)?;
        }

        x => {
            let offset = x - 64;
            bytes.write_u8(format_bits | 1)?;
            bytes.write_u8((offset & 0xff) as u8)?;
            bytes.write_u8(((offset >> 8) & 0xff) as u8)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn basic_header_width_depends_on_chunk_stream_id() {
        let cases = [(2, 1), (63, 1), (64, 2), (319, 2), (320, 3), (65599, 3)];
        for (csid, expected_width) in cases.iter() {
            let mut bytes = Vec::new();
            write_basic_header(&mut bytes, ChunkHeaderFormat::TimeDeltaOnly, *csid).unwrap();
            assert_eq!(bytes.len(), *expected_width, "Incorrect width for csid {}", csid);

            let header = read_basic_header(&mut Cursor::new(bytes)).unwrap();
            assert_eq!(header.chunk_stream_id, *csid, "Incorrect csid");
            assert_eq!(header.format_id, 2, "Incorrect format");
            assert_eq!(header.byte_count, *expected_width, "Incorrect byte count");
        }
    }

    #[test]
    fn three_byte_form_is_low_byte_first() {
        let mut bytes = Vec::new();
        write_basic_header(&mut bytes, ChunkHeaderFormat::Full, 64 + 0x0102).unwrap();

        assert_eq!(bytes, vec![0b0000_0001, 0x02, 0x01]);
    }

    #[test]
    fn error_when_writing_reserved_chunk_stream_id() {
        for csid in [0, 1, 65600].iter() {
            let mut bytes = Vec::new();
            match write_basic_header(&mut bytes, ChunkHeaderFormat::Full, *csid) {
                Err(ChunkSerializationError::InvalidChunkStreamId { csid: x }) => assert_eq!(x, *csid),
                x => panic!("Expected InvalidChunkStreamId, instead received {:?}", x),
            }
        }
    }

    #[test]
    fn unknown_format_id_is_an_error() {
        match ChunkHeaderFormat::from_id(4) {
            Err(ChunkDeserializationError::UnknownChunkFormat { format: 4 }) => (),
            x => panic!("Expected UnknownChunkFormat, instead received {:?}", x),
        }
    }
}
