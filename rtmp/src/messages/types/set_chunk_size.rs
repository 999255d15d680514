use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::RtmpMessage;
use crate::messages::{MessageDeserializationError, MessageSerializationError};

const MAX_SIZE: u32 = 0x80000000 - 1;

pub fn serialize(size: u32) -> Result<Bytes, MessageSerializationError> {
    if size == 0 || size > MAX_SIZE {
        return Err(MessageSerializationError::InvalidChunkSize);
    }

    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(size)?;

    Ok(Bytes::from(bytes))
}

/// The high bit of the size is reserved and must be zero, and a zero sized chunk
/// could never carry a payload.
pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;

    if size == 0 || size > MAX_SIZE {
        return Err(MessageDeserializationError::InvalidChunkSize { size });
    }

    Ok(RtmpMessage::SetChunkSize { size })
}

#[cfg(test)]
mod tests {
    use super::{deserialize, serialize};
    use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
    use bytes::Bytes;

    #[test]
    fn can_serialize_message() {
        let raw_message = serialize(4096).unwrap();

        assert_eq!(&raw_message[..], &[0, 0, 0x10, 0]);
    }

    #[test]
    fn can_deserialize_message() {
        let result = deserialize(Bytes::from(vec![0, 0, 0x10, 0])).unwrap();

        assert_eq!(result, RtmpMessage::SetChunkSize { size: 4096 });
    }

    #[test]
    fn cannot_serialize_zero_or_high_bit_sizes() {
        for size in [0_u32, 0x80000000].iter() {
            match serialize(*size) {
                Err(MessageSerializationError::InvalidChunkSize) => (),
                x => panic!("Expected InvalidChunkSize for {}, instead received {:?}", size, x),
            }
        }
    }

    #[test]
    fn rejects_zero_size() {
        match deserialize(Bytes::from(vec![0, 0, 0, 0])) {
            Err(MessageDeserializationError::InvalidChunkSize { size: 0 }) => (),
            x => panic!("Expected InvalidChunkSize, instead received {:?}", x),
        }
    }

    #[test]
    fn rejects_size_with_high_bit_set() {
        match deserialize(Bytes::from(vec![0x80, 0, 0x10, 0])) {
            Err(MessageDeserializationError::InvalidChunkSize { size }) => {
                assert_eq!(size, 0x80001000)
            }
            x => panic!("Expected InvalidChunkSize, instead received {:?}", x),
        }
    }
}
