use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::RtmpMessage;
use crate::messages::{MessageDeserializationError, MessageSerializationError};

pub fn serialize(sequence_number: u32) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(sequence_number)?;

    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);

    Ok(RtmpMessage::Acknowledgement {
        sequence_number: cursor.read_u32::<BigEndian>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::{deserialize, serialize};
    use crate::messages::{MessageDeserializationError, RtmpMessage};
    use bytes::Bytes;

    #[test]
    fn can_serialize_message() {
        let raw_message = serialize(5000000).unwrap();

        assert_eq!(&raw_message[..], &[0x00, 0x4c, 0x4b, 0x40]);
    }

    #[test]
    fn can_deserialize_message() {
        let result = deserialize(Bytes::from(vec![0x00, 0x4c, 0x4b, 0x40])).unwrap();

        assert_eq!(result, RtmpMessage::Acknowledgement { sequence_number: 5000000 });
    }

    #[test]
    fn truncated_message_is_an_error() {
        match deserialize(Bytes::from(vec![0x00, 0x4c])) {
            Err(MessageDeserializationError::Io(_)) => (),
            x => panic!("Expected Io error, instead received {:?}", x),
        }
    }
}
