use bytes::Bytes;

use crate::messages::RtmpMessage;
use crate::messages::{MessageDeserializationError, MessageSerializationError};

pub fn serialize(data: Bytes) -> Result<Bytes, MessageSerializationError> {
    Ok(data)
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    Ok(RtmpMessage::AudioData { data })
}

#[cfg(test)]
mod tests {
    use super::deserialize;
    use crate::messages::RtmpMessage;
    use bytes::Bytes;

    #[test]
    fn can_deserialize_message() {
        let data = Bytes::from(vec![0xaf, 0x01, 0x21]);
        let result = deserialize(data.clone()).unwrap();

        assert_eq!(result, RtmpMessage::AudioData { data });
    }
}
