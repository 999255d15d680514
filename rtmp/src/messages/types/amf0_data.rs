use bytes::Bytes;
use rtmp_relay_amf0::Amf0Value;
use std::io::Cursor;

use crate::messages::RtmpMessage;
use crate::messages::{MessageDeserializationError, MessageSerializationError};

pub fn serialize(values: Vec<Amf0Value>) -> Result<Bytes, MessageSerializationError> {
    let bytes = rtmp_relay_amf0::serialize(&values)?;

    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let values = rtmp_relay_amf0::deserialize(&mut cursor)?;

    Ok(RtmpMessage::Amf0Data { values })
}

#[cfg(test)]
mod tests {
    use super::{deserialize, serialize};
    use crate::messages::RtmpMessage;
    use rtmp_relay_amf0::{Amf0Object, Amf0Value};

    #[test]
    fn can_read_back_metadata_message() {
        let values = vec![
            Amf0Value::Utf8String("@setDataFrame".to_string()),
            Amf0Value::Utf8String("onMetaData".to_string()),
            Amf0Value::EcmaArray(Amf0Object::new().with("width", 1280.0).with("height", 720.0)),
        ];

        let raw_message = serialize(values.clone()).unwrap();
        let result = deserialize(raw_message).unwrap();

        assert_eq!(result, RtmpMessage::Amf0Data { values });
    }
}
