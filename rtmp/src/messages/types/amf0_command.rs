use bytes::Bytes;
use rtmp_relay_amf0::Amf0Value;
use std::io::Cursor;

use crate::messages::RtmpMessage;
use crate::messages::{MessageDeserializationError, MessageSerializationError};

pub fn serialize(
    command_name: String,
    transaction_id: f64,
    command_object: Amf0Value,
    mut additional_arguments: Vec<Amf0Value>,
) -> Result<Bytes, MessageSerializationError> {
    let mut values = vec![
        Amf0Value::Utf8String(command_name),
        Amf0Value::Number(transaction_id),
        command_object,
    ];

    values.append(&mut additional_arguments);
    let bytes = rtmp_relay_amf0::serialize(&values)?;

    Ok(Bytes::from(bytes))
}

/// Commands always lead with their name and transaction id.  Some encoders leave out the
/// command object entirely on commands like `releaseStream`, so a missing one reads as null.
pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let arguments = rtmp_relay_amf0::deserialize(&mut cursor)?;
    let mut arguments = arguments.into_iter();

    let command_name = match arguments.next() {
        Some(Amf0Value::Utf8String(value)) => value,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let transaction_id = match arguments.next() {
        Some(Amf0Value::Number(value)) => value,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let command_object = arguments.next().unwrap_or(Amf0Value::Null);

    Ok(RtmpMessage::Amf0Command {
        command_name,
        transaction_id,
        command_object,
        additional_arguments: arguments.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::{deserialize, serialize};
    use crate::messages::{MessageDeserializationError, RtmpMessage};
    use bytes::Bytes;
    use rtmp_relay_amf0::{Amf0Object, Amf0Value};
    use std::io::Cursor;

    #[test]
    fn can_serialize_message() {
        let command_object = Amf0Value::Object(Amf0Object::new().with("app", "live"));
        let raw_message = serialize(
            "connect".to_string(),
            1.0,
            command_object.clone(),
            vec![Amf0Value::Boolean(true)],
        )
        .unwrap();

        let mut cursor = Cursor::new(&raw_message[..]);
        let result = rtmp_relay_amf0::deserialize(&mut cursor).unwrap();
        let expected = vec![
            Amf0Value::Utf8String("connect".to_string()),
            Amf0Value::Number(1.0),
            command_object,
            Amf0Value::Boolean(true),
        ];

        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_message() {
        let values = vec![
            Amf0Value::Utf8String("publish".to_string()),
            Amf0Value::Number(5.0),
            Amf0Value::Null,
            Amf0Value::Utf8String("key".to_string()),
            Amf0Value::Utf8String("live".to_string()),
        ];

        let bytes = Bytes::from(rtmp_relay_amf0::serialize(&values).unwrap());
        let result = deserialize(bytes).unwrap();
        let expected = RtmpMessage::Amf0Command {
            command_name: "publish".to_string(),
            transaction_id: 5.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![
                Amf0Value::Utf8String("key".to_string()),
                Amf0Value::Utf8String("live".to_string()),
            ],
        };

        assert_eq!(result, expected);
    }

    #[test]
    fn missing_command_object_reads_as_null() {
        let values = vec![
            Amf0Value::Utf8String("releaseStream".to_string()),
            Amf0Value::Number(2.0),
        ];

        let bytes = Bytes::from(rtmp_relay_amf0::serialize(&values).unwrap());
        match deserialize(bytes).unwrap() {
            RtmpMessage::Amf0Command {
                command_object,
                additional_arguments,
                ..
            } => {
                assert_eq!(command_object, Amf0Value::Null);
                assert!(additional_arguments.is_empty());
            }

            x => panic!("Expected Amf0Command, instead received {:?}", x),
        }
    }

    #[test]
    fn command_without_name_is_invalid() {
        let values = vec![Amf0Value::Number(2.0), Amf0Value::Null];
        let bytes = Bytes::from(rtmp_relay_amf0::serialize(&values).unwrap());

        match deserialize(bytes) {
            Err(MessageDeserializationError::InvalidMessageFormat) => (),
            x => panic!("Expected InvalidMessageFormat, instead received {:?}", x),
        }
    }

    #[test]
    fn command_without_transaction_id_is_invalid() {
        let values = vec![Amf0Value::Utf8String("connect".to_string())];
        let bytes = Bytes::from(rtmp_relay_amf0::serialize(&values).unwrap());

        match deserialize(bytes) {
            Err(MessageDeserializationError::InvalidMessageFormat) => (),
            x => panic!("Expected InvalidMessageFormat, instead received {:?}", x),
        }
    }
}
