use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{Cursor, Write};

use crate::messages::{MessageDeserializationError, MessageSerializationError};
use crate::messages::{RtmpMessage, UserControlEventType};
use crate::time::RtmpTimestamp;

pub fn serialize(
    event_type: UserControlEventType,
    stream_id: Option<u32>,
    buffer_length: Option<u32>,
    timestamp: Option<RtmpTimestamp>,
) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(10);
    bytes.write_u16::<BigEndian>(event_id(event_type))?;

    match event_type {
        UserControlEventType::StreamBegin
        | UserControlEventType::StreamEof
        | UserControlEventType::StreamDry
        | UserControlEventType::StreamIsRecorded => {
            write_required(&mut bytes, event_type, "stream id", stream_id)?;
        }

        UserControlEventType::SetBufferLength => {
            write_required(&mut bytes, event_type, "stream id", stream_id)?;
            write_required(&mut bytes, event_type, "buffer length", buffer_length)?;
        }

        UserControlEventType::PingRequest | UserControlEventType::PingResponse => {
            let value = timestamp.map(|x| x.value);
            write_required(&mut bytes, event_type, "timestamp", value)?;
        }
    }

    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let event_type = match cursor.read_u16::<BigEndian>()? {
        0 => UserControlEventType::StreamBegin,
        1 => UserControlEventType::StreamEof,
        2 => UserControlEventType::StreamDry,
        3 => UserControlEventType::SetBufferLength,
        4 => UserControlEventType::StreamIsRecorded,
        6 => UserControlEventType::PingRequest,
        7 => UserControlEventType::PingResponse,
        x => return Err(MessageDeserializationError::UnknownUserControlEvent { event_id: x }),
    };

    let mut stream_id = None;
    let mut buffer_length = None;
    let mut timestamp = None;

    match event_type {
        UserControlEventType::StreamBegin
        | UserControlEventType::StreamEof
        | UserControlEventType::StreamDry
        | UserControlEventType::StreamIsRecorded => {
            stream_id = Some(cursor.read_u32::<BigEndian>()?);
        }

        UserControlEventType::SetBufferLength => {
            stream_id = Some(cursor.read_u32::<BigEndian>()?);
            buffer_length = Some(cursor.read_u32::<BigEndian>()?);
        }

        UserControlEventType::PingRequest | UserControlEventType::PingResponse => {
            timestamp = Some(RtmpTimestamp::new(cursor.read_u32::<BigEndian>()?));
        }
    }

    Ok(RtmpMessage::UserControl {
        event_type,
        stream_id,
        buffer_length,
        timestamp,
    })
}

fn event_id(event_type: UserControlEventType) -> u16 {
    match event_type {
        UserControlEventType::StreamBegin => 0,
        UserControlEventType::StreamEof => 1,
        UserControlEventType::StreamDry => 2,
        UserControlEventType::SetBufferLength => 3,
        UserControlEventType::StreamIsRecorded => 4,
        UserControlEventType::PingRequest => 6,
        UserControlEventType::PingResponse => 7,
    }
}

fn write_required<W: Write>(
    bytes: &mut W,
    event_type: UserControlEventType,
    field: &'static str,
    value: Option<u32>,
) -> Result<(), MessageSerializationError> {
    match value {
        Some(x) => bytes.write_u32::<BigEndian>(x)?,
        None => {
            return Err(MessageSerializationError::MissingUserControlField {
                event_type: event_name(event_type),
                field,
            })
        }
    }

    Ok(())
}

fn event_name(event_type: UserControlEventType) -> &'static str {
    match event_type {
        UserControlEventType::StreamBegin => "StreamBegin",
        UserControlEventType::StreamEof => "StreamEof",
        UserControlEventType::StreamDry => "StreamDry",
        UserControlEventType::SetBufferLength => "SetBufferLength",
        UserControlEventType::StreamIsRecorded => "StreamIsRecorded",
        UserControlEventType::PingRequest => "PingRequest",
        UserControlEventType::PingResponse => "PingResponse",
    }
}
