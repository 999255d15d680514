//! Module contains functionality for serializing values into an
//! bytes based on the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)
//!
//! Serialization is done in two passes.  `serialized_length()` walks the value tree
//! to compute the exact output size, then the values are written into a buffer of
//! that capacity.  Both passes walk the tree in the same order.

use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Value};
use byteorder::{BigEndian, WriteBytesExt};

const OBJECT_END_LENGTH: usize = 3;

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let expected = serialized_length(values);
    let mut bytes = Vec::with_capacity(expected);
    for value in values {
        serialize_value(value, &mut bytes)?;
    }

    if bytes.len() != expected {
        return Err(Amf0SerializationError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(bytes)
}

/// Returns the number of bytes `serialize()` will produce for the passed in values
pub fn serialized_length(values: &[Amf0Value]) -> usize {
    values.iter().map(value_length).sum()
}

fn value_length(value: &Amf0Value) -> usize {
    match value {
        Amf0Value::Number(_) => 1 + 8,
        Amf0Value::Boolean(_) => 1 + 1,
        Amf0Value::Null | Amf0Value::Undefined => 1,
        Amf0Value::Utf8String(val) if is_long_string(val) => 1 + 4 + val.len(),
        Amf0Value::Utf8String(val) => 1 + 2 + val.len(),
        Amf0Value::Object(val) => 1 + properties_length(val) + OBJECT_END_LENGTH,
        Amf0Value::EcmaArray(val) => 1 + 4 + properties_length(val) + OBJECT_END_LENGTH,
        Amf0Value::StrictArray(val) => 1 + 4 + val.iter().map(value_length).sum::<usize>(),
        Amf0Value::Date { .. } => 1 + 8 + 2,
    }
}

fn properties_length(properties: &Amf0Object) -> usize {
    properties
        .iter()
        .map(|(name, value)| 2 + name.len() + value_length(value))
        .sum()
}

fn is_long_string(value: &str) -> bool {
    value.len() > u16::MAX as usize
}

fn serialize_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match *value {
        Amf0Value::Boolean(val) => {
            serialize_bool(val, bytes);
            Ok(())
        }

        Amf0Value::Null => {
            bytes.push(markers::NULL_MARKER);
            Ok(())
        }

        Amf0Value::Undefined => {
            bytes.push(markers::UNDEFINED_MARKER);
            Ok(())
        }

        Amf0Value::Number(val) => serialize_number(val, bytes),
        Amf0Value::Utf8String(ref val) => serialize_string(val, bytes),
        Amf0Value::Object(ref val) => serialize_object(val, bytes),
        Amf0Value::EcmaArray(ref val) => serialize_ecma_array(val, bytes),
        Amf0Value::StrictArray(ref val) => serialize_strict_array(val, bytes),
        Amf0Value::Date {
            unix_millis,
            time_zone,
        } => serialize_date(unix_millis, time_zone, bytes),
    }
}

fn serialize_number(value: f64, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::NUMBER_MARKER);
    bytes.write_f64::<BigEndian>(value)?;
    Ok(())
}

fn serialize_bool(value: bool, bytes: &mut Vec<u8>) {
    bytes.push(markers::BOOLEAN_MARKER);
    bytes.push(value as u8);
}

fn serialize_string(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if is_long_string(value) {
        if value.len() > u32::MAX as usize {
            return Err(Amf0SerializationError::LongStringTooLong);
        }

        bytes.push(markers::LONG_STRING_MARKER);
        bytes.write_u32::<BigEndian>(value.len() as u32)?;
    } else {
        bytes.push(markers::STRING_MARKER);
        bytes.write_u16::<BigEndian>(value.len() as u16)?;
    }

    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_object(
    properties: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::OBJECT_MARKER);
    serialize_properties(properties, bytes)
}

fn serialize_ecma_array(
    properties: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::ECMA_ARRAY_MARKER);
    bytes.write_u32::<BigEndian>(properties.len() as u32)?;
    serialize_properties(properties, bytes)
}

fn serialize_properties(
    properties: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    for (name, value) in properties {
        if name.is_empty() {
            return Err(Amf0SerializationError::EmptyPropertyName);
        }

        if name.len() > u16::MAX as usize {
            return Err(Amf0SerializationError::PropertyNameTooLong);
        }

        bytes.write_u16::<BigEndian>(name.len() as u16)?;
        bytes.extend(name.as_bytes());
        serialize_value(value, bytes)?;
    }

    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}

fn serialize_strict_array(
    array: &[Amf0Value],
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::STRICT_ARRAY_MARKER);
    bytes.write_u32::<BigEndian>(array.len() as u32)?;

    for value in array {
        serialize_value(value, bytes)?;
    }

    Ok(())
}

fn serialize_date(
    unix_millis: f64,
    time_zone: i16,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::DATE_MARKER);
    bytes.write_f64::<BigEndian>(unix_millis)?;
    bytes.write_i16::<BigEndian>(time_zone)?;
    Ok(())
}
