//! This module contains functionality to deserialize values from bytes
//! that were encoded via the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Value};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

/// Objects, ECMA arrays and strict arrays may nest this many levels deep.  Each level
/// costs a few stack frames, so the bound keeps hostile input from exhausting the stack.
pub const MAX_NESTING_DEPTH: usize = 64;

struct ObjectProperty {
    label: String,
    value: Amf0Value,
}

/// Turns any readable byte stream and converts it into an array of AMF0 values
pub fn deserialize<R: Read>(bytes: &mut R) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut results = vec![];

    while let Some(value) = read_next_value(bytes, 0)? {
        results.push(value);
    }

    Ok(results)
}

fn read_next_value<R: Read>(
    bytes: &mut R,
    depth: usize,
) -> Result<Option<Amf0Value>, Amf0DeserializationError> {
    let mut buffer: [u8; 1] = [0];
    let bytes_read = bytes.read(&mut buffer)?;

    if bytes_read == 0 {
        return Ok(None);
    }

    if buffer[0] == markers::OBJECT_END_MARKER {
        return Ok(None);
    }

    let marker = buffer[0];
    let is_container = marker == markers::OBJECT_MARKER
        || marker == markers::ECMA_ARRAY_MARKER
        || marker == markers::STRICT_ARRAY_MARKER;

    if is_container && depth >= MAX_NESTING_DEPTH {
        return Err(Amf0DeserializationError::NestingTooDeep {
            max_depth: MAX_NESTING_DEPTH,
        });
    }

    match marker {
        markers::BOOLEAN_MARKER => parse_bool(bytes).map(Some),
        markers::NULL_MARKER => Ok(Some(Amf0Value::Null)),
        markers::UNDEFINED_MARKER => Ok(Some(Amf0Value::Undefined)),
        markers::NUMBER_MARKER => parse_number(bytes).map(Some),
        markers::OBJECT_MARKER => parse_object(bytes, depth + 1).map(Some),
        markers::ECMA_ARRAY_MARKER => parse_ecma_array(bytes, depth + 1).map(Some),
        markers::STRING_MARKER => parse_string(bytes).map(Some),
        markers::LONG_STRING_MARKER => parse_long_string(bytes).map(Some),
        markers::STRICT_ARRAY_MARKER => parse_strict_array(bytes, depth + 1).map(Some),
        markers::DATE_MARKER => parse_date(bytes).map(Some),
        _ => Err(Amf0DeserializationError::UnknownMarker { marker }),
    }
}

fn parse_number<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let number = bytes.read_f64::<BigEndian>()?;
    Ok(Amf0Value::Number(number))
}

fn parse_bool<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let value = bytes.read_u8()?;
    Ok(Amf0Value::Boolean(value != 0))
}

fn parse_string<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let length = bytes.read_u16::<BigEndian>()?;
    read_utf8(bytes, length as usize).map(Amf0Value::Utf8String)
}

fn parse_long_string<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let length = bytes.read_u32::<BigEndian>()?;
    read_utf8(bytes, length as usize).map(Amf0Value::Utf8String)
}

fn read_utf8<R: Read>(bytes: &mut R, length: usize) -> Result<String, Amf0DeserializationError> {
    // Grows with the bytes actually present instead of trusting the declared length
    let mut buffer: Vec<u8> = Vec::new();
    bytes.take(length as u64).read_to_end(&mut buffer)?;
    if buffer.len() != length {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    Ok(String::from_utf8(buffer)?)
}

fn parse_object<R: Read>(bytes: &mut R, depth: usize) -> Result<Amf0Value, Amf0DeserializationError> {
    parse_properties(bytes, depth).map(Amf0Value::Object)
}

fn parse_ecma_array<R: Read>(bytes: &mut R, depth: usize) -> Result<Amf0Value, Amf0DeserializationError> {
    // Encoders in the wild do not agree on whether the count is accurate, but they all
    // terminate the array with the same 0x000009 sequence objects use.  So the count is
    // skipped and the properties are read until the end marker.
    let _associative_count = bytes.read_u32::<BigEndian>()?;
    parse_properties(bytes, depth).map(Amf0Value::EcmaArray)
}

fn parse_properties<R: Read>(bytes: &mut R, depth: usize) -> Result<Amf0Object, Amf0DeserializationError> {
    let mut properties = Amf0Object::new();
    while let Some(property) = parse_object_property(bytes, depth)? {
        properties.insert(property.label, property.value);
    }

    Ok(properties)
}

fn parse_strict_array<R: Read>(bytes: &mut R, depth: usize) -> Result<Amf0Value, Amf0DeserializationError> {
    let array_count = bytes.read_u32::<BigEndian>()?;
    let mut values: Vec<Amf0Value> = Vec::new();

    for _ in 0..array_count {
        match read_next_value(bytes, depth)? {
            Some(value) => values.push(value),
            None => return Err(Amf0DeserializationError::UnexpectedEof),
        }
    }

    Ok(Amf0Value::StrictArray(values))
}

fn parse_date<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let unix_millis = bytes.read_f64::<BigEndian>()?;
    let time_zone = bytes.read_i16::<BigEndian>()?;

    Ok(Amf0Value::Date {
        unix_millis,
        time_zone,
    })
}

fn parse_object_property<R: Read>(
    bytes: &mut R,
    depth: usize,
) -> Result<Option<ObjectProperty>, Amf0DeserializationError> {
    let label_length = bytes.read_u16::<BigEndian>()?;
    if label_length == markers::UTF_8_EMPTY_MARKER {
        // Next byte should be the end of object marker.  We need to read this
        // to make sure we progress the current position.
        let byte = bytes.read_u8()?;
        if byte != markers::OBJECT_END_MARKER {
            return Err(Amf0DeserializationError::UnexpectedEmptyObjectPropertyName);
        }

        return Ok(None);
    }

    let label = read_utf8(bytes, label_length as usize)?;
    match read_next_value(bytes, depth)? {
        None => Err(Amf0DeserializationError::UnexpectedEof),
        Some(value) => Ok(Some(ObjectProperty { label, value })),
    }
}
