//! This crate provides functionality for serializing and deserializing data
//! based on the Adobe AMF0 encoding specification located at
//! <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf0-file-format-specification.pdf>
//!
//! Objects and ECMA arrays keep their properties in insertion order, so a value
//! tree always serializes to the same bytes it was built (or deserialized) from.
//!
//! # Examples
//! ```
//! use std::io::Cursor;
//! use rtmp_relay_amf0::{Amf0Object, Amf0Value, serialize, deserialize};
//!
//! // Put some data into the Amf0Value types
//! let mut properties = Amf0Object::new();
//! properties.insert("app", Amf0Value::Number(99.0));
//! properties.insert("second", Amf0Value::Utf8String("test".to_string()));
//!
//! let value1 = Amf0Value::Number(32.0);
//! let value2 = Amf0Value::Boolean(true);
//! let object = Amf0Value::Object(properties);
//!
//! let input = vec![value1, object, value2];
//!
//! // Serialize the values into a vector of bytes
//! let serialized_data = serialize(&input).unwrap();
//!
//! // Deserialize the vector of bytes back into Amf0Value types
//! let mut serialized_cursor = Cursor::new(serialized_data);
//! let results = deserialize(&mut serialized_cursor).unwrap();
//!
//! assert_eq!(input, results);
//! ```

mod deserialization;
mod errors;
mod object;
mod serialization;

pub use deserialization::{deserialize, MAX_NESTING_DEPTH};
pub use errors::{Amf0DeserializationError, Amf0SerializationError};
pub use object::Amf0Object;
pub use serialization::{serialize, serialized_length};

/// An Enum representing the different supported types of Amf0 values
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),

    /// Both normal and long strings.  The marker used on the wire is picked by the
    /// serializer based on the string's byte length.
    Utf8String(String),
    Object(Amf0Object),
    Null,
    Undefined,

    /// Associative array.  Same layout as an object with an element count up front.
    EcmaArray(Amf0Object),
    StrictArray(Vec<Amf0Value>),

    /// Milliseconds since the unix epoch plus the (reserved) time zone field
    Date { unix_millis: f64, time_zone: i16 },
}

impl Amf0Value {
    pub fn get_number(self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_boolean(self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_string(self) -> Option<String> {
        match self {
            Amf0Value::Utf8String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the properties of an object or an ECMA array
    pub fn get_object_properties(self) -> Option<Amf0Object> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            Amf0Value::EcmaArray(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::Utf8String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Amf0Value::Number(value) => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::Utf8String(value.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::Utf8String(value)
    }
}

impl From<Amf0Object> for Amf0Value {
    fn from(value: Amf0Object) -> Self {
        Amf0Value::Object(value)
    }
}

mod markers {
    pub const NUMBER_MARKER: u8 = 0;
    pub const BOOLEAN_MARKER: u8 = 1;
    pub const STRING_MARKER: u8 = 2;
    pub const OBJECT_MARKER: u8 = 3;
    pub const NULL_MARKER: u8 = 5;
    pub const UNDEFINED_MARKER: u8 = 6;
    pub const ECMA_ARRAY_MARKER: u8 = 8;
    pub const OBJECT_END_MARKER: u8 = 9;
    pub const STRICT_ARRAY_MARKER: u8 = 10;
    pub const DATE_MARKER: u8 = 11;
    pub const LONG_STRING_MARKER: u8 = 12;
    pub const UTF_8_EMPTY_MARKER: u16 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn nested_values_survive_serialization_and_deserialization() {
        let mut inner = Amf0Object::new();
        inner.insert("width", Amf0Value::Number(1280.0));
        inner.insert("encoder", Amf0Value::Utf8String("obs".to_string()));
        inner.insert("stereo", Amf0Value::Boolean(true));

        let mut outer = Amf0Object::new();
        outer.insert("level", Amf0Value::Utf8String("status".to_string()));
        outer.insert("details", Amf0Value::Object(inner.clone()));
        outer.insert("metadata", Amf0Value::EcmaArray(inner));
        outer.insert(
            "list",
            Amf0Value::StrictArray(vec![Amf0Value::Null, Amf0Value::Number(2.0)]),
        );

        let input = vec![
            Amf0Value::Utf8String("_result".to_string()),
            Amf0Value::Number(1.0),
            Amf0Value::Object(outer),
            Amf0Value::Date {
                unix_millis: 1_600_000_000_000.0,
                time_zone: 0,
            },
            Amf0Value::Undefined,
        ];

        let bytes = serialize(&input).unwrap();
        assert_eq!(bytes.len(), serialized_length(&input), "Incorrect length");

        let mut cursor = Cursor::new(bytes);
        let result = deserialize(&mut cursor).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn getters_return_none_for_mismatched_types() {
        assert_eq!(Amf0Value::Null.get_number(), None);
        assert_eq!(Amf0Value::Number(1.0).get_string(), None);
        assert_eq!(Amf0Value::Utf8String("a".to_string()).get_boolean(), None);
        assert_eq!(Amf0Value::Boolean(true).get_object_properties(), None);
    }

    #[test]
    fn ecma_array_properties_can_be_retrieved() {
        let mut properties = Amf0Object::new();
        properties.insert("duration", Amf0Value::Number(0.0));

        let value = Amf0Value::EcmaArray(properties.clone());
        assert_eq!(value.get_object_properties(), Some(properties));
    }
}
