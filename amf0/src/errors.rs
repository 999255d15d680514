use std::{io, string};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    #[error("Encountered unknown marker: {marker}")]
    UnknownMarker { marker: u8 },

    #[error("Unexpected empty object property name")]
    UnexpectedEmptyObjectPropertyName,

    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    #[error("Values are nested more than {max_depth} levels deep")]
    NestingTooDeep { max_depth: usize },

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    FromUtf8Error(#[from] string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    #[error("Object property name length greater than 65,535")]
    PropertyNameTooLong,

    #[error("Object property names cannot be empty")]
    EmptyPropertyName,

    #[error("String length greater than 4,294,967,295")]
    LongStringTooLong,

    #[error("Serialized {actual} bytes but {expected} were computed")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
