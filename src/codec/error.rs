//! Error type returned by the canonical serializer.

use serde::ser;
use thiserror::Error;

/// Errors the canonical encoder can produce.
///
/// The packed encoding is only defined for types whose width is fixed by
/// their Rust type: unsigned integers, fixed-width byte newtypes and structs
/// composed of them. Everything else is rejected rather than encoded
/// ambiguously.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The value contains a type with no fixed-width packed representation
    /// (floats, strings, sequences, maps, enums, options).
    #[error("type has no canonical packed encoding: {0}")]
    TypeNotRepresentable(&'static str),
    /// Error raised through [serde::ser::Error::custom].
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: core::fmt::Display,
    {
        Error::Custom(msg.to_string())
    }
}

/// Alias for `Result` using the [Error] returned by the serializer.
pub type Result<T> = core::result::Result<T, Error>;
