//! Engine value types and their binary codec.
//!
//! - [`FieldDescriptor`], the described shape of a column or parameter
//! - [`DbDataType`], the logical type derived from a descriptor
//! - [`Value`], an owned engine value
//! - [`codec`], conversion between [`Value`] and the row byte layout
//!
//! Integration with external types:
//!
//! - [`serde`]'s [`Deserialize`][sd] via [`Json`], requires `json` feature
//!
//! [sd]: serde::Deserialize
use std::fmt;

use crate::gds::codes;

mod descriptor;
mod value;
mod temporal;
pub mod codec;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::Json;

pub use descriptor::{DbDataType, FieldDescriptor};
pub use value::{ArrayId, BlobId, Decimal, Value};
pub use temporal::{decode_date, decode_time, encode_date, encode_time};

/// String value does not fit the declared field length.
///
/// Raised locally before any byte is written.
pub struct TruncationError {
    /// Maximum characters, or bytes for octets field.
    pub limit: usize,
    /// Characters, or bytes, of the rejected value.
    pub found: usize,
}

impl std::error::Error for TruncationError { }

impl fmt::Display for TruncationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arithmetic exception, numeric overflow, or string truncation\n\
            string right truncation (expected length {}, actual {})",
            self.limit, self.found,
        )
    }
}

impl fmt::Debug for TruncationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Value can not be converted to or from the field type.
pub enum ConversionError {
    /// Value kind is not accepted by the field.
    Mismatch {
        value: &'static str,
        field: DbDataType,
    },
    /// Value does not fit the field range.
    Overflow {
        field: DbDataType,
    },
    /// Text value can not be parsed as the field type.
    Parse {
        field: DbDataType,
        input: String,
    },
    /// Text contains a character the charset can not represent.
    Charset {
        charset: &'static str,
    },
    /// Date outside of the supported range.
    DateRange,
}

impl ConversionError {
    /// Engine error code equivalent.
    pub fn code(&self) -> i32 {
        match self {
            Self::Overflow { .. } => codes::ARITH_EXCEPT,
            Self::DateRange => codes::DATETIME_RANGE_EXCEEDED,
            _ => codes::CONVERT_ERROR,
        }
    }

    pub fn sqlstate(&self) -> &'static str {
        match self {
            Self::Overflow { .. } => "22003",
            Self::DateRange => "22008",
            _ => "22018",
        }
    }
}

impl std::error::Error for ConversionError { }

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("conversion error, ")?;
        match self {
            Self::Mismatch { value, field } => write!(f, "can not convert {value} to {field}"),
            Self::Overflow { field } => write!(f, "numeric value out of range for {field}"),
            Self::Parse { field, input } => write!(f, "can not parse {input:?} as {field}"),
            Self::Charset { charset } => write!(f, "character not representable in {charset}"),
            Self::DateRange => f.write_str("value exceeds the range for valid dates"),
        }
    }
}

impl fmt::Debug for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
