//! Fetched row operation.
//!
//! - [`Row`]
//! - [`DbValue`]
//! - [`FromRow`]
//! - [`Decode`]
//!
//! - [`Index`]
//! - [`DecodeError`]
use bytes::Bytes;
use std::{borrow::Cow, fmt, sync::Arc};
use time::{Date, PrimitiveDateTime, Time};

use crate::{
    Array, ArrayValue, Blob, Transaction,
    types::{ArrayId, BlobId, DbDataType, Decimal, FieldDescriptor, Value},
};

/// Fetched row, values decoded with the statement output descriptors.
#[derive(Clone)]
pub struct Row {
    fields: Arc<[FieldDescriptor]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(fields: Arc<[FieldDescriptor]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(fields.len(), values.len(), "row value count mismatch with descriptors");
        Self { fields, values }
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Get column with its descriptor.
    pub fn column<I: Index>(&self, idx: I) -> Result<DbValue<'_>, DecodeError> {
        let nth = idx.position(&self.fields)?;
        Ok(DbValue { field: &self.fields[nth], value: &self.values[nth] })
    }

    /// Try get and decode column.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        R::decode(self.column(idx)?)
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = DbValue<'_>> {
        self.fields
            .iter()
            .zip(&self.values)
            .map(|(field, value)| DbValue { field, value })
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for col in self.iter() {
            dbg.key(&col.field.alias());
            dbg.value(&format_args!("{}", col.value));
        }
        dbg.finish()
    }
}

/// A value paired with the descriptor it was decoded with.
///
/// Blob and array columns hold an id, the content is read explicitly with
/// [`read_blob`][DbValue::read_blob] or [`read_array`][DbValue::read_array].
#[derive(Clone, Copy, Debug)]
pub struct DbValue<'a> {
    field: &'a FieldDescriptor,
    value: &'a Value,
}

impl<'a> DbValue<'a> {
    pub fn new(field: &'a FieldDescriptor, value: &'a Value) -> Self {
        Self { field, value }
    }

    pub fn field(&self) -> &'a FieldDescriptor {
        self.field
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Return `true` if value is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }

    /// Read blob content, text blobs decode in the attachment charset.
    ///
    /// NULL reads as [`Value::Null`].
    pub fn read_blob(&self, transaction: &Transaction) -> crate::Result<Value> {
        let id = match self.value {
            Value::Null => return Ok(Value::Null),
            Value::Blob(id) => *id,
            _ => return Err(self.mismatch("blob").into()),
        };
        let mut blob = Blob::with_id(transaction, id);
        match self.field.sub_type() {
            1 => blob.read_string().map(Value::Text),
            _ => blob.read().map(Value::Bytes),
        }
    }

    /// Read array elements with their shape, NULL reads as empty.
    pub fn read_array(&self, transaction: &Transaction) -> crate::Result<ArrayValue> {
        let id = match self.value {
            Value::Null => return Ok(ArrayValue::default()),
            Value::Array(id) => *id,
            _ => return Err(self.mismatch("array").into()),
        };
        Array::from_field_with_id(transaction, id, self.field.relation(), self.field.name())?.read()
    }

    fn mismatch(&self, expect: &'static str) -> DecodeError {
        DecodeError::TypeMismatch { expect, found: self.field.data_type() }
    }
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok((
                    $(row.try_get($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

/// A type that can be constructed from [`DbValue`].
pub trait Decode: Sized {
    /// Try decode self from column.
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError>;
}

impl Decode for Value {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        Ok(column.value.clone())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

macro_rules! decode_int {
    ($($ty:ty),*) => {$(
        impl Decode for $ty {
            fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
                match column.value {
                    Value::Null => Err(DecodeError::Null),
                    v => match v.as_i64() {
                        Some(i) => <$ty>::try_from(i).map_err(|_| DecodeError::Overflow),
                        None => Err(column.mismatch(stringify!($ty))),
                    },
                }
            }
        }
    )*};
}

decode_int!(i16, i32, i64);

macro_rules! decode_variant {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
                match column.value {
                    Value::$variant(v) => Ok(v.clone().into()),
                    Value::Null => Err(DecodeError::Null),
                    _ => Err(column.mismatch(stringify!($ty))),
                }
            }
        }
    )*};
}

decode_variant! {
    bool => Boolean,
    Date => Date,
    Time => Time,
    PrimitiveDateTime => Timestamp,
    BlobId => Blob,
    ArrayId => Array,
    [u8; 16] => Guid,
    Bytes => Bytes,
    Vec<u8> => Bytes,
}

impl Decode for f64 {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match *column.value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(v as f64),
            Value::Decimal(d) => Ok(d.to_f64()),
            Value::Null => Err(DecodeError::Null),
            _ => Err(column.mismatch("f64")),
        }
    }
}

impl Decode for f32 {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match *column.value {
            Value::Float(v) => Ok(v),
            Value::Null => Err(DecodeError::Null),
            _ => Err(column.mismatch("f32")),
        }
    }
}

impl Decode for Decimal {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match column.value {
            Value::Decimal(d) => Ok(*d),
            Value::Null => Err(DecodeError::Null),
            v => match v.as_i64() {
                Some(i) => Ok(Decimal::from(i)),
                None => Err(column.mismatch("Decimal")),
            },
        }
    }
}

impl Decode for String {
    fn decode(column: DbValue<'_>) -> Result<Self, DecodeError> {
        match column.value {
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => Ok(String::from_utf8(b.to_vec())?),
            Value::Null => Err(DecodeError::Null),
            _ => Err(column.mismatch("String")),
        }
    }
}

/// Type that can be used for indexing column.
pub trait Index: Sized + sealed::Sealed {
    /// Returns the nth column.
    fn position(self, fields: &[FieldDescriptor]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(self, fields: &[FieldDescriptor]) -> Result<usize, DecodeError> {
        match self < fields.len() {
            true => Ok(self),
            false => Err(DecodeError::IndexOutOfBounds(self)),
        }
    }
}

impl Index for &str {
    /// Lookup by alias, case insensitive.
    fn position(self, fields: &[FieldDescriptor]) -> Result<usize, DecodeError> {
        fields
            .iter()
            .position(|f| f.alias().eq_ignore_ascii_case(self))
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Octets value is not utf8.
    Utf8(std::str::Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static,str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value kind does not match the requested type.
    TypeMismatch {
        expect: &'static str,
        found: DbDataType,
    },
    /// Integer does not fit the requested type.
    Overflow,
    /// Value is null.
    Null,
    /// Failed to deserialize using `serde_json`.
    #[cfg(feature = "json")]
    Json(serde_json::error::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::TypeMismatch { expect, found } => write!(f, "can not decode {found} as `{expect}`"),
            Self::Overflow => f.write_str("integer overflow"),
            Self::Null => f.write_str("unexpected NULL value"),
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<std::string::FromUtf8Error>e => Self::Utf8(e.utf8_error()));
#[cfg(feature = "json")]
from!(<serde_json::error::Error>e => Self::Json(e));

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
