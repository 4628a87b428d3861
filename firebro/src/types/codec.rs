//! Conversion between [`Value`] and the row byte layout.
//!
//! The layout is the native client memory layout, little endian:
//!
//! | type | bytes |
//! |------|-------|
//! | `CHAR(n)` | `n` bytes, space padded |
//! | `VARCHAR(n)` | `u16` length, content |
//! | `SMALLINT`, `INTEGER`, `BIGINT` | 2, 4, 8 bytes integer |
//! | `NUMERIC`, `DECIMAL` | underlying integer of `value * 10^-scale`, or double |
//! | `FLOAT`, `DOUBLE PRECISION` | IEEE-754 |
//! | `DATE` | `i32` days since 1858-11-17 |
//! | `TIME` | `u32` 1/10000 second ticks since midnight |
//! | `TIMESTAMP` | `DATE` then `TIME` |
//! | `BOOLEAN` | 1 byte |
//! | `BLOB`, `ARRAY` | 8 bytes id |
//!
//! `NULL` is carried by a separate indicator and never reaches the codec.
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use time::{
    Date, PrimitiveDateTime, Time,
    format_description::{BorrowedFormatItem as I, Component as C, modifier},
};

use super::{
    ArrayId, BlobId, ConversionError, DbDataType, Decimal, FieldDescriptor, TruncationError, Value,
    temporal::{decode_date, decode_time, decode_timestamp, encode_date, encode_time, encode_timestamp},
};
use crate::{Result, gds::{ProtocolError, codes::*}};

/// Encode value into `buf`.
///
/// Nothing is written when an error is returned.
pub fn encode(field: &FieldDescriptor, value: &Value, buf: &mut BytesMut) -> Result<()> {
    let ty = field.data_type();

    match field.sql_type() {
        SQL_TEXT | SQL_VARYING if ty == DbDataType::Guid => {
            buf.put_slice(&guid(field, value)?);
        },
        SQL_TEXT => {
            let text = text(field, value)?;
            let pad = if field.charset().is_octets() { 0 } else { b' ' };
            buf.put_slice(&text);
            buf.put_bytes(pad, field.length() as usize - text.len());
        },
        SQL_VARYING => {
            let text = text(field, value)?;
            buf.put_u16_le(text.len() as u16);
            buf.put_slice(&text);
        },
        SQL_SHORT => {
            let v = i16::try_from(scaled(field, value)?).map_err(|_| overflow(ty))?;
            buf.put_i16_le(v);
        },
        SQL_LONG => {
            let v = i32::try_from(scaled(field, value)?).map_err(|_| overflow(ty))?;
            buf.put_i32_le(v);
        },
        SQL_INT64 | SQL_QUAD => buf.put_i64_le(scaled(field, value)?),
        SQL_FLOAT => buf.put_f32_le(float(field, value)? as f32),
        SQL_DOUBLE | SQL_D_FLOAT => buf.put_f64_le(float(field, value)?),
        SQL_TYPE_DATE => buf.put_i32_le(encode_date(date(field, value)?)),
        SQL_TYPE_TIME => buf.put_u32_le(encode_time(time(field, value)?)),
        SQL_TIMESTAMP => {
            let (date, time) = encode_timestamp(timestamp(field, value)?);
            buf.put_i32_le(date);
            buf.put_u32_le(time);
        },
        SQL_BOOLEAN => buf.put_u8(boolean(field, value)? as u8),
        SQL_BLOB => match value {
            Value::Blob(id) => buf.put_slice(&id.to_le_bytes()),
            other => return Err(mismatch(other, ty).into()),
        },
        SQL_ARRAY => match value {
            Value::Array(id) => buf.put_slice(&id.to_le_bytes()),
            other => return Err(mismatch(other, ty).into()),
        },
        SQL_NULL => {},
        _ => return Err(mismatch(value, ty).into()),
    }

    Ok(())
}

/// Encode value into new buffer, [`None`] for [`Value::Null`].
pub fn encode_value(field: &FieldDescriptor, value: &Value) -> Result<Option<Bytes>> {
    if value.is_null() {
        return Ok(None);
    }
    let mut buf = BytesMut::with_capacity(field.size());
    encode(field, value, &mut buf)?;
    Ok(Some(buf.freeze()))
}

/// Decode value from `bytes`.
pub fn decode(field: &FieldDescriptor, bytes: &[u8]) -> Result<Value> {
    let scale = field.scale();

    let value = match field.sql_type() {
        SQL_TEXT | SQL_VARYING if field.data_type() == DbDataType::Guid => {
            Value::Guid(fixed(bytes)?)
        },
        SQL_TEXT => decode_text(field, bytes),
        SQL_VARYING => {
            let len = u16::from_le_bytes(fixed(bytes)?) as usize;
            let content = bytes.get(2..2 + len).ok_or(ProtocolError::eof("decode varchar"))?;
            decode_text(field, content)
        },
        SQL_SHORT => fixed_point(i16::from_le_bytes(fixed(bytes)?) as i64, scale, |v| Value::SmallInt(v as i16)),
        SQL_LONG => fixed_point(i32::from_le_bytes(fixed(bytes)?) as i64, scale, |v| Value::Integer(v as i32)),
        SQL_INT64 | SQL_QUAD => fixed_point(i64::from_le_bytes(fixed(bytes)?), scale, Value::BigInt),
        SQL_FLOAT => Value::Float(f32::from_le_bytes(fixed(bytes)?)),
        SQL_DOUBLE | SQL_D_FLOAT => {
            let v = f64::from_le_bytes(fixed(bytes)?);
            match Decimal::from_f64(v, scale) {
                Some(d) if scale < 0 => Value::Decimal(d),
                _ => Value::Double(v),
            }
        },
        SQL_TYPE_DATE => Value::Date(decode_date(i32::from_le_bytes(fixed(bytes)?))?),
        SQL_TYPE_TIME => Value::Time(decode_time(u32::from_le_bytes(fixed(bytes)?))),
        SQL_TIMESTAMP => {
            let [d0, d1, d2, d3, t0, t1, t2, t3] = fixed::<8>(bytes)?;
            let date = i32::from_le_bytes([d0, d1, d2, d3]);
            let time = u32::from_le_bytes([t0, t1, t2, t3]);
            Value::Timestamp(decode_timestamp(date, time)?)
        },
        SQL_BOOLEAN => Value::Boolean(fixed::<1>(bytes)?[0] != 0),
        SQL_BLOB => Value::Blob(BlobId::new(u64::from_le_bytes(fixed(bytes)?))),
        SQL_ARRAY => Value::Array(ArrayId::new(u64::from_le_bytes(fixed(bytes)?))),
        _ => Value::Null,
    };

    Ok(value)
}

fn decode_text(field: &FieldDescriptor, bytes: &[u8]) -> Value {
    let charset = field.charset();
    if charset.is_octets() {
        return Value::Bytes(Bytes::copy_from_slice(bytes));
    }

    let mut text = charset.decode(bytes);

    // multi byte charset pads CHAR beyond its character count
    let char_count = field.char_count();
    if field.length() as usize % charset.bytes_per_char() == 0 && text.chars().count() > char_count {
        if let Some((idx, _)) = text.char_indices().nth(char_count) {
            text.truncate(idx);
        }
    }

    Value::Text(text)
}

fn fixed_point(value: i64, scale: i16, plain: impl FnOnce(i64) -> Value) -> Value {
    match scale < 0 {
        true => Value::Decimal(Decimal::new(value, scale)),
        false => plain(value),
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ProtocolError> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::eof("decode value"))
}

// ===== Value conversion =====

fn mismatch(value: &Value, field: DbDataType) -> ConversionError {
    ConversionError::Mismatch { value: value.kind(), field }
}

fn overflow(field: DbDataType) -> ConversionError {
    ConversionError::Overflow { field }
}

fn parse_error(input: &str, field: DbDataType) -> ConversionError {
    ConversionError::Parse { field, input: input.into() }
}

/// Text bytes checked against the declared length.
fn text<'a>(field: &FieldDescriptor, value: &'a Value) -> Result<Cow<'a, [u8]>> {
    let charset = field.charset();
    let limit = field.length() as usize;

    let bytes = match value {
        Value::Bytes(b) => Cow::Borrowed(&b[..]),
        Value::Text(s) => {
            check_chars(field, s)?;
            charset.encode(s)?
        },
        Value::Blob(_) | Value::Array(_) | Value::Null => {
            return Err(mismatch(value, field.data_type()).into())
        },
        other => {
            let s = other.to_string();
            check_chars(field, &s)?;
            Cow::Owned(charset.encode(&s)?.into_owned())
        },
    };

    if bytes.len() > limit {
        return Err(TruncationError { limit, found: bytes.len() }.into());
    }

    Ok(bytes)
}

fn check_chars(field: &FieldDescriptor, s: &str) -> Result<(), TruncationError> {
    if field.charset().is_octets() {
        return Ok(());
    }
    let limit = field.char_count();
    let found = s.chars().count();
    match found > limit {
        true => Err(TruncationError { limit, found }),
        false => Ok(()),
    }
}

fn guid(field: &FieldDescriptor, value: &Value) -> Result<[u8; 16]> {
    match value {
        Value::Guid(g) => Ok(*g),
        Value::Bytes(b) if b.len() == 16 => Ok(b[..].try_into().unwrap_or_default()),
        Value::Bytes(b) => Err(TruncationError { limit: 16, found: b.len() }.into()),
        other => Err(mismatch(other, field.data_type()).into()),
    }
}

/// Integer holding `value * 10^-scale` of the field.
fn scaled(field: &FieldDescriptor, value: &Value) -> Result<i64, ConversionError> {
    let ty = field.data_type();
    let scale = field.scale();

    let decimal = match value {
        Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
            Decimal::from(value.as_i64().unwrap_or_default())
        },
        Value::Decimal(d) => *d,
        Value::Boolean(b) => Decimal::from(*b as i64),
        Value::Float(f) => Decimal::from_f64(*f as f64, scale).ok_or(overflow(ty))?,
        Value::Double(f) => Decimal::from_f64(*f, scale).ok_or(overflow(ty))?,
        Value::Text(s) => s.parse::<Decimal>().map_err(|_| parse_error(s, ty))?,
        other => return Err(mismatch(other, ty)),
    };

    decimal.rescale(scale).map(|d| d.mantissa()).ok_or(overflow(ty))
}

fn float(field: &FieldDescriptor, value: &Value) -> Result<f64, ConversionError> {
    let ty = field.data_type();
    match value {
        Value::Float(f) => Ok(*f as f64),
        Value::Double(f) => Ok(*f),
        Value::Decimal(d) => Ok(d.to_f64()),
        Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
            Ok(value.as_i64().unwrap_or_default() as f64)
        },
        Value::Text(s) => s.trim().parse().map_err(|_| parse_error(s, ty)),
        other => Err(mismatch(other, ty)),
    }
}

fn boolean(field: &FieldDescriptor, value: &Value) -> Result<bool, ConversionError> {
    let ty = field.data_type();
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
            Ok(value.as_i64().unwrap_or_default() != 0)
        },
        Value::Text(s) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") || t == "1" => Ok(true),
            t if t.eq_ignore_ascii_case("false") || t == "0" => Ok(false),
            _ => Err(parse_error(s, ty)),
        },
        other => Err(mismatch(other, ty)),
    }
}

const DATE: &[I<'_>] = &[
    I::Component(C::Year(modifier::Year::default())),
    I::Literal(b"-"),
    I::Component(C::Month(modifier::Month::default())),
    I::Literal(b"-"),
    I::Component(C::Day(modifier::Day::default())),
];

const SUBSECOND: &[I<'_>] = &[
    I::Literal(b"."),
    I::Component(C::Subsecond(modifier::Subsecond::default())),
];

const SECOND: &[I<'_>] = &[
    I::Literal(b":"),
    I::Component(C::Second(modifier::Second::default())),
    I::Optional(&I::Compound(SUBSECOND)),
];

const TIME: &[I<'_>] = &[
    I::Component(C::Hour(modifier::Hour::default())),
    I::Literal(b":"),
    I::Component(C::Minute(modifier::Minute::default())),
    I::Optional(&I::Compound(SECOND)),
];

const TIMESTAMP: &[I<'_>] = &[
    I::Compound(DATE),
    I::Literal(b" "),
    I::Compound(TIME),
];

fn date(field: &FieldDescriptor, value: &Value) -> Result<Date, ConversionError> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Timestamp(ts) => Ok(ts.date()),
        Value::Text(s) => Date::parse(s.trim(), DATE).map_err(|_| parse_error(s, field.data_type())),
        other => Err(mismatch(other, field.data_type())),
    }
}

fn time(field: &FieldDescriptor, value: &Value) -> Result<Time, ConversionError> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::Timestamp(ts) => Ok(ts.time()),
        Value::Text(s) => Time::parse(s.trim(), TIME).map_err(|_| parse_error(s, field.data_type())),
        other => Err(mismatch(other, field.data_type())),
    }
}

fn timestamp(field: &FieldDescriptor, value: &Value) -> Result<PrimitiveDateTime, ConversionError> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(d) => Ok(d.midnight()),
        Value::Text(s) => {
            let s = s.trim();
            PrimitiveDateTime::parse(s, TIMESTAMP)
                .or_else(|_| Date::parse(s, DATE).map(Date::midnight))
                .map_err(|_| parse_error(s, field.data_type()))
        },
        other => Err(mismatch(other, field.data_type())),
    }
}
