use bytes::Bytes;
use std::{fmt, str::FromStr};
use time::{Date, PrimitiveDateTime, Time};

use super::{ConversionError, DbDataType};

macro_rules! quad_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// Stored as the engine `ISC_QUAD` in memory order, `high` word first.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u64);

        impl $name {
            /// Id that refers to nothing.
            pub const NULL: Self = Self(0);

            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn from_parts(high: i32, low: u32) -> Self {
                Self(high as u32 as u64 | (low as u64) << 32)
            }

            pub const fn raw(&self) -> u64 {
                self.0
            }

            pub const fn high(&self) -> i32 {
                self.0 as u32 as i32
            }

            pub const fn low(&self) -> u32 {
                (self.0 >> 32) as u32
            }

            pub const fn is_null(&self) -> bool {
                self.0 == 0
            }

            pub(crate) fn to_le_bytes(self) -> [u8; 8] {
                self.0.to_le_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}:{})", stringify!($name), self.high(), self.low())
            }
        }
    };
}

quad_id! {
    /// Id of a blob.
    BlobId
}

quad_id! {
    /// Id of an array slice.
    ArrayId
}

/// Fixed point number, the value is `mantissa * 10^scale`.
///
/// `scale` follows the engine convention, `-2` means two fractional digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i64,
    scale: i16,
}

impl Decimal {
    pub const fn new(mantissa: i64, scale: i16) -> Self {
        Self { mantissa, scale }
    }

    pub const fn mantissa(&self) -> i64 {
        self.mantissa
    }

    pub const fn scale(&self) -> i16 {
        self.scale
    }

    /// Rescale to `scale`, rounding half away from zero.
    ///
    /// Returns [`None`] on overflow.
    pub fn rescale(self, scale: i16) -> Option<Decimal> {
        let m = self.mantissa as i128;
        let diff = self.scale as i32 - scale as i32;

        let mantissa = if diff >= 0 {
            match 10i128.checked_pow(diff as u32) {
                Some(factor) => m.checked_mul(factor)?,
                None if m == 0 => 0,
                None => return None,
            }
        } else {
            match 10i128.checked_pow(diff.unsigned_abs()) {
                Some(divisor) => {
                    let (q, r) = (m / divisor, m % divisor);
                    if r.abs() * 2 >= divisor { q + m.signum() } else { q }
                },
                None => 0,
            }
        };

        Some(Decimal { mantissa: mantissa.try_into().ok()?, scale })
    }

    /// Integer part after rounding.
    pub fn to_integer(self) -> Option<i64> {
        self.rescale(0).map(|d| d.mantissa)
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 * 10f64.powi(self.scale as i32)
    }

    /// Convert float rounding to `scale`.
    ///
    /// Returns [`None`] if value is not finite or out of range.
    pub fn from_f64(value: f64, scale: i16) -> Option<Decimal> {
        let scaled = (value * 10f64.powi(-(scale as i32))).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Decimal { mantissa: scaled as i64, scale })
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::new(value, 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = itoa::Buffer::new();
        let digits = buf.format(self.mantissa.unsigned_abs());
        let sign = if self.mantissa < 0 { "-" } else { "" };

        if self.scale >= 0 {
            f.write_str(sign)?;
            f.write_str(digits)?;
            for _ in 0..self.scale {
                f.write_str("0")?;
            }
            return Ok(());
        }

        let frac = self.scale.unsigned_abs() as usize;
        f.write_str(sign)?;
        if digits.len() > frac {
            let (int, dec) = digits.split_at(digits.len() - frac);
            write!(f, "{int}.{dec}")
        } else {
            write!(f, "0.{digits:0>frac$}")
        }
    }
}

impl FromStr for Decimal {
    type Err = ConversionError;

    /// Parse plain decimal notation, the scale is the count of fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ConversionError::Parse { field: DbDataType::Decimal, input: s.into() };
        let input = s.trim();

        let (negative, unsigned) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };

        let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let mut mantissa = 0i64;
        for b in int.bytes().chain(frac.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add((b - b'0') as i64))
                .ok_or(ConversionError::Overflow { field: DbDataType::Decimal })?;
        }

        let scale = i16::try_from(frac.len()).map_err(|_| err())?;
        Ok(Decimal {
            mantissa: if negative { -mantissa } else { mantissa },
            scale: -scale,
        })
    }
}

/// An owned engine value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    /// Raw bytes of an `OCTETS` text field or a binary blob.
    Bytes(Bytes),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Guid([u8; 16]),
    Blob(BlobId),
    Array(ArrayId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "boolean",
            Self::SmallInt(_) => "smallint",
            Self::Integer(_) => "integer",
            Self::BigInt(_) => "bigint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Timestamp(_) => "timestamp",
            Self::Guid(_) => "guid",
            Self::Blob(_) => "blob id",
            Self::Array(_) => "array id",
        }
    }

    /// Any integer kind widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::SmallInt(v) => Some(v as i64),
            Self::Integer(v) => Some(v as i64),
            Self::BigInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(v) => f.write_str(if *v { "TRUE" } else { "FALSE" }),
            Self::SmallInt(v) => v.fmt(f),
            Self::Integer(v) => v.fmt(f),
            Self::BigInt(v) => v.fmt(f),
            Self::Float(v) => v.fmt(f),
            Self::Double(v) => v.fmt(f),
            Self::Decimal(v) => v.fmt(f),
            Self::Text(v) => f.write_str(v),
            Self::Bytes(v) => {
                use crate::ext::FmtExt;
                v.lossy().fmt(f)
            },
            Self::Date(v) => v.fmt(f),
            Self::Time(v) => v.fmt(f),
            Self::Timestamp(v) => v.fmt(f),
            Self::Guid(v) => {
                for (i, b) in v.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            },
            Self::Blob(v) => write!(f, "{v:?}"),
            Self::Array(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        }
    )*};
}

from! {
    bool => Boolean,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    Date => Date,
    Time => Time,
    PrimitiveDateTime => Timestamp,
    [u8; 16] => Guid,
    BlobId => Blob,
    ArrayId => Array,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::SmallInt(v) => serializer.serialize_i16(*v),
            Self::Integer(v) => serializer.serialize_i32(*v),
            Self::BigInt(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f32(*v),
            Self::Double(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Bytes(v) => serializer.serialize_bytes(v),
            Self::Blob(v) => serializer.serialize_u64(v.raw()),
            Self::Array(v) => serializer.serialize_u64(v.raw()),
            other => serializer.collect_str(other),
        }
    }
}
