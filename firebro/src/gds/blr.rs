//! BLR message and SDL slice descriptor builders.
//!
//! A BLR message describes the row layout of statement parameters and
//! output on the wire. An SDL describes the shape of an array slice.
use bytes::{BufMut, Bytes, BytesMut};

use super::{DatabaseError, StatusEntry, codes::*};
use crate::{Result, array::ArrayDescriptor, ext::UsizeExt, types::{FieldDescriptor, TruncationError}};

/// Build BLR message describing `fields`, each followed by a null indicator.
pub fn message(fields: &[FieldDescriptor]) -> Bytes {
    let mut blr = BytesMut::with_capacity(8 + fields.len() * 6);
    blr.put_slice(&[BLR_VERSION5, BLR_BEGIN, BLR_MESSAGE, 0]);
    blr.put_u16_le((fields.len() * 2).to_u16());

    for field in fields {
        let scale = field.scale() as i8 as u8;
        let length = field.length();

        match field.sql_type() {
            SQL_VARYING => {
                blr.put_u8(BLR_VARYING);
                blr.put_u16_le(length);
            },
            SQL_TEXT => {
                blr.put_u8(BLR_TEXT);
                blr.put_u16_le(length);
            },
            SQL_DOUBLE => blr.put_u8(BLR_DOUBLE),
            SQL_FLOAT => blr.put_u8(BLR_FLOAT),
            SQL_D_FLOAT => blr.put_u8(BLR_D_FLOAT),
            SQL_TYPE_DATE => blr.put_u8(BLR_SQL_DATE),
            SQL_TYPE_TIME => blr.put_u8(BLR_SQL_TIME),
            SQL_TIMESTAMP => blr.put_u8(BLR_TIMESTAMP),
            SQL_BLOB | SQL_ARRAY => blr.put_slice(&[BLR_QUAD, 0]),
            SQL_LONG => blr.put_slice(&[BLR_LONG, scale]),
            SQL_SHORT => blr.put_slice(&[BLR_SHORT, scale]),
            SQL_INT64 => blr.put_slice(&[BLR_INT64, scale]),
            SQL_QUAD => blr.put_slice(&[BLR_QUAD, scale]),
            SQL_BOOLEAN => blr.put_u8(BLR_BOOL),
            _ => {
                blr.put_u8(BLR_TEXT);
                blr.put_u16_le(length);
            },
        }

        // null indicator
        blr.put_slice(&[BLR_SHORT, 0]);
    }

    blr.put_slice(&[BLR_END, BLR_EOC]);
    blr.freeze()
}

/// Build SDL for reading or writing the whole array described by `desc`.
pub fn sdl(desc: &ArrayDescriptor) -> Result<Bytes> {
    let dimensions = desc.bounds.len();
    if dimensions > MAX_DIMENSIONS {
        return Err(DatabaseError::with_args(INVALID_DIMENSION, [
            StatusEntry::Number(MAX_DIMENSIONS as i32),
            StatusEntry::Number(dimensions as i32),
        ]).into());
    }

    let mut sdl = BytesMut::with_capacity(64);
    sdl.put_slice(&[SDL_VERSION1, SDL_STRUCT, 1, desc.blr_type]);

    match desc.blr_type {
        BLR_SHORT | BLR_LONG | BLR_INT64 | BLR_QUAD => sdl.put_u8(desc.scale as i8 as u8),
        BLR_TEXT | BLR_CSTRING | BLR_VARYING => sdl.put_u16_le(desc.length),
        _ => {},
    }

    put_name(&mut sdl, SDL_RELATION, &desc.relation)?;
    put_name(&mut sdl, SDL_FIELD, &desc.field)?;

    for (n, bound) in desc.bounds.iter().enumerate() {
        if bound.lower == 1 {
            sdl.put_slice(&[SDL_DO1, n as u8]);
        } else {
            sdl.put_slice(&[SDL_DO2, n as u8]);
            put_literal(&mut sdl, bound.lower);
        }
        put_literal(&mut sdl, bound.upper);
    }

    sdl.put_slice(&[SDL_ELEMENT, 1, SDL_SCALAR, 0, dimensions as u8]);
    for n in 0..dimensions {
        sdl.put_slice(&[SDL_VARIABLE, n as u8]);
    }
    sdl.put_u8(SDL_EOC);

    Ok(sdl.freeze())
}

fn put_name(sdl: &mut BytesMut, tag: u8, name: &str) -> Result<(), TruncationError> {
    let len = u8::try_from(name.len())
        .map_err(|_| TruncationError { limit: u8::MAX as usize, found: name.len() })?;
    sdl.put_u8(tag);
    sdl.put_u8(len);
    sdl.put_slice(name.as_bytes());
    Ok(())
}

fn put_literal(sdl: &mut BytesMut, literal: i32) {
    if let Ok(tiny) = i8::try_from(literal) {
        sdl.put_slice(&[SDL_TINY_INTEGER, tiny as u8]);
    } else if let Ok(short) = i16::try_from(literal) {
        sdl.put_u8(SDL_SHORT_INTEGER);
        sdl.put_i16_le(short);
    } else {
        sdl.put_u8(SDL_LONG_INTEGER);
        sdl.put_i32_le(literal);
    }
}

/// Element BLR type of an engine SQL type.
pub fn blr_type(sql_type: i16) -> Option<u8> {
    Some(match sql_type {
        SQL_TEXT => BLR_TEXT,
        SQL_VARYING => BLR_VARYING,
        SQL_SHORT => BLR_SHORT,
        SQL_LONG => BLR_LONG,
        SQL_INT64 => BLR_INT64,
        SQL_QUAD => BLR_QUAD,
        SQL_FLOAT => BLR_FLOAT,
        SQL_DOUBLE => BLR_DOUBLE,
        SQL_D_FLOAT => BLR_D_FLOAT,
        SQL_TYPE_DATE => BLR_SQL_DATE,
        SQL_TYPE_TIME => BLR_SQL_TIME,
        SQL_TIMESTAMP => BLR_TIMESTAMP,
        SQL_BOOLEAN => BLR_BOOL,
        _ => return None,
    })
}

/// Engine SQL type of an element BLR type.
pub fn sql_type(blr_type: u8) -> Option<i16> {
    Some(match blr_type {
        BLR_TEXT | BLR_TEXT2 | BLR_CSTRING | BLR_CSTRING2 => SQL_TEXT,
        BLR_VARYING | BLR_VARYING2 => SQL_VARYING,
        BLR_SHORT => SQL_SHORT,
        BLR_LONG => SQL_LONG,
        BLR_INT64 => SQL_INT64,
        BLR_QUAD => SQL_QUAD,
        BLR_FLOAT => SQL_FLOAT,
        BLR_DOUBLE => SQL_DOUBLE,
        BLR_D_FLOAT => SQL_D_FLOAT,
        BLR_SQL_DATE => SQL_TYPE_DATE,
        BLR_SQL_TIME => SQL_TYPE_TIME,
        BLR_TIMESTAMP => SQL_TIMESTAMP,
        BLR_BOOL => SQL_BOOLEAN,
        _ => return None,
    })
}
