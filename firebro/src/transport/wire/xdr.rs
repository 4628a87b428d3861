//! XDR encoding of the wire protocol.
//!
//! Every item is big endian and padded to a multiple of 4 bytes. Rows are
//! converted field by field between XDR and the native row layout.
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    Result,
    gds::{ProtocolError, Status, StatusBuilder, codes::*},
    transport::RawRow,
    types::FieldDescriptor,
};

/// Padding after an item of `len` bytes.
pub(crate) const fn pad(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// XDR writes into a buffer.
pub(crate) trait XdrBufMut {
    fn xdr_int(&mut self, value: i32);

    /// Raw bytes followed by padding.
    fn xdr_opaque(&mut self, data: &[u8]);

    /// Length prefixed opaque.
    fn xdr_buffer(&mut self, data: &[u8]);

    /// Quad id as `high` then `low`.
    fn xdr_quad(&mut self, raw: u64);
}

impl XdrBufMut for BytesMut {
    fn xdr_int(&mut self, value: i32) {
        self.put_i32(value);
    }

    fn xdr_opaque(&mut self, data: &[u8]) {
        self.put_slice(data);
        self.put_bytes(0, pad(data.len()));
    }

    fn xdr_buffer(&mut self, data: &[u8]) {
        self.put_i32(data.len() as i32);
        self.xdr_opaque(data);
    }

    fn xdr_quad(&mut self, raw: u64) {
        self.put_i32(raw as u32 as i32);
        self.put_i32((raw >> 32) as u32 as i32);
    }
}

/// XDR reads from a source of bytes.
pub(crate) trait XdrRead {
    /// Take exactly `len` bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Bytes>;

    fn read_int(&mut self) -> Result<i32> {
        Ok(self.read_bytes(4)?.get_i32())
    }

    fn read_hyper(&mut self) -> Result<i64> {
        Ok(self.read_bytes(8)?.get_i64())
    }

    /// Raw bytes of `len`, padding is discarded.
    fn read_opaque(&mut self, len: usize) -> Result<Bytes> {
        let mut data = self.read_bytes(len + pad(len))?;
        data.truncate(len);
        Ok(data)
    }

    fn read_buffer(&mut self) -> Result<Bytes> {
        let len = self.read_int()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::other(format!("negative buffer length {len}")))?;
        self.read_opaque(len)
    }

    fn read_quad(&mut self) -> Result<u64> {
        let high = self.read_int()? as u32 as u64;
        let low = self.read_int()? as u32 as u64;
        Ok(high | low << 32)
    }

    /// Status vector, strings are sent inline.
    fn read_status(&mut self) -> Result<Status> {
        let mut builder = StatusBuilder::new();
        loop {
            match self.read_int()? {
                ARG_END => break,
                tag @ (ARG_STRING | ARG_CSTRING | ARG_INTERPRETED | ARG_SQL_STATE) => {
                    let value = self.read_buffer()?;
                    builder.push_string(tag, String::from_utf8_lossy(&value).into_owned());
                },
                tag => {
                    let value = self.read_int()?;
                    builder.push_code(tag, value);
                },
            }
        }
        Ok(builder.finish())
    }
}

impl XdrRead for Bytes {
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.len() < len {
            return Err(ProtocolError::eof("xdr").into());
        }
        Ok(self.split_to(len))
    }
}

fn short(field: &FieldDescriptor) -> crate::Error {
    ProtocolError::other(format!("row value of `{}` shorter than its type", field.name())).into()
}

/// Write native value of `field` as XDR.
pub(crate) fn put_value(buf: &mut BytesMut, field: &FieldDescriptor, value: &[u8]) -> Result<()> {
    if field.sql_type() == SQL_VARYING {
        let Some(len) = value.get(..2) else {
            return Err(short(field));
        };
        let len = u16::from_le_bytes([len[0], len[1]]) as usize;
        let content = value.get(2..2 + len).ok_or_else(|| short(field))?;
        buf.xdr_buffer(content);
        return Ok(());
    }

    let mut value = value.get(..field.size()).ok_or_else(|| short(field))?;

    match field.sql_type() {
        SQL_TEXT | SQL_BOOLEAN => buf.xdr_opaque(value),
        SQL_SHORT => buf.xdr_int(value.get_i16_le() as i32),
        SQL_LONG | SQL_FLOAT | SQL_TYPE_DATE | SQL_TYPE_TIME => buf.xdr_int(value.get_i32_le()),
        SQL_DOUBLE | SQL_D_FLOAT | SQL_INT64 => buf.put_i64(value.get_i64_le()),
        SQL_TIMESTAMP | SQL_BLOB | SQL_ARRAY | SQL_QUAD => {
            buf.xdr_int(value.get_i32_le());
            buf.xdr_int(value.get_i32_le());
        },
        SQL_NULL => {},
        other => return Err(ProtocolError::other(format!("unsupported sql type {other}")).into()),
    }
    Ok(())
}

/// Read XDR value of `field` into native layout.
pub(crate) fn read_value<R: XdrRead + ?Sized>(r: &mut R, field: &FieldDescriptor) -> Result<Bytes> {
    let mut out = BytesMut::with_capacity(field.size());
    match field.sql_type() {
        SQL_TEXT => return r.read_opaque(field.length() as usize),
        SQL_BOOLEAN => return r.read_opaque(1),
        SQL_VARYING => {
            let content = r.read_buffer()?;
            out.put_u16_le(content.len() as u16);
            out.put(content);
        },
        SQL_SHORT => out.put_i16_le(r.read_int()? as i16),
        SQL_LONG | SQL_FLOAT | SQL_TYPE_DATE | SQL_TYPE_TIME => out.put_i32_le(r.read_int()?),
        SQL_DOUBLE | SQL_D_FLOAT | SQL_INT64 => out.put_i64_le(r.read_hyper()?),
        SQL_TIMESTAMP | SQL_BLOB | SQL_ARRAY | SQL_QUAD => {
            out.put_i32_le(r.read_int()?);
            out.put_i32_le(r.read_int()?);
        },
        SQL_NULL => {},
        other => return Err(ProtocolError::other(format!("unsupported sql type {other}")).into()),
    }
    Ok(out.freeze())
}

/// Write row with a null indicator after each field.
pub(crate) fn put_row(buf: &mut BytesMut, fields: &[FieldDescriptor], row: &[Option<Bytes>]) -> Result<()> {
    for (field, value) in fields.iter().zip(row) {
        match value {
            Some(value) => {
                put_value(buf, field, value)?;
                buf.xdr_int(0);
            },
            None => {
                put_value(buf, field, &vec![0; field.size()])?;
                buf.xdr_int(-1);
            },
        }
    }
    Ok(())
}

/// Read row written by [`put_row`].
pub(crate) fn read_row<R: XdrRead + ?Sized>(r: &mut R, fields: &[FieldDescriptor]) -> Result<RawRow> {
    let mut row = Vec::with_capacity(fields.len());
    for field in fields {
        let value = read_value(r, field)?;
        let null = r.read_int()? != 0;
        row.push((!null).then_some(value));
    }
    Ok(row)
}
