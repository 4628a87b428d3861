//! Info block response reader.
//!
//! An info block is a sequence of `(item, u16 length, value)` terminated by
//! [`INFO_END`], integer values use little endian variable width encoding.
use super::{ProtocolError, codes::*};

/// Decode little endian variable width integer.
pub fn vax_integer(bytes: &[u8]) -> i64 {
    let mut value = 0i64;
    for (shift,b) in bytes.iter().take(8).enumerate() {
        value |= (*b as i64) << (shift * 8);
    }
    // sign extend shorter values
    match bytes.len() {
        len @ 1..8 => {
            let bits = len * 8;
            (value << (64 - bits)) >> (64 - bits)
        }
        _ => value,
    }
}

/// Low level cursor over info block bytes.
#[derive(Debug, Clone)]
pub struct InfoCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> InfoCursor<'a> {
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, pos: 0, context }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn byte(&mut self) -> Result<u8, ProtocolError> {
        let b = self.peek().ok_or(ProtocolError::eof(self.context))?;
        self.pos += 1;
        Ok(b)
    }

    /// Read `u16` length prefixed value.
    pub fn value(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.raw(2)?;
        let len = u16::from_le_bytes([len[0], len[1]]) as usize;
        self.raw(len)
    }

    /// Read length prefixed integer value.
    pub fn int(&mut self) -> Result<i64, ProtocolError> {
        self.value().map(vax_integer)
    }

    pub fn raw(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + len;
        let Some(bytes) = self.buf.get(self.pos..end) else {
            return Err(ProtocolError::eof(self.context));
        };
        self.pos = end;
        Ok(bytes)
    }

    pub fn into_reader(self) -> InfoReader<'a> {
        InfoReader { cursor: self, done: false }
    }
}

/// One item of a flat info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoItem<'a> {
    Value { item: u8, data: &'a [u8] },
    /// Response did not fit the requested buffer.
    Truncated,
}

impl InfoItem<'_> {
    /// Integer value of the item, `0` for [`InfoItem::Truncated`].
    pub fn int(&self) -> i64 {
        match self {
            Self::Value { data, .. } => vax_integer(data),
            Self::Truncated => 0,
        }
    }
}

/// Iterator over flat info block items.
///
/// Stops at [`INFO_END`] or at the end of buffer.
#[derive(Debug, Clone)]
pub struct InfoReader<'a> {
    cursor: InfoCursor<'a>,
    done: bool,
}

impl<'a> InfoReader<'a> {
    pub fn new(buf: &'a [u8], context: &'static str) -> Self {
        InfoCursor::new(buf, context).into_reader()
    }
}

impl<'a> Iterator for InfoReader<'a> {
    type Item = Result<InfoItem<'a>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = match self.cursor.peek() {
            None | Some(INFO_END) => {
                self.done = true;
                return None;
            },
            Some(item) => item,
        };
        self.cursor.pos += 1;

        if item == INFO_TRUNCATED {
            self.done = true;
            return Some(Ok(InfoItem::Truncated));
        }

        match self.cursor.value() {
            Ok(data) => Some(Ok(InfoItem::Value { item, data })),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vax() {
        assert_eq!(vax_integer(&[0x39, 0x30]), 12345);
        assert_eq!(vax_integer(&[0xff, 0xff]), -1);
        assert_eq!(vax_integer(&[1, 0, 0, 0]), 1);
        assert_eq!(vax_integer(&[]), 0);
    }

    #[test]
    fn flat_items() {
        let buf = [INFO_SQL_STMT_TYPE, 4, 0, 1, 0, 0, 0, INFO_END, 9];
        let items = InfoReader::new(&buf, "test").collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].int(), 1);
    }

    #[test]
    fn truncated() {
        let buf = [INFO_TRUNCATED, INFO_END];
        let mut reader = InfoReader::new(&buf, "test");
        assert_eq!(reader.next().unwrap().unwrap(), InfoItem::Truncated);
        assert!(reader.next().is_none());
    }

    #[test]
    fn short_buffer() {
        let buf = [INFO_SQL_STMT_TYPE, 4, 0, 1];
        let mut reader = InfoReader::new(&buf, "test");
        assert!(reader.next().unwrap().is_err());
    }
}
