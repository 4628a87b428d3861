//! Tag-length-value parameter buffers (DPB, TPB, BPB).
use bytes::{BufMut, Bytes, BytesMut};

use crate::types::TruncationError;

/// Longest value of one item.
pub const MAX_ITEM_LENGTH: usize = u8::MAX as usize;

/// A version byte followed by `(tag, [length], value)` items.
///
/// ```
/// use firebro::gds::{ParameterBuffer, codes};
///
/// let mut dpb = ParameterBuffer::new(codes::DPB_VERSION1);
/// dpb.put_str(codes::DPB_USER_NAME, "SYSDBA").unwrap();
/// assert_eq!(&dpb.as_bytes()[..3], &[1, 28, 6]);
/// ```
#[derive(Clone, Debug)]
pub struct ParameterBuffer {
    buf: BytesMut,
}

impl ParameterBuffer {
    pub fn new(version: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(version);
        Self { buf }
    }

    /// Item without value, used by TPB flags.
    pub fn put_flag(&mut self, tag: u8) {
        self.buf.put_u8(tag);
    }

    /// Item with one byte length prefix.
    ///
    /// Values longer than 255 bytes are rejected and nothing is written.
    pub fn put_bytes(&mut self, tag: u8, value: &[u8]) -> Result<(), TruncationError> {
        let len = u8::try_from(value.len())
            .map_err(|_| TruncationError { limit: MAX_ITEM_LENGTH, found: value.len() })?;
        self.put_item(tag, len, value);
        Ok(())
    }

    pub fn put_str(&mut self, tag: u8, value: &str) -> Result<(), TruncationError> {
        self.put_bytes(tag, value.as_bytes())
    }

    pub fn put_byte(&mut self, tag: u8, value: u8) {
        self.put_item(tag, 1, &[value]);
    }

    /// Item holding 4 bytes little endian integer.
    pub fn put_int(&mut self, tag: u8, value: i32) {
        self.put_item(tag, 4, &value.to_le_bytes());
    }

    fn put_item(&mut self, tag: u8, len: u8, value: &[u8]) {
        self.buf.put_u8(tag);
        self.buf.put_u8(len);
        self.buf.put_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if only the version byte is present.
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 1
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gds::codes::*;

    #[test]
    fn tpb_layout() {
        let mut tpb = ParameterBuffer::new(TPB_VERSION3);
        tpb.put_flag(TPB_WRITE);
        tpb.put_flag(TPB_NOWAIT);
        tpb.put_int(TPB_LOCK_TIMEOUT, 10);
        assert_eq!(tpb.as_bytes(), &[3, 9, 7, 21, 4, 10, 0, 0, 0]);
    }

    #[test]
    fn dpb_layout() {
        let mut dpb = ParameterBuffer::new(DPB_VERSION1);
        dpb.put_str(DPB_LC_CTYPE, "UTF8").unwrap();
        dpb.put_int(DPB_SQL_DIALECT, 3);
        assert_eq!(
            dpb.as_bytes(),
            &[1, 48, 4, b'U', b'T', b'F', b'8', 63, 4, 3, 0, 0, 0]
        );
        assert!(!dpb.is_empty());
        assert!(ParameterBuffer::new(BPB_VERSION1).is_empty());
    }

    #[test]
    fn item_too_long() {
        let mut dpb = ParameterBuffer::new(DPB_VERSION1);
        dpb.put_bytes(DPB_PASSWORD, &[b'x'; 255]).unwrap();
        let err = dpb.put_str(DPB_USER_NAME, &"u".repeat(256)).unwrap_err();
        assert_eq!((err.limit, err.found), (255, 256));
        assert_eq!(dpb.len(), 1 + 2 + 255);
    }
}
