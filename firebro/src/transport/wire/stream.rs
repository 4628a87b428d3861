use bytes::{Bytes, BytesMut};
use std::io::{self, Read, Write};

use super::xdr::XdrRead;
use crate::{
    Error, Result,
    common::verbose,
    gds::{DatabaseError, codes::*},
};

const DEFAULT_BUF_CAPACITY: usize = 8192;

const READ_CHUNK: usize = 4096;

/// Buffered read and write socket.
#[derive(Debug)]
pub(crate) struct WireStream<S> {
    pub(super) socket: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

/// Map io error to network engine error.
pub(crate) fn net_error(code: i32, err: io::Error) -> Error {
    Error::from(DatabaseError::from_codes(&[code])).with_context(err.to_string())
}

impl<S: Read + Write> WireStream<S> {
    pub(crate) fn new(socket: S) -> Self {
        Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
        }
    }

    /// Buffer for outgoing message, this does not write to underlying io.
    pub(crate) fn buf(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    /// Write buffered message to underlying io.
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        verbose!(len = self.write_buf.len(), "flush");
        let result = self.socket.write_all(&self.write_buf).and_then(|_| self.socket.flush());
        self.write_buf.clear();
        result.map_err(|e| net_error(NET_WRITE_ERR, e))
    }

    /// Read until at least `len` bytes are buffered.
    ///
    /// Buffered message is flushed first.
    fn fill(&mut self, len: usize) -> Result<()> {
        self.flush()?;
        while self.read_buf.len() < len {
            let start = self.read_buf.len();
            self.read_buf.resize(start + READ_CHUNK, 0);
            let read = self.socket.read(&mut self.read_buf[start..]);
            match read {
                Ok(0) => {
                    self.read_buf.truncate(start);
                    let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
                    return Err(net_error(NET_READ_ERR, eof));
                },
                Ok(n) => self.read_buf.truncate(start + n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => self.read_buf.truncate(start),
                Err(err) => {
                    self.read_buf.truncate(start);
                    return Err(net_error(NET_READ_ERR, err));
                },
            }
        }
        Ok(())
    }
}

impl<S: Read + Write> XdrRead for WireStream<S> {
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.fill(len)?;
        Ok(self.read_buf.split_to(len).freeze())
    }
}
