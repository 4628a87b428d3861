//! Wire protocol backend, protocol version 10 over TCP.
//!
//! Every request is written into the stream buffer and flushed when the
//! response is read. Requests are answered in order, a generic response
//! carries an object handle, a quad id, a data buffer and a status vector.
use bytes::{BufMut, Bytes, BytesMut};
use std::{
    io::{Read, Write},
    net::TcpStream,
};

use super::{BlobHandle, Canceller, Fetched, RawRow, SegmentStatus, StatementHandle, TransactionHandle, Transport};
use crate::{
    Config, Error, Result,
    array::ArrayDescriptor,
    common::{span, verbose},
    gds::{DatabaseError, ProtocolError, Status, StatusEntry, blr, codes::*},
    types::{ArrayId, BlobId, FieldDescriptor},
};

mod stream;
mod xdr;

use stream::{WireStream, net_error};
use xdr::{XdrBufMut, XdrRead, put_row, put_value, read_row, read_value};

/// Operation codes.
mod op {
    pub const CONNECT: i32 = 1;
    pub const ACCEPT: i32 = 3;
    pub const REJECT: i32 = 4;
    pub const DISCONNECT: i32 = 6;
    pub const RESPONSE: i32 = 9;
    pub const ATTACH: i32 = 19;
    pub const CREATE: i32 = 20;
    pub const DETACH: i32 = 21;
    pub const TRANSACTION: i32 = 29;
    pub const COMMIT: i32 = 30;
    pub const ROLLBACK: i32 = 31;
    pub const GET_SEGMENT: i32 = 36;
    pub const CANCEL_BLOB: i32 = 38;
    pub const CLOSE_BLOB: i32 = 39;
    pub const INFO_DATABASE: i32 = 40;
    pub const BATCH_SEGMENTS: i32 = 44;
    pub const COMMIT_RETAINING: i32 = 50;
    pub const PREPARE2: i32 = 51;
    pub const OPEN_BLOB2: i32 = 56;
    pub const CREATE_BLOB2: i32 = 57;
    pub const GET_SLICE: i32 = 58;
    pub const PUT_SLICE: i32 = 59;
    pub const SLICE: i32 = 60;
    pub const ALLOCATE_STATEMENT: i32 = 62;
    pub const EXECUTE: i32 = 63;
    pub const FETCH: i32 = 65;
    pub const FETCH_RESPONSE: i32 = 66;
    pub const FREE_STATEMENT: i32 = 67;
    pub const PREPARE_STATEMENT: i32 = 68;
    pub const INFO_SQL: i32 = 70;
    pub const DUMMY: i32 = 71;
    pub const EXECUTE2: i32 = 76;
    pub const SQL_RESPONSE: i32 = 78;
    pub const DROP_DATABASE: i32 = 81;
    pub const ROLLBACK_RETAINING: i32 = 86;
}

const CONNECT_VERSION2: i32 = 2;
const ARCH_GENERIC: i32 = 1;
const PROTOCOL_VERSION10: i32 = 10;
const PTYPE_RPC: i32 = 2;
const PTYPE_BATCH_SEND: i32 = 3;

const CNCT_USER: u8 = 1;
const CNCT_HOST: u8 = 4;
const CNCT_USER_VERIFICATION: u8 = 6;

/// Fetch status of the last row of a cursor.
const FETCH_EOF: i32 = 100;

const SEGMENT_PARTIAL: i32 = 1;
const SEGMENT_EOF: i32 = 2;

/// Generic response.
#[derive(Debug)]
struct Response {
    handle: i32,
    id: u64,
    data: Bytes,
}

/// Attachment over the network.
#[derive(Debug)]
pub(crate) struct WireTransport<S = TcpStream> {
    stream: WireStream<S>,
    db: i32,
    warnings: Vec<DatabaseError>,
}

impl WireTransport {
    /// Connect to `config` host and attach, or create, the database.
    pub(crate) fn attach(config: &Config, create: bool) -> Result<Self> {
        let socket = TcpStream::connect((config.host.as_str(), config.port)).map_err(|err| {
            Error::from(DatabaseError::with_args(NETWORK_ERROR, [StatusEntry::String(config.host.clone())]))
                .with_context(err.to_string())
        })?;
        socket.set_nodelay(true).map_err(|e| net_error(NET_CONNECT_ERR, e))?;
        Self::establish(socket, config, create)
    }
}

impl<S: Read + Write> WireTransport<S> {
    /// Handshake then attach over connected `socket`.
    pub(crate) fn establish(socket: S, config: &Config, create: bool) -> Result<Self> {
        let mut me = Self { stream: WireStream::new(socket), db: 0, warnings: vec![] };
        me.connect(config)?;

        span!("attach", database = %config.database, create);
        let dpb = config.to_dpb()?;
        let buf = me.stream.buf();
        buf.xdr_int(if create { op::CREATE } else { op::ATTACH });
        buf.xdr_int(0);
        buf.xdr_buffer(config.database.as_bytes());
        buf.xdr_buffer(dpb.as_bytes());
        me.db = me.response()?.handle;
        verbose!(handle = me.db, "attached");
        Ok(me)
    }

    fn connect(&mut self, config: &Config) -> Result<()> {
        let mut user_id = BytesMut::new();
        for (tag, value) in [
            (CNCT_USER, os_user()),
            (CNCT_HOST, os_host()),
            (CNCT_USER_VERIFICATION, String::new()),
        ] {
            let value = &value.as_bytes()[..value.len().min(u8::MAX as usize)];
            user_id.put_u8(tag);
            user_id.put_u8(value.len() as u8);
            user_id.put_slice(value);
        }

        let buf = self.stream.buf();
        buf.xdr_int(op::CONNECT);
        buf.xdr_int(op::ATTACH);
        buf.xdr_int(CONNECT_VERSION2);
        buf.xdr_int(ARCH_GENERIC);
        buf.xdr_buffer(config.database.as_bytes());
        buf.xdr_int(1);
        buf.xdr_buffer(&user_id);

        buf.xdr_int(PROTOCOL_VERSION10);
        buf.xdr_int(ARCH_GENERIC);
        buf.xdr_int(PTYPE_RPC);
        buf.xdr_int(PTYPE_BATCH_SEND);
        buf.xdr_int(2);

        match self.read_op()? {
            op::ACCEPT => {
                let version = self.stream.read_int()?;
                // architecture and protocol type
                self.stream.read_int()?;
                self.stream.read_int()?;
                if version & 0xffff != PROTOCOL_VERSION10 {
                    return Err(ProtocolError::other(format!("unsupported protocol version {version}")).into());
                }
                verbose!(version, "accepted");
                Ok(())
            },
            op::REJECT => Err(DatabaseError::from_codes(&[CONNECT_REJECT]).into()),
            op::RESPONSE => {
                self.response_body()?;
                Err(DatabaseError::from_codes(&[CONNECT_REJECT]).into())
            },
            op => Err(ProtocolError::op(Some(op::ACCEPT), op).into()),
        }
    }

    /// Next operation, skipping keep alive packets.
    fn read_op(&mut self) -> Result<i32> {
        loop {
            match self.stream.read_int()? {
                op::DUMMY => continue,
                op => return Ok(op),
            }
        }
    }

    fn response(&mut self) -> Result<Response> {
        match self.read_op()? {
            op::RESPONSE => self.response_body(),
            op => Err(ProtocolError::op(Some(op::RESPONSE), op).into()),
        }
    }

    fn response_body(&mut self) -> Result<Response> {
        let handle = self.stream.read_int()?;
        let id = self.stream.read_quad()?;
        let data = self.stream.read_buffer()?;
        match self.stream.read_status()? {
            Status::Ok => {},
            Status::Warning(warning) => self.warnings.push(warning),
            Status::Error(err) => return Err(err.into()),
        }
        Ok(Response { handle, id, data })
    }

    /// Send operation with one handle and read generic response.
    fn simple(&mut self, op: i32, handle: i32) -> Result<Response> {
        let buf = self.stream.buf();
        buf.xdr_int(op);
        buf.xdr_int(handle);
        self.response()
    }

    fn disconnect(&mut self) -> Result<()> {
        self.stream.buf().xdr_int(op::DISCONNECT);
        self.stream.flush()
    }

    fn info(&mut self, op: i32, handle: i32, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        let buf = self.stream.buf();
        buf.xdr_int(op);
        buf.xdr_int(handle);
        buf.xdr_int(0);
        buf.xdr_buffer(items);
        buf.xdr_int(buffer_len.min(i32::MAX as usize) as i32);
        Ok(self.response()?.data)
    }
}

fn os_user() -> String {
    std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_default()
}

fn os_host() -> String {
    std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")).unwrap_or_else(|_| "localhost".into())
}

impl<S: Read + Write> Transport for WireTransport<S> {
    fn backend(&self) -> &'static str {
        "wire"
    }

    fn detach(&mut self) -> Result<()> {
        self.simple(op::DETACH, self.db)?;
        self.disconnect()
    }

    fn drop_database(&mut self) -> Result<()> {
        self.simple(op::DROP_DATABASE, self.db)?;
        self.disconnect()
    }

    fn database_info(&mut self, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        self.info(op::INFO_DATABASE, self.db, items, buffer_len)
    }

    fn canceller(&self) -> Option<Box<dyn Canceller>> {
        // protocol 10 has no out of band cancel
        None
    }

    fn begin_transaction(&mut self, tpb: &[u8]) -> Result<TransactionHandle> {
        let buf = self.stream.buf();
        buf.xdr_int(op::TRANSACTION);
        buf.xdr_int(self.db);
        buf.xdr_buffer(tpb);
        Ok(TransactionHandle(self.response()?.handle as u32))
    }

    fn commit(&mut self, tx: TransactionHandle) -> Result<()> {
        self.simple(op::COMMIT, tx.0 as i32).map(drop)
    }

    fn rollback(&mut self, tx: TransactionHandle) -> Result<()> {
        self.simple(op::ROLLBACK, tx.0 as i32).map(drop)
    }

    fn commit_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        self.simple(op::COMMIT_RETAINING, tx.0 as i32)?;
        Ok(tx)
    }

    fn rollback_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        self.simple(op::ROLLBACK_RETAINING, tx.0 as i32)?;
        Ok(tx)
    }

    fn prepare_transaction(&mut self, tx: TransactionHandle, message: &[u8]) -> Result<()> {
        let buf = self.stream.buf();
        buf.xdr_int(op::PREPARE2);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_buffer(message);
        self.response().map(drop)
    }

    fn allocate_statement(&mut self) -> Result<StatementHandle> {
        let handle = self.simple(op::ALLOCATE_STATEMENT, self.db)?.handle;
        Ok(StatementHandle(handle as u32))
    }

    fn prepare_statement(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        sql: &[u8],
        dialect: u16,
        items: &[u8],
        buffer_len: usize,
    ) -> Result<Bytes> {
        let buf = self.stream.buf();
        buf.xdr_int(op::PREPARE_STATEMENT);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_int(stmt.0 as i32);
        buf.xdr_int(dialect as i32);
        buf.xdr_buffer(sql);
        buf.xdr_buffer(items);
        buf.xdr_int(buffer_len.min(i32::MAX as usize) as i32);
        Ok(self.response()?.data)
    }

    fn statement_info(&mut self, stmt: StatementHandle, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        self.info(op::INFO_SQL, stmt.0 as i32, items, buffer_len)
    }

    fn execute(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        inputs: &[FieldDescriptor],
        params: &[Option<Bytes>],
        outputs: Option<&[FieldDescriptor]>,
    ) -> Result<Option<RawRow>> {
        let buf = self.stream.buf();
        buf.xdr_int(if outputs.is_some() { op::EXECUTE2 } else { op::EXECUTE });
        buf.xdr_int(stmt.0 as i32);
        buf.xdr_int(tx.0 as i32);

        if inputs.is_empty() {
            buf.xdr_buffer(&[]);
            buf.xdr_int(0);
            buf.xdr_int(0);
        } else {
            buf.xdr_buffer(&blr::message(inputs));
            buf.xdr_int(0);
            buf.xdr_int(1);
            put_row(buf, inputs, params)?;
        }

        let Some(outputs) = outputs else {
            self.response()?;
            return Ok(None);
        };

        let buf = self.stream.buf();
        buf.xdr_buffer(&blr::message(outputs));
        buf.xdr_int(0);

        match self.read_op()? {
            op::SQL_RESPONSE => {
                let count = self.stream.read_int()?;
                let row = match count > 0 {
                    true => Some(read_row(&mut self.stream, outputs)?),
                    false => None,
                };
                self.response()?;
                Ok(row)
            },
            op::RESPONSE => {
                self.response_body()?;
                Ok(None)
            },
            op => Err(ProtocolError::op(Some(op::SQL_RESPONSE), op).into()),
        }
    }

    fn fetch(&mut self, stmt: StatementHandle, outputs: &[FieldDescriptor], count: usize) -> Result<Fetched> {
        let buf = self.stream.buf();
        buf.xdr_int(op::FETCH);
        buf.xdr_int(stmt.0 as i32);
        buf.xdr_buffer(&blr::message(outputs));
        buf.xdr_int(0);
        buf.xdr_int(count.min(i32::MAX as usize) as i32);

        let mut fetched = Fetched::default();
        loop {
            match self.read_op()? {
                op::FETCH_RESPONSE => {},
                op::RESPONSE => {
                    // an error, or end of batch
                    self.response_body()?;
                    return Ok(fetched);
                },
                op => return Err(ProtocolError::op(Some(op::FETCH_RESPONSE), op).into()),
            }

            let status = self.stream.read_int()?;
            let rows = self.stream.read_int()?;
            match status {
                0 if rows > 0 => fetched.rows.push(read_row(&mut self.stream, outputs)?),
                FETCH_EOF => {
                    fetched.eof = true;
                    return Ok(fetched);
                },
                _ => return Ok(fetched),
            }
        }
    }

    fn free_statement(&mut self, stmt: StatementHandle, option: u16) -> Result<()> {
        let buf = self.stream.buf();
        buf.xdr_int(op::FREE_STATEMENT);
        buf.xdr_int(stmt.0 as i32);
        buf.xdr_int(option as i32);
        self.response().map(drop)
    }

    fn create_blob(&mut self, tx: TransactionHandle) -> Result<(BlobHandle, BlobId)> {
        let buf = self.stream.buf();
        buf.xdr_int(op::CREATE_BLOB2);
        buf.xdr_buffer(&[BPB_VERSION1]);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_quad(0);
        let response = self.response()?;
        Ok((BlobHandle(response.handle as u32), BlobId::new(response.id)))
    }

    fn open_blob(&mut self, tx: TransactionHandle, id: BlobId) -> Result<BlobHandle> {
        let buf = self.stream.buf();
        buf.xdr_int(op::OPEN_BLOB2);
        buf.xdr_buffer(&[BPB_VERSION1]);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_quad(id.raw());
        Ok(BlobHandle(self.response()?.handle as u32))
    }

    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> Result<(Bytes, SegmentStatus)> {
        let buf = self.stream.buf();
        buf.xdr_int(op::GET_SEGMENT);
        buf.xdr_int(blob.0 as i32);
        buf.xdr_int((max + 2).min(i16::MAX as usize) as i32);
        buf.xdr_int(0);
        let response = self.response()?;

        // segments, each prefixed by u16 length
        let mut data = BytesMut::with_capacity(response.data.len());
        let mut chunks = &response.data[..];
        while let [lo, hi, rest @ ..] = chunks {
            let len = u16::from_le_bytes([*lo, *hi]) as usize;
            let segment = rest.get(..len).ok_or(ProtocolError::eof("get segment"))?;
            data.put_slice(segment);
            chunks = &rest[len..];
        }

        let status = match response.handle {
            SEGMENT_EOF => SegmentStatus::Eof,
            SEGMENT_PARTIAL => SegmentStatus::Partial,
            _ => SegmentStatus::Complete,
        };
        Ok((data.freeze(), status))
    }

    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> Result<()> {
        let len = u16::try_from(data.len())
            .map_err(|_| ProtocolError::other(format!("segment of {} bytes exceeds 65535", data.len())))?;
        let mut segment = BytesMut::with_capacity(data.len() + 2);
        segment.put_u16_le(len);
        segment.put_slice(data);

        let buf = self.stream.buf();
        buf.xdr_int(op::BATCH_SEGMENTS);
        buf.xdr_int(blob.0 as i32);
        buf.xdr_int(segment.len() as i32);
        buf.xdr_buffer(&segment);
        self.response().map(drop)
    }

    fn close_blob(&mut self, blob: BlobHandle) -> Result<()> {
        self.simple(op::CLOSE_BLOB, blob.0 as i32).map(drop)
    }

    fn cancel_blob(&mut self, blob: BlobHandle) -> Result<()> {
        self.simple(op::CANCEL_BLOB, blob.0 as i32).map(drop)
    }

    fn get_slice(
        &mut self,
        tx: TransactionHandle,
        id: ArrayId,
        desc: &ArrayDescriptor,
        slice_length: usize,
    ) -> Result<Bytes> {
        let sdl = blr::sdl(desc)?;
        let field = desc.element_field()?;

        let buf = self.stream.buf();
        buf.xdr_int(op::GET_SLICE);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_quad(id.raw());
        buf.xdr_int(slice_length as i32);
        buf.xdr_buffer(&sdl);
        buf.xdr_buffer(&[]);
        buf.xdr_int(0);

        match self.read_op()? {
            op::SLICE => {},
            op::RESPONSE => {
                self.response_body()?;
                return Err(ProtocolError::op(Some(op::SLICE), op::RESPONSE).into());
            },
            op => return Err(ProtocolError::op(Some(op::SLICE), op).into()),
        }

        // slice length, twice
        self.stream.read_int()?;
        self.stream.read_int()?;

        let size = field.size();
        let mut slice = BytesMut::with_capacity(slice_length);
        for _ in 0..desc.element_count() {
            let value = read_value(&mut self.stream, &field)?;
            slice.put_slice(&value);
            slice.put_bytes(0, size.saturating_sub(value.len()));
        }
        Ok(slice.freeze())
    }

    fn put_slice(&mut self, tx: TransactionHandle, id: ArrayId, desc: &ArrayDescriptor, slice: &[u8]) -> Result<ArrayId> {
        let sdl = blr::sdl(desc)?;
        let field = desc.element_field()?;

        let buf = self.stream.buf();
        buf.xdr_int(op::PUT_SLICE);
        buf.xdr_int(tx.0 as i32);
        buf.xdr_quad(id.raw());
        buf.xdr_int(slice.len() as i32);
        buf.xdr_buffer(&sdl);
        buf.xdr_buffer(&[]);
        buf.xdr_int(slice.len() as i32);
        for element in slice.chunks_exact(field.size().max(1)) {
            put_value(buf, &field, element)?;
        }

        Ok(ArrayId::new(self.response()?.id))
    }

    fn take_warnings(&mut self) -> Vec<DatabaseError> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::{self, Cursor};
    use crate::ErrorKind;

    /// Socket replaying recorded server bytes.
    #[derive(Debug)]
    struct Replay {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Replay {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Replay {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ok_status(buf: &mut BytesMut) {
        buf.xdr_int(ARG_GDS);
        buf.xdr_int(0);
        buf.xdr_int(ARG_END);
    }

    fn response(buf: &mut BytesMut, handle: i32, id: u64, data: &[u8]) {
        buf.xdr_int(op::RESPONSE);
        buf.xdr_int(handle);
        buf.xdr_quad(id);
        buf.xdr_buffer(data);
        ok_status(buf);
    }

    fn accept(buf: &mut BytesMut) {
        buf.xdr_int(op::ACCEPT);
        buf.xdr_int(PROTOCOL_VERSION10);
        buf.xdr_int(ARCH_GENERIC);
        buf.xdr_int(PTYPE_BATCH_SEND);
    }

    /// Attached transport replaying `script` after the handshake.
    fn attached(script: impl FnOnce(&mut BytesMut)) -> WireTransport<Replay> {
        let mut input = BytesMut::new();
        accept(&mut input);
        response(&mut input, 7, 0, &[]);
        script(&mut input);

        let replay = Replay { input: Cursor::new(input.to_vec()), output: vec![] };
        let config = Config::default().with_database("/db/app.fdb");
        let mut wire = WireTransport::establish(replay, &config, false).unwrap();
        wire.stream.socket.output.clear();
        wire
    }

    fn ints(bytes: &[u8]) -> Vec<i32> {
        bytes.chunks_exact(4).map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    #[test]
    fn oversized_segment() {
        let mut wire = attached(|_| {});
        let err = wire.put_segment(BlobHandle(4), &vec![0; 70_000]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
        assert!(wire.stream.socket.output.is_empty());
    }

    #[test]
    fn no_canceller() {
        assert!(attached(|_| {}).canceller().is_none());
    }

    #[test]
    fn handshake() {
        let wire = attached(|_| {});
        assert_eq!(wire.db, 7);
    }

    #[test]
    fn handshake_request() {
        let mut input = BytesMut::new();
        accept(&mut input);
        response(&mut input, 1, 0, &[]);
        let replay = Replay { input: Cursor::new(input.to_vec()), output: vec![] };
        let wire = WireTransport::establish(replay, &Config::default().with_database("db"), true).unwrap();

        let sent = ints(&wire.stream.socket.output);
        assert_eq!(&sent[..4], &[op::CONNECT, op::ATTACH, CONNECT_VERSION2, ARCH_GENERIC]);
        assert_eq!(&sent[4..6], &[2, i32::from_be_bytes(*b"db\0\0")]);
        assert!(sent.contains(&op::CREATE));
    }

    #[test]
    fn rejected() {
        let mut input = BytesMut::new();
        input.xdr_int(op::REJECT);
        let replay = Replay { input: Cursor::new(input.to_vec()), output: vec![] };
        let err = WireTransport::establish(replay, &Config::default(), false).unwrap_err();
        assert_eq!(err.code(), Some(CONNECT_REJECT));
    }

    #[test]
    fn closed_socket() {
        let replay = Replay { input: Cursor::new(vec![]), output: vec![] };
        let err = WireTransport::establish(replay, &Config::default(), false).unwrap_err();
        assert_eq!(err.code(), Some(NET_READ_ERR));
        assert!(err.is_fatal());
    }

    #[test]
    fn error_and_warning() {
        let mut wire = attached(|buf| {
            buf.xdr_int(op::DUMMY);
            buf.xdr_int(op::RESPONSE);
            buf.xdr_int(0);
            buf.xdr_quad(0);
            buf.xdr_buffer(&[]);
            buf.xdr_int(ARG_GDS);
            buf.xdr_int(DEADLOCK);
            buf.xdr_int(ARG_END);

            buf.xdr_int(op::RESPONSE);
            buf.xdr_int(0);
            buf.xdr_quad(0);
            buf.xdr_buffer(&[]);
            buf.xdr_int(ARG_WARNING);
            buf.xdr_int(STRING_TRUNCATION);
            buf.xdr_int(ARG_END);
        });

        let err = wire.commit(TransactionHandle(3)).unwrap_err();
        assert_eq!(err.code(), Some(DEADLOCK));
        assert_eq!(ints(&wire.stream.socket.output), vec![op::COMMIT, 3]);

        wire.rollback(TransactionHandle(3)).unwrap();
        let warnings = wire.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_warning());
    }

    #[test]
    fn fetch_rows() {
        let fields = [FieldDescriptor::new(SQL_LONG, 4), FieldDescriptor::new(SQL_VARYING + 1, 8)];
        let mut wire = attached(|buf| {
            for (id, name) in [(1, "one"), (2, "two")] {
                buf.xdr_int(op::FETCH_RESPONSE);
                buf.xdr_int(0);
                buf.xdr_int(1);
                buf.xdr_int(id);
                buf.xdr_int(0);
                buf.xdr_buffer(name.as_bytes());
                buf.xdr_int(0);
            }
            buf.xdr_int(op::FETCH_RESPONSE);
            buf.xdr_int(FETCH_EOF);
            buf.xdr_int(0);
        });

        let fetched = wire.fetch(StatementHandle(5), &fields, 200).unwrap();
        assert!(fetched.eof);
        assert_eq!(fetched.rows.len(), 2);
        assert_eq!(fetched.rows[1][0].as_deref(), Some(&2i32.to_le_bytes()[..]));
        assert_eq!(fetched.rows[1][1].as_deref(), Some(&b"\x03\x00two"[..]));
    }

    #[test]
    fn fetch_batch_end() {
        let fields = [FieldDescriptor::new(SQL_SHORT + 1, 2)];
        let mut wire = attached(|buf| {
            buf.xdr_int(op::FETCH_RESPONSE);
            buf.xdr_int(0);
            buf.xdr_int(1);
            buf.xdr_int(0);
            buf.xdr_int(-1);
            buf.xdr_int(op::FETCH_RESPONSE);
            buf.xdr_int(0);
            buf.xdr_int(0);
        });

        let fetched = wire.fetch(StatementHandle(5), &fields, 1).unwrap();
        assert!(!fetched.eof);
        assert_eq!(fetched.rows, vec![vec![None]]);
    }

    #[test]
    fn execute_singleton() {
        let inputs = [FieldDescriptor::new(SQL_LONG, 4)];
        let outputs = [FieldDescriptor::new(SQL_INT64, 8)];
        let mut wire = attached(|buf| {
            buf.xdr_int(op::SQL_RESPONSE);
            buf.xdr_int(1);
            buf.put_i64(42);
            buf.xdr_int(0);
            response(buf, 0, 0, &[]);
        });

        let params = [Some(Bytes::copy_from_slice(&6i32.to_le_bytes()))];
        let row = wire.execute(TransactionHandle(2), StatementHandle(4), &inputs, &params, Some(&outputs)).unwrap();
        assert_eq!(row, Some(vec![Some(Bytes::copy_from_slice(&42i64.to_le_bytes()))]));

        let sent = ints(&wire.stream.socket.output);
        assert_eq!(&sent[..3], &[op::EXECUTE2, 4, 2]);
    }

    #[test]
    fn segments() {
        let mut wire = attached(|buf| {
            response(buf, SEGMENT_EOF, 0, b"\x03\x00abc\x02\x00de");
            response(buf, 0, 0, &[]);
        });

        let (data, status) = wire.get_segment(BlobHandle(9), 100).unwrap();
        assert_eq!(&data[..], b"abcde");
        assert_eq!(status, SegmentStatus::Eof);

        wire.stream.socket.output.clear();
        wire.put_segment(BlobHandle(9), b"xyz").unwrap();
        let sent = &wire.stream.socket.output;
        assert_eq!(ints(&sent[..12]), vec![op::BATCH_SEGMENTS, 9, 5]);
        assert_eq!(&sent[16..21], b"\x03\x00xyz");
    }

    #[test]
    fn slice_roundtrip() {
        let desc = ArrayDescriptor {
            blr_type: BLR_VARYING,
            scale: 0,
            length: 4,
            relation: "T".into(),
            field: "A".into(),
            bounds: vec![crate::array::ArrayBound::new(1, 2)],
            charset: crate::charset::default(),
        };
        let mut wire = attached(|buf| {
            buf.xdr_int(op::SLICE);
            buf.xdr_int(12);
            buf.xdr_int(12);
            buf.xdr_buffer(b"ab");
            buf.xdr_buffer(b"wxyz");
            response(buf, 0, 0x0000_0001_0000_0081, &[]);
        });

        let slice = wire.get_slice(TransactionHandle(2), ArrayId::new(5), &desc, 12).unwrap();
        assert_eq!(&slice[..], b"\x02\x00ab\x00\x00\x04\x00wxyz");

        let id = wire.put_slice(TransactionHandle(2), ArrayId::NULL, &desc, &slice).unwrap();
        assert_eq!(id.raw(), 0x0000_0001_0000_0081);
    }
}
