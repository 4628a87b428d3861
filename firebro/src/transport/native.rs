//! Client library backend.
//!
//! [`FbClient`] mirrors the entry points of the engine client library. Each
//! call fills a status vector and returns its primary code, `0` on success.
//! The binding to the library itself lives outside of this crate.
use bytes::{Bytes, BytesMut};
use std::fmt;

use super::{BlobHandle, Canceller, Fetched, RawRow, SegmentStatus, StatementHandle, TransactionHandle, Transport};
use crate::{
    Config, Result,
    array::ArrayDescriptor,
    common::{span, verbose},
    gds::{DatabaseError, Status, StringResolver, blr, codes::*, status::{RawPointers, parse_native}},
    types::{ArrayId, BlobId, FieldDescriptor},
};

/// Status vector filled by every client library call.
pub type StatusVector = [isize; STATUS_LENGTH];

/// Return code of `isc_dsql_fetch` after the last row.
pub const FETCH_EOF: isize = 100;

/// One column or parameter of an [`Xsqlda`].
///
/// `data` holds the value in the client memory layout, `null` is `-1` for
/// NULL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Xsqlvar {
    pub sqltype: i16,
    pub sqlscale: i16,
    pub sqlsubtype: i16,
    pub sqllen: i16,
    pub data: Vec<u8>,
    pub null: i16,
    pub name: String,
    pub relation: String,
    pub owner: String,
    pub alias: String,
}

/// Extended SQL descriptor area.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Xsqlda {
    pub vars: Vec<Xsqlvar>,
}

impl Xsqlda {
    /// Descriptor area with buffers sized for `fields`.
    pub fn describe(fields: &[FieldDescriptor]) -> Self {
        let vars = fields
            .iter()
            .map(|field| Xsqlvar {
                // parameters always accept NULL
                sqltype: field.sql_type() | 1,
                sqlscale: field.scale(),
                sqlsubtype: field.sub_type(),
                sqllen: field.length() as i16,
                data: vec![0; field.size()],
                null: 0,
                name: field.name().into(),
                relation: field.relation().into(),
                owner: field.owner().into(),
                alias: field.alias().into(),
            })
            .collect();
        Self { vars }
    }

    fn bind(&mut self, row: &[Option<Bytes>]) {
        for (var, value) in self.vars.iter_mut().zip(row) {
            match value {
                Some(value) => {
                    var.data.clear();
                    var.data.extend_from_slice(value);
                    var.null = 0;
                },
                None => var.null = -1,
            }
        }
    }

    fn row(&self) -> RawRow {
        self.vars
            .iter()
            .map(|var| match var.null {
                -1 => None,
                _ if var.sqltype & !1 == SQL_VARYING => {
                    let len = var.data.get(..2).map(|l| u16::from_le_bytes([l[0], l[1]]) as usize).unwrap_or(0);
                    Some(Bytes::copy_from_slice(&var.data[..(2 + len).min(var.data.len())]))
                },
                _ => Some(Bytes::copy_from_slice(&var.data)),
            })
            .collect()
    }
}

/// Entry points of the engine client library.
///
/// Handles are the library `FB_API_HANDLE` values, `0` is no handle. Quad ids
/// are `ISC_QUAD` read as little endian `u64`.
pub trait FbClient: Send {
    /// Resolver for string pointers of status vectors filled by this client.
    fn resolver(&self) -> &dyn StringResolver {
        &RawPointers
    }

    fn attach_database(&mut self, status: &mut StatusVector, path: &[u8], db: &mut u32, dpb: &[u8]) -> isize;

    fn create_database(&mut self, status: &mut StatusVector, path: &[u8], db: &mut u32, dpb: &[u8]) -> isize;

    fn detach_database(&mut self, status: &mut StatusVector, db: &mut u32) -> isize;

    fn drop_database(&mut self, status: &mut StatusVector, db: &mut u32) -> isize;

    fn database_info(&mut self, status: &mut StatusVector, db: &mut u32, items: &[u8], buffer: &mut [u8]) -> isize;

    /// Entry point of `fb_cancel_operation`, used without locking this client.
    fn canceller(&self) -> Box<dyn FbCancel>;

    /// `isc_start_multiple` with a single database.
    fn start_transaction(&mut self, status: &mut StatusVector, tx: &mut u32, db: &mut u32, tpb: &[u8]) -> isize;

    fn commit_transaction(&mut self, status: &mut StatusVector, tx: &mut u32) -> isize;

    fn rollback_transaction(&mut self, status: &mut StatusVector, tx: &mut u32) -> isize;

    fn commit_retaining(&mut self, status: &mut StatusVector, tx: &mut u32) -> isize;

    fn rollback_retaining(&mut self, status: &mut StatusVector, tx: &mut u32) -> isize;

    fn prepare_transaction2(&mut self, status: &mut StatusVector, tx: &mut u32, message: &[u8]) -> isize;

    fn dsql_allocate_statement(&mut self, status: &mut StatusVector, db: &mut u32, stmt: &mut u32) -> isize;

    /// Prepare without describing, descriptions are requested through
    /// [`dsql_sql_info`][FbClient::dsql_sql_info].
    fn dsql_prepare(&mut self, status: &mut StatusVector, tx: &mut u32, stmt: &mut u32, sql: &[u8], dialect: u16) -> isize;

    fn dsql_sql_info(&mut self, status: &mut StatusVector, stmt: &mut u32, items: &[u8], buffer: &mut [u8]) -> isize;

    fn dsql_execute2(
        &mut self,
        status: &mut StatusVector,
        tx: &mut u32,
        stmt: &mut u32,
        dialect: u16,
        input: Option<&Xsqlda>,
        output: Option<&mut Xsqlda>,
    ) -> isize;

    /// Returns [`FETCH_EOF`] after the last row.
    fn dsql_fetch(&mut self, status: &mut StatusVector, stmt: &mut u32, dialect: u16, output: &mut Xsqlda) -> isize;

    fn dsql_free_statement(&mut self, status: &mut StatusVector, stmt: &mut u32, option: u16) -> isize;

    fn create_blob2(
        &mut self,
        status: &mut StatusVector,
        db: &mut u32,
        tx: &mut u32,
        blob: &mut u32,
        id: &mut u64,
        bpb: &[u8],
    ) -> isize;

    fn open_blob2(
        &mut self,
        status: &mut StatusVector,
        db: &mut u32,
        tx: &mut u32,
        blob: &mut u32,
        id: &u64,
        bpb: &[u8],
    ) -> isize;

    /// Reports [`SEGMENT`] for a partial and [`SEGSTR_EOF`] after the last
    /// segment.
    fn get_segment(&mut self, status: &mut StatusVector, blob: &mut u32, actual: &mut u16, buffer: &mut [u8]) -> isize;

    fn put_segment(&mut self, status: &mut StatusVector, blob: &mut u32, data: &[u8]) -> isize;

    fn close_blob(&mut self, status: &mut StatusVector, blob: &mut u32) -> isize;

    fn cancel_blob(&mut self, status: &mut StatusVector, blob: &mut u32) -> isize;

    /// `isc_get_slice`, `returned` is the byte count written into `slice`.
    fn get_slice(
        &mut self,
        status: &mut StatusVector,
        db: &mut u32,
        tx: &mut u32,
        id: &u64,
        sdl: &[u8],
        slice: &mut [u8],
        returned: &mut i32,
    ) -> isize;

    /// `isc_put_slice`, `id` receives the new array id.
    fn put_slice(
        &mut self,
        status: &mut StatusVector,
        db: &mut u32,
        tx: &mut u32,
        id: &mut u64,
        sdl: &[u8],
        slice: &[u8],
    ) -> isize;
}

/// `fb_cancel_operation` of the client library.
///
/// The library allows it while another call on the same attachment runs.
pub trait FbCancel: Send + Sync {
    fn resolver(&self) -> &dyn StringResolver {
        &RawPointers
    }

    fn cancel_operation(&self, status: &mut StatusVector, db: u32, option: u16) -> isize;
}

/// Check status vector of a client library call.
fn check_status(status: &StatusVector, ret: isize, strings: &dyn StringResolver) -> Result<Option<DatabaseError>> {
    match parse_native(status, strings) {
        Status::Ok if ret == 0 => Ok(None),
        Status::Ok => Err(DatabaseError::from_codes(&[ret as i32]).into()),
        Status::Warning(warning) => Ok(Some(warning)),
        Status::Error(err) => Err(err.into()),
    }
}

struct NativeCanceller {
    cancel: Box<dyn FbCancel>,
    db: u32,
}

impl Canceller for NativeCanceller {
    fn cancel(&self, kind: u16) -> Result<Vec<DatabaseError>> {
        let mut status = [0; STATUS_LENGTH];
        let ret = self.cancel.cancel_operation(&mut status, self.db, kind);
        Ok(check_status(&status, ret, self.cancel.resolver())?.into_iter().collect())
    }
}

/// Attachment through the client library.
pub(crate) struct NativeTransport {
    client: Box<dyn FbClient>,
    db: u32,
    dialect: u16,
    status: StatusVector,
    warnings: Vec<DatabaseError>,
}

/// Call client method with a cleared status vector, then check the status.
macro_rules! call {
    ($me:ident.$method:ident($($arg:expr),* $(,)?)) => {{
        $me.status = [0; STATUS_LENGTH];
        let ret = $me.client.$method(&mut $me.status, $($arg),*);
        $me.check(ret)
    }};
}

impl NativeTransport {
    pub(crate) fn attach(client: Box<dyn FbClient>, config: &Config, create: bool) -> Result<Self> {
        span!("attach_native", database = %config.database, create);
        let mut me = Self {
            client,
            db: 0,
            dialect: config.dialect,
            status: [0; STATUS_LENGTH],
            warnings: vec![],
        };

        let path = match config.host.is_empty() {
            true => config.database.clone(),
            false => format!("{}/{}:{}", config.host, config.port, config.database),
        };
        let dpb = config.to_dpb()?;
        let mut db = 0;
        match create {
            true => call!(me.create_database(path.as_bytes(), &mut db, dpb.as_bytes()))?,
            false => call!(me.attach_database(path.as_bytes(), &mut db, dpb.as_bytes()))?,
        }
        me.db = db;
        verbose!(handle = db, "attached");
        Ok(me)
    }

    /// Parse the status vector of the last call.
    fn check(&mut self, ret: isize) -> Result<()> {
        let warning = check_status(&self.status, ret, self.client.resolver())?;
        self.warnings.extend(warning);
        Ok(())
    }

    fn info(&mut self, buffer_len: usize, f: impl FnOnce(&mut Self, &mut [u8]) -> Result<()>) -> Result<Bytes> {
        let mut buffer = vec![0; buffer_len];
        f(self, &mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}

impl fmt::Debug for NativeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeTransport").field("db", &self.db).finish_non_exhaustive()
    }
}

impl Transport for NativeTransport {
    fn backend(&self) -> &'static str {
        "native"
    }

    fn detach(&mut self) -> Result<()> {
        let mut db = self.db;
        call!(self.detach_database(&mut db))?;
        self.db = db;
        Ok(())
    }

    fn drop_database(&mut self) -> Result<()> {
        let mut db = self.db;
        call!(self.drop_database(&mut db))?;
        self.db = db;
        Ok(())
    }

    fn database_info(&mut self, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        let mut db = self.db;
        self.info(buffer_len, |me, buffer| call!(me.database_info(&mut db, items, buffer)))
    }

    fn canceller(&self) -> Option<Box<dyn Canceller>> {
        Some(Box::new(NativeCanceller { cancel: self.client.canceller(), db: self.db }))
    }

    fn begin_transaction(&mut self, tpb: &[u8]) -> Result<TransactionHandle> {
        let (mut tx, mut db) = (0, self.db);
        call!(self.start_transaction(&mut tx, &mut db, tpb))?;
        Ok(TransactionHandle(tx))
    }

    fn commit(&mut self, tx: TransactionHandle) -> Result<()> {
        let mut tx = tx.0;
        call!(self.commit_transaction(&mut tx))
    }

    fn rollback(&mut self, tx: TransactionHandle) -> Result<()> {
        let mut tx = tx.0;
        call!(self.rollback_transaction(&mut tx))
    }

    fn commit_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        let mut tx = tx.0;
        call!(self.commit_retaining(&mut tx))?;
        Ok(TransactionHandle(tx))
    }

    fn rollback_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        let mut tx = tx.0;
        call!(self.rollback_retaining(&mut tx))?;
        Ok(TransactionHandle(tx))
    }

    fn prepare_transaction(&mut self, tx: TransactionHandle, message: &[u8]) -> Result<()> {
        let mut tx = tx.0;
        call!(self.prepare_transaction2(&mut tx, message))
    }

    fn allocate_statement(&mut self) -> Result<StatementHandle> {
        let (mut db, mut stmt) = (self.db, 0);
        call!(self.dsql_allocate_statement(&mut db, &mut stmt))?;
        Ok(StatementHandle(stmt))
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
        let (mut tx, mut handle) = (tx.0, stmt.0);
        call!(self.dsql_prepare(&mut tx, &mut handle, sql, dialect))?;
        self.statement_info(stmt, items, buffer_len)
    }

    fn statement_info(&mut self, stmt: StatementHandle, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        let mut stmt = stmt.0;
        self.info(buffer_len, |me, buffer| call!(me.dsql_sql_info(&mut stmt, items, buffer)))
    }

    fn execute(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        inputs: &[FieldDescriptor],
        params: &[Option<Bytes>],
        outputs: Option<&[FieldDescriptor]>,
    ) -> Result<Option<RawRow>> {
        let (mut tx, mut stmt) = (tx.0, stmt.0);
        let dialect = self.dialect;

        let mut input = Xsqlda::describe(inputs);
        input.bind(params);
        let input = (!inputs.is_empty()).then_some(&input);
        let mut output = outputs.map(Xsqlda::describe);

        call!(self.dsql_execute2(&mut tx, &mut stmt, dialect, input, output.as_mut()))?;
        Ok(output.map(|output| output.row()))
    }

    fn fetch(&mut self, stmt: StatementHandle, outputs: &[FieldDescriptor], count: usize) -> Result<Fetched> {
        let mut stmt = stmt.0;
        let dialect = self.dialect;
        let mut output = Xsqlda::describe(outputs);
        let mut fetched = Fetched::default();

        while fetched.rows.len() < count {
            self.status = [0; STATUS_LENGTH];
            let ret = self.client.dsql_fetch(&mut self.status, &mut stmt, dialect, &mut output);
            if ret == FETCH_EOF {
                fetched.eof = true;
                break;
            }
            self.check(ret)?;
            fetched.rows.push(output.row());
        }
        Ok(fetched)
    }

    fn free_statement(&mut self, stmt: StatementHandle, option: u16) -> Result<()> {
        let mut stmt = stmt.0;
        call!(self.dsql_free_statement(&mut stmt, option))
    }

    fn create_blob(&mut self, tx: TransactionHandle) -> Result<(BlobHandle, BlobId)> {
        let (mut db, mut tx, mut blob, mut id) = (self.db, tx.0, 0, 0);
        call!(self.create_blob2(&mut db, &mut tx, &mut blob, &mut id, &[BPB_VERSION1]))?;
        Ok((BlobHandle(blob), BlobId::new(id)))
    }

    fn open_blob(&mut self, tx: TransactionHandle, id: BlobId) -> Result<BlobHandle> {
        let (mut db, mut tx, mut blob) = (self.db, tx.0, 0);
        call!(self.open_blob2(&mut db, &mut tx, &mut blob, &id.raw(), &[BPB_VERSION1]))?;
        Ok(BlobHandle(blob))
    }

    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> Result<(Bytes, SegmentStatus)> {
        let mut blob = blob.0;
        let mut buffer = vec![0; max.min(u16::MAX as usize)];
        let mut actual = 0;

        self.status = [0; STATUS_LENGTH];
        let ret = self.client.get_segment(&mut self.status, &mut blob, &mut actual, &mut buffer);
        buffer.truncate(actual as usize);

        let status = match self.status[1] as i32 {
            SEGSTR_EOF => SegmentStatus::Eof,
            SEGMENT => SegmentStatus::Partial,
            _ => {
                self.check(ret)?;
                SegmentStatus::Complete
            },
        };
        Ok((Bytes::from(buffer), status))
    }

    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> Result<()> {
        let mut blob = blob.0;
        call!(self.put_segment(&mut blob, data))
    }

    fn close_blob(&mut self, blob: BlobHandle) -> Result<()> {
        let mut blob = blob.0;
        call!(self.close_blob(&mut blob))
    }

    fn cancel_blob(&mut self, blob: BlobHandle) -> Result<()> {
        let mut blob = blob.0;
        call!(self.cancel_blob(&mut blob))
    }

    fn get_slice(
        &mut self,
        tx: TransactionHandle,
        id: ArrayId,
        desc: &ArrayDescriptor,
        slice_length: usize,
    ) -> Result<Bytes> {
        let sdl = blr::sdl(desc)?;
        let (mut db, mut tx) = (self.db, tx.0);
        let mut slice = BytesMut::zeroed(slice_length);
        let mut returned = 0;
        call!(self.get_slice(&mut db, &mut tx, &id.raw(), &sdl, &mut slice, &mut returned))?;
        verbose!(returned, "slice");
        slice.truncate(usize::try_from(returned).unwrap_or(0));
        Ok(slice.freeze())
    }

    fn put_slice(&mut self, tx: TransactionHandle, id: ArrayId, desc: &ArrayDescriptor, slice: &[u8]) -> Result<ArrayId> {
        let sdl = blr::sdl(desc)?;
        let (mut db, mut tx, mut id) = (self.db, tx.0, id.raw());
        call!(self.put_slice(&mut db, &mut tx, &mut id, &sdl, slice))?;
        Ok(ArrayId::new(id))
    }

    fn take_warnings(&mut self) -> Vec<DatabaseError> {
        std::mem::take(&mut self.warnings)
    }
}
