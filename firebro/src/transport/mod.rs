//! Transport backends.
//!
//! Every engine call of an [`Attachment`][crate::Attachment] goes through the
//! [`Transport`] interface. Rows cross the interface in the native little
//! endian layout of [`codec`][crate::types::codec], one `Option<Bytes>` per
//! field where [`None`] is NULL.
use bytes::Bytes;

use crate::{
    Result,
    array::ArrayDescriptor,
    gds::DatabaseError,
    types::{ArrayId, BlobId, FieldDescriptor},
};

pub mod wire;
pub mod native;
#[cfg(test)]
pub(crate) mod mock;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub(crate) struct $name(pub(crate) u32);
    };
}

handle!(/// Server side transaction handle.
    TransactionHandle);
handle!(/// Server side statement handle.
    StatementHandle);
handle!(/// Server side blob handle.
    BlobHandle);

/// Row in transport layout.
pub(crate) type RawRow = Vec<Option<Bytes>>;

/// Result of one fetch round trip.
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    pub(crate) rows: Vec<RawRow>,
    /// Cursor is exhausted.
    pub(crate) eof: bool,
}

/// Outcome of a `get_segment` call, beside the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SegmentStatus {
    /// Whole segment returned.
    Complete,
    /// Segment did not fit, the rest follows on the next call.
    Partial,
    /// No more segments.
    Eof,
}

/// Cancellation of the running request of one attachment.
///
/// Called without the attachment lock, concurrently with other calls.
pub(crate) trait Canceller: Send + Sync {
    /// Returns the warnings of the cancel call.
    fn cancel(&self, kind: u16) -> Result<Vec<DatabaseError>>;
}

/// Engine calls of one attachment.
///
/// Implementations report engine failures as [`DatabaseError`] and collect
/// warnings for [`take_warnings`][Transport::take_warnings].
pub(crate) trait Transport {
    /// Backend name used in [`Unsupported`][crate::error::Unsupported] errors.
    fn backend(&self) -> &'static str;

    fn detach(&mut self) -> Result<()>;

    fn drop_database(&mut self) -> Result<()>;

    fn database_info(&mut self, items: &[u8], buffer_len: usize) -> Result<Bytes>;

    /// Handle to cancel requests while another call holds the attachment.
    ///
    /// [`None`] when the backend can not cancel.
    fn canceller(&self) -> Option<Box<dyn Canceller>>;

    // ===== Transaction =====

    fn begin_transaction(&mut self, tpb: &[u8]) -> Result<TransactionHandle>;

    fn commit(&mut self, tx: TransactionHandle) -> Result<()>;

    fn rollback(&mut self, tx: TransactionHandle) -> Result<()>;

    /// Returns the handle to continue with, which may differ.
    fn commit_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle>;

    /// Returns the handle to continue with, which may differ.
    fn rollback_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle>;

    fn prepare_transaction(&mut self, tx: TransactionHandle, message: &[u8]) -> Result<()>;

    // ===== Statement =====

    fn allocate_statement(&mut self) -> Result<StatementHandle>;

    /// Prepare `sql` and return the info block requested by `items`.
    fn prepare_statement(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        sql: &[u8],
        dialect: u16,
        items: &[u8],
        buffer_len: usize,
    ) -> Result<Bytes>;

    fn statement_info(&mut self, stmt: StatementHandle, items: &[u8], buffer_len: usize) -> Result<Bytes>;

    /// Execute with `params` described by `inputs`.
    ///
    /// When `outputs` is given, the singleton output row is returned.
    fn execute(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        inputs: &[FieldDescriptor],
        params: &[Option<Bytes>],
        outputs: Option<&[FieldDescriptor]>,
    ) -> Result<Option<RawRow>>;

    /// Fetch up to `count` rows of an open cursor.
    fn fetch(&mut self, stmt: StatementHandle, outputs: &[FieldDescriptor], count: usize) -> Result<Fetched>;

    fn free_statement(&mut self, stmt: StatementHandle, option: u16) -> Result<()>;

    // ===== Blob =====

    fn create_blob(&mut self, tx: TransactionHandle) -> Result<(BlobHandle, BlobId)>;

    fn open_blob(&mut self, tx: TransactionHandle, id: BlobId) -> Result<BlobHandle>;

    /// Read at most `max` bytes of segment data.
    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> Result<(Bytes, SegmentStatus)>;

    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> Result<()>;

    fn close_blob(&mut self, blob: BlobHandle) -> Result<()>;

    fn cancel_blob(&mut self, blob: BlobHandle) -> Result<()>;

    // ===== Array =====

    /// Read whole array in the native slice layout.
    fn get_slice(
        &mut self,
        tx: TransactionHandle,
        id: ArrayId,
        desc: &ArrayDescriptor,
        slice_length: usize,
    ) -> Result<Bytes>;

    /// Write whole array from the native slice layout, returns the new id.
    fn put_slice(
        &mut self,
        tx: TransactionHandle,
        id: ArrayId,
        desc: &ArrayDescriptor,
        slice: &[u8],
    ) -> Result<ArrayId>;

    /// Drain warnings collected since the last call.
    fn take_warnings(&mut self) -> Vec<DatabaseError>;
}

/// Closed set of transport backends.
pub(crate) enum Backend {
    Wire(wire::WireTransport),
    Native(native::NativeTransport),
    #[cfg(test)]
    Mock(mock::MockTransport),
}

impl Backend {
    pub(crate) fn transport(&mut self) -> &mut dyn Transport {
        match self {
            Self::Wire(wire) => wire,
            Self::Native(native) => native,
            #[cfg(test)]
            Self::Mock(mock) => mock,
        }
    }
}
