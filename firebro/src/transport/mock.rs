//! In-memory engine for unit tests.
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};

use super::{Backend, BlobHandle, Canceller, Fetched, RawRow, SegmentStatus, StatementHandle, TransactionHandle, Transport};
use crate::{
    Attachment, Config, Result,
    array::ArrayDescriptor,
    gds::{DatabaseError, codes::*},
    types::{ArrayId, BlobId, FieldDescriptor, Value, codec},
};

pub(crate) const SERVER_VERSION: &str = "WI-V3.0.10.33601 Firebird 3.0";

pub(crate) const PLAN: &str = "PLAN (POST NATURAL)";

/// Attachment backed by a fresh [`MockTransport`].
pub(crate) fn attachment() -> Attachment {
    Attachment::from_backend(Backend::Mock(MockTransport::default()), &Config::default())
}

/// Access the mock engine of `attachment`.
pub(crate) fn with<R>(attachment: &Attachment, f: impl FnOnce(&mut MockTransport) -> R) -> R {
    match &mut *attachment.backend() {
        Backend::Mock(mock) => f(mock),
        _ => panic!("attachment is not backed by mock"),
    }
}

/// Canned response of statements matching a sql fragment.
#[derive(Clone, Debug)]
pub(crate) struct Script {
    kind: i32,
    inputs: Vec<FieldDescriptor>,
    outputs: Vec<FieldDescriptor>,
    rows: Vec<Vec<Value>>,
    affected: [i32; 3],
    params: Option<Vec<Value>>,
}

impl Script {
    pub(crate) fn new(kind: i32) -> Self {
        Self { kind, inputs: vec![], outputs: vec![], rows: vec![], affected: [0; 3], params: None }
    }

    pub(crate) fn inputs(mut self, inputs: Vec<FieldDescriptor>) -> Self {
        self.inputs = inputs;
        self
    }

    pub(crate) fn outputs(mut self, outputs: Vec<FieldDescriptor>) -> Self {
        self.outputs = outputs;
        self
    }

    pub(crate) fn rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows = rows;
        self
    }

    pub(crate) fn affected(mut self, insert: i32, update: i32, delete: i32) -> Self {
        self.affected = [insert, update, delete];
        self
    }

    /// Produce rows only when executed with `params`.
    pub(crate) fn params(mut self, params: Vec<Value>) -> Self {
        self.params = Some(params);
        self
    }
}

#[derive(Default)]
struct MockStatement {
    script: Option<Script>,
    cursor: VecDeque<RawRow>,
}

struct OpenBlob {
    id: u64,
    data: Vec<u8>,
    position: usize,
    create: bool,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    calls: HashMap<&'static str, usize>,
    failing: Vec<&'static str>,
    pending_warning: Option<DatabaseError>,
    warnings: Vec<DatabaseError>,
    last_handle: u32,
    last_id: u64,
    transactions: Vec<u32>,
    scripts: Vec<(String, Script)>,
    statements: HashMap<u32, MockStatement>,
    blobs: HashMap<u64, Vec<u8>>,
    open_blobs: HashMap<u32, OpenBlob>,
    arrays: HashMap<u64, Bytes>,
    truncate_below: usize,
    freed: HashMap<u16, usize>,
    last_params: Vec<Option<Bytes>>,
}

impl MockTransport {
    /// Number of calls of the named transport operation.
    pub(crate) fn calls(&self, name: &str) -> usize {
        self.calls.get(name).copied().unwrap_or(0)
    }

    /// Make the next call of the named operation fail.
    pub(crate) fn fail_next(&mut self, name: &'static str) {
        self.failing.push(name);
    }

    /// Report `warning` with the next call.
    pub(crate) fn warn_next(&mut self, warning: DatabaseError) {
        self.pending_warning = Some(warning);
    }

    /// Respond to statements containing `fragment` with `script`.
    pub(crate) fn script(&mut self, fragment: &str, script: Script) {
        self.scripts.push((fragment.into(), script));
    }

    /// Answer describe requests with buffers below `len` as truncated.
    pub(crate) fn truncate_below(&mut self, len: usize) {
        self.truncate_below = len;
    }

    /// Number of `free_statement` calls with `option`.
    pub(crate) fn freed(&self, option: u16) -> usize {
        self.freed.get(&option).copied().unwrap_or(0)
    }

    /// Parameters of the last execute.
    pub(crate) fn last_params(&self) -> Vec<Option<Bytes>> {
        self.last_params.clone()
    }

    /// Script the system table queries describing an array field.
    pub(crate) fn array_field(
        &mut self,
        relation: &str,
        field: &str,
        blr_type: u8,
        length: u16,
        source: &str,
        bounds: &[(i32, i32)],
    ) {
        let name = |n: &str| FieldDescriptor::new(SQL_VARYING, 31).with_name(n);
        let short = |n: &str| FieldDescriptor::new(SQL_SHORT, 2).with_name(n);
        let int = |n: &str| FieldDescriptor::new(SQL_LONG, 4).with_name(n);

        let lookup = Script::new(STMT_SELECT)
            .inputs(vec![name("RDB$RELATION_NAME"), name("RDB$FIELD_NAME")])
            .outputs(vec![
                short("RDB$FIELD_TYPE"),
                short("RDB$FIELD_SCALE"),
                short("RDB$FIELD_LENGTH"),
                short("RDB$DIMENSIONS"),
                FieldDescriptor::new(SQL_TEXT, 31).with_name("RDB$FIELD_SOURCE"),
                FieldDescriptor::new(SQL_SHORT + 1, 2).with_name("RDB$CHARACTER_SET_ID"),
            ])
            .rows(vec![vec![
                Value::SmallInt(blr_type as i16),
                Value::SmallInt(0),
                Value::SmallInt(length as i16),
                Value::SmallInt(bounds.len() as i16),
                Value::from(source),
                Value::Null,
            ]])
            .params(vec![Value::from(relation), Value::from(field)]);
        let dimensions = Script::new(STMT_SELECT)
            .inputs(vec![name("RDB$FIELD_NAME")])
            .outputs(vec![int("RDB$LOWER_BOUND"), int("RDB$UPPER_BOUND")])
            .rows(bounds.iter().map(|&(l, u)| vec![Value::Integer(l), Value::Integer(u)]).collect())
            .params(vec![Value::from(source)]);

        self.script("RDB$RELATION_FIELDS", lookup);
        self.script("RDB$FIELD_DIMENSIONS", dimensions);
    }

    fn enter(&mut self, name: &'static str) -> Result<()> {
        *self.calls.entry(name).or_default() += 1;
        if let Some(warning) = self.pending_warning.take() {
            self.warnings.push(warning);
        }
        match self.failing.iter().position(|n| *n == name) {
            Some(idx) => {
                self.failing.remove(idx);
                Err(DatabaseError::from_codes(&[IO_ERROR]).into())
            },
            None => Ok(()),
        }
    }

    fn next_handle(&mut self) -> u32 {
        self.last_handle += 1;
        self.last_handle
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id << 32 | 0x81
    }

    fn transaction(&self, tx: TransactionHandle) -> Result<()> {
        match self.transactions.contains(&tx.0) {
            true => Ok(()),
            false => Err(DatabaseError::from_codes(&[BAD_TRANS_HANDLE]).into()),
        }
    }

    fn end_transaction(&mut self, tx: TransactionHandle) -> Result<()> {
        self.transaction(tx)?;
        self.transactions.retain(|t| *t != tx.0);
        Ok(())
    }

    fn statement(&mut self, stmt: StatementHandle) -> Result<&mut MockStatement> {
        self.statements
            .get_mut(&stmt.0)
            .ok_or_else(|| DatabaseError::from_codes(&[BAD_REQ_HANDLE]).into())
    }

    fn open_blob_mut(&mut self, blob: BlobHandle) -> Result<&mut OpenBlob> {
        self.open_blobs
            .get_mut(&blob.0)
            .ok_or_else(|| DatabaseError::from_codes(&[BAD_SEGSTR_HANDLE]).into())
    }

    fn describe(&self, script: &Script, items: &[u8], buffer_len: usize) -> Bytes {
        let select = items.contains(&INFO_SQL_SELECT);
        let bind = items.contains(&INFO_SQL_BIND);
        if (select || bind) && buffer_len < self.truncate_below {
            return Bytes::from_static(&[INFO_TRUNCATED, INFO_END]);
        }
        describe_block(
            items.contains(&INFO_SQL_STMT_TYPE).then_some(script.kind),
            select.then_some(&script.outputs[..]),
            bind.then_some(&script.inputs[..]),
        )
    }
}

/// Complete describe response.
pub(crate) fn describe_info(kind: i32, select: &[FieldDescriptor], bind: &[FieldDescriptor]) -> Bytes {
    describe_block(Some(kind), Some(select), Some(bind))
}

fn describe_block(kind: Option<i32>, select: Option<&[FieldDescriptor]>, bind: Option<&[FieldDescriptor]>) -> Bytes {
    let mut buf = BytesMut::new();
    if let Some(kind) = kind {
        put_int(&mut buf, INFO_SQL_STMT_TYPE, kind);
    }
    for (section, vars) in [(INFO_SQL_SELECT, select), (INFO_SQL_BIND, bind)] {
        let Some(vars) = vars else {
            continue;
        };
        buf.put_u8(section);
        put_int(&mut buf, INFO_SQL_DESCRIBE_VARS, vars.len() as i32);
        for (i, var) in vars.iter().enumerate() {
            let sub_type = match var.is_character() {
                true => var.charset().id() as i16,
                false => var.sub_type(),
            };
            put_int(&mut buf, INFO_SQL_SQLDA_SEQ, i as i32 + 1);
            put_int(&mut buf, INFO_SQL_TYPE, (var.sql_type() | var.nullable() as i16) as i32);
            put_int(&mut buf, INFO_SQL_SUB_TYPE, sub_type as i32);
            put_int(&mut buf, INFO_SQL_SCALE, var.scale() as i32);
            put_int(&mut buf, INFO_SQL_LENGTH, var.length() as i32);
            put_item(&mut buf, INFO_SQL_FIELD, var.name().as_bytes());
            put_item(&mut buf, INFO_SQL_RELATION, var.relation().as_bytes());
            put_item(&mut buf, INFO_SQL_OWNER, var.owner().as_bytes());
            put_item(&mut buf, INFO_SQL_ALIAS, var.alias().as_bytes());
            buf.put_u8(INFO_SQL_DESCRIBE_END);
        }
    }
    buf.put_u8(INFO_END);
    buf.freeze()
}

fn put_item(buf: &mut BytesMut, item: u8, data: &[u8]) {
    buf.put_u8(item);
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
}

fn put_int(buf: &mut BytesMut, item: u8, value: i32) {
    put_item(buf, item, &value.to_le_bytes());
}

fn encode_row(fields: &[FieldDescriptor], values: &[Value]) -> Result<RawRow> {
    fields.iter().zip(values).map(|(field, value)| codec::encode_value(field, value)).collect()
}

impl Transport for MockTransport {
    fn backend(&self) -> &'static str {
        "mock"
    }

    fn detach(&mut self) -> Result<()> {
        self.enter("detach")
    }

    fn drop_database(&mut self) -> Result<()> {
        self.enter("drop_database")
    }

    fn database_info(&mut self, items: &[u8], _: usize) -> Result<Bytes> {
        self.enter("database_info")?;
        let mut buf = BytesMut::new();
        if items.contains(&INFO_ISC_VERSION) {
            let mut version = vec![1, SERVER_VERSION.len() as u8];
            version.extend_from_slice(SERVER_VERSION.as_bytes());
            put_item(&mut buf, INFO_ISC_VERSION, &version);
        }
        buf.put_u8(INFO_END);
        Ok(buf.freeze())
    }

    fn canceller(&self) -> Option<Box<dyn Canceller>> {
        None
    }

    fn begin_transaction(&mut self, _: &[u8]) -> Result<TransactionHandle> {
        self.enter("begin_transaction")?;
        let handle = self.next_handle();
        self.transactions.push(handle);
        Ok(TransactionHandle(handle))
    }

    fn commit(&mut self, tx: TransactionHandle) -> Result<()> {
        self.enter("commit")?;
        self.end_transaction(tx)
    }

    fn rollback(&mut self, tx: TransactionHandle) -> Result<()> {
        self.enter("rollback")?;
        self.end_transaction(tx)
    }

    fn commit_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        self.enter("commit_retaining")?;
        self.transaction(tx)?;
        Ok(tx)
    }

    fn rollback_retaining(&mut self, tx: TransactionHandle) -> Result<TransactionHandle> {
        self.enter("rollback_retaining")?;
        self.transaction(tx)?;
        Ok(tx)
    }

    fn prepare_transaction(&mut self, tx: TransactionHandle, _: &[u8]) -> Result<()> {
        self.enter("prepare_transaction")?;
        self.transaction(tx)
    }

    fn allocate_statement(&mut self) -> Result<StatementHandle> {
        self.enter("allocate_statement")?;
        let handle = self.next_handle();
        self.statements.insert(handle, MockStatement::default());
        Ok(StatementHandle(handle))
    }

    fn prepare_statement(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        sql: &[u8],
        _: u16,
        items: &[u8],
        buffer_len: usize,
    ) -> Result<Bytes> {
        self.enter("prepare_statement")?;
        self.transaction(tx)?;
        let sql = String::from_utf8_lossy(sql);
        let Some((_, script)) = self.scripts.iter().find(|(fragment, _)| sql.contains(fragment.as_str())) else {
            return Err(DatabaseError::from_codes(&[DSQL_ERROR, DSQL_TOKEN_UNK_ERR]).into());
        };
        let script = script.clone();
        let info = self.describe(&script, items, buffer_len);
        let statement = self.statement(stmt)?;
        statement.script = Some(script);
        statement.cursor.clear();
        Ok(info)
    }

    fn statement_info(&mut self, stmt: StatementHandle, items: &[u8], buffer_len: usize) -> Result<Bytes> {
        self.enter("statement_info")?;
        let script = self.statement(stmt)?.script.clone().ok_or_else(|| DatabaseError::from_codes(&[BAD_REQ_HANDLE]))?;

        match items.first() {
            Some(&INFO_SQL_RECORDS) => {
                let mut counts = BytesMut::new();
                put_int(&mut counts, INFO_REQ_SELECT_COUNT, 0);
                put_int(&mut counts, INFO_REQ_INSERT_COUNT, script.affected[0]);
                put_int(&mut counts, INFO_REQ_UPDATE_COUNT, script.affected[1]);
                put_int(&mut counts, INFO_REQ_DELETE_COUNT, script.affected[2]);
                let mut buf = BytesMut::new();
                put_item(&mut buf, INFO_SQL_RECORDS, &counts);
                buf.put_u8(INFO_END);
                Ok(buf.freeze())
            },
            Some(&INFO_SQL_GET_PLAN) => {
                let mut buf = BytesMut::new();
                put_item(&mut buf, INFO_SQL_GET_PLAN, format!("\n{PLAN}").as_bytes());
                buf.put_u8(INFO_END);
                Ok(buf.freeze())
            },
            _ => Ok(self.describe(&script, items, buffer_len)),
        }
    }

    fn execute(
        &mut self,
        tx: TransactionHandle,
        stmt: StatementHandle,
        inputs: &[FieldDescriptor],
        params: &[Option<Bytes>],
        outputs: Option<&[FieldDescriptor]>,
    ) -> Result<Option<RawRow>> {
        self.enter("execute")?;
        self.transaction(tx)?;
        if inputs.len() != params.len() {
            return Err(DatabaseError::from_codes(&[DSQL_ERROR, DSQL_SQLDA_ERR]).into());
        }
        self.last_params = params.to_vec();

        let statement = self.statement(stmt)?;
        let script = statement.script.clone().ok_or_else(|| DatabaseError::from_codes(&[BAD_REQ_HANDLE]))?;
        let mut rows = script
            .rows
            .iter()
            .map(|row| encode_row(&script.outputs, row))
            .collect::<Result<VecDeque<_>>>()?;

        if let Some(expected) = &script.params {
            let actual = inputs
                .iter()
                .zip(params)
                .map(|(field, param)| match param {
                    Some(data) => codec::decode(field, data),
                    None => Ok(Value::Null),
                })
                .collect::<Result<Vec<_>>>()?;
            if &actual != expected {
                rows.clear();
            }
        }

        match outputs {
            Some(_) => Ok(rows.into_iter().next()),
            None => {
                if matches!(script.kind, STMT_SELECT | STMT_SELECT_FOR_UPD) {
                    statement.cursor = rows;
                }
                Ok(None)
            },
        }
    }

    fn fetch(&mut self, stmt: StatementHandle, _: &[FieldDescriptor], count: usize) -> Result<Fetched> {
        self.enter("fetch")?;
        let statement = self.statement(stmt)?;
        let take = count.min(statement.cursor.len());
        let rows = statement.cursor.drain(..take).collect();
        Ok(Fetched { rows, eof: statement.cursor.is_empty() })
    }

    fn free_statement(&mut self, stmt: StatementHandle, option: u16) -> Result<()> {
        self.enter("free_statement")?;
        *self.freed.entry(option).or_default() += 1;
        match option {
            DSQL_DROP => {
                self.statements.remove(&stmt.0);
            },
            _ => self.statement(stmt)?.cursor.clear(),
        }
        Ok(())
    }

    fn create_blob(&mut self, tx: TransactionHandle) -> Result<(BlobHandle, BlobId)> {
        self.enter("create_blob")?;
        self.transaction(tx)?;
        let id = self.next_id();
        let handle = self.next_handle();
        self.open_blobs.insert(handle, OpenBlob { id, data: vec![], position: 0, create: true });
        Ok((BlobHandle(handle), BlobId::new(id)))
    }

    fn open_blob(&mut self, tx: TransactionHandle, id: BlobId) -> Result<BlobHandle> {
        self.enter("open_blob")?;
        self.transaction(tx)?;
        let Some(data) = self.blobs.get(&id.raw()).cloned() else {
            return Err(DatabaseError::from_codes(&[BAD_SEGSTR_HANDLE]).into());
        };
        let handle = self.next_handle();
        self.open_blobs.insert(handle, OpenBlob { id: id.raw(), data, position: 0, create: false });
        Ok(BlobHandle(handle))
    }

    fn get_segment(&mut self, blob: BlobHandle, max: usize) -> Result<(Bytes, SegmentStatus)> {
        self.enter("get_segment")?;
        let open = self.open_blob_mut(blob)?;
        let end = (open.position + max).min(open.data.len());
        let segment = Bytes::copy_from_slice(&open.data[open.position..end]);
        open.position = end;
        let status = match open.position == open.data.len() {
            true => SegmentStatus::Eof,
            false => SegmentStatus::Complete,
        };
        Ok((segment, status))
    }

    fn put_segment(&mut self, blob: BlobHandle, data: &[u8]) -> Result<()> {
        self.enter("put_segment")?;
        self.open_blob_mut(blob)?.data.extend_from_slice(data);
        Ok(())
    }

    fn close_blob(&mut self, blob: BlobHandle) -> Result<()> {
        self.enter("close_blob")?;
        self.open_blob_mut(blob)?;
        if let Some(open) = self.open_blobs.remove(&blob.0) {
            if open.create {
                self.blobs.insert(open.id, open.data);
            }
        }
        Ok(())
    }

    fn cancel_blob(&mut self, blob: BlobHandle) -> Result<()> {
        self.enter("cancel_blob")?;
        self.open_blob_mut(blob)?;
        self.open_blobs.remove(&blob.0);
        Ok(())
    }

    fn get_slice(
        &mut self,
        tx: TransactionHandle,
        id: ArrayId,
        _: &ArrayDescriptor,
        slice_length: usize,
    ) -> Result<Bytes> {
        self.enter("get_slice")?;
        self.transaction(tx)?;
        match self.arrays.get(&id.raw()) {
            Some(slice) => Ok(slice.slice(..slice_length.min(slice.len()))),
            None => Err(DatabaseError::from_codes(&[BAD_SEGSTR_HANDLE]).into()),
        }
    }

    fn put_slice(&mut self, tx: TransactionHandle, _: ArrayId, _: &ArrayDescriptor, slice: &[u8]) -> Result<ArrayId> {
        self.enter("put_slice")?;
        self.transaction(tx)?;
        let id = self.next_id();
        self.arrays.insert(id, Bytes::copy_from_slice(slice));
        Ok(ArrayId::new(id))
    }

    fn take_warnings(&mut self) -> Vec<DatabaseError> {
        std::mem::take(&mut self.warnings)
    }
}
