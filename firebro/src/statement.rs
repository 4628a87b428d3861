//! The [`Statement`] type.
use bytes::Bytes;
use std::{
    borrow::Cow,
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    Attachment, Result, Transaction,
    array::{self, Array, ArrayDescriptor},
    blob::Blob,
    charset::Charset,
    common::{span, suppressed, verbose},
    error::StateError,
    gds::{DatabaseError, InfoCursor, InfoItem, InfoReader, ProtocolError, codes::*},
    row::Row,
    transport::{RawRow, StatementHandle},
    types::{ArrayId, BlobId, FieldDescriptor, Value, codec},
};

const DEFAULT_FETCH_SIZE: usize = 200;

/// Buffer doublings allowed when an info response is truncated.
const MAX_DOUBLING: usize = 4;

const PREPARE_ITEMS: &[u8] = &[
    INFO_SQL_STMT_TYPE,
    INFO_SQL_SELECT, INFO_SQL_DESCRIBE_VARS, INFO_SQL_SQLDA_SEQ,
    INFO_SQL_TYPE, INFO_SQL_SUB_TYPE, INFO_SQL_SCALE, INFO_SQL_LENGTH,
    INFO_SQL_FIELD, INFO_SQL_RELATION, INFO_SQL_OWNER, INFO_SQL_ALIAS,
    INFO_SQL_DESCRIBE_END,
    INFO_SQL_BIND, INFO_SQL_DESCRIBE_VARS, INFO_SQL_SQLDA_SEQ,
    INFO_SQL_TYPE, INFO_SQL_SUB_TYPE, INFO_SQL_SCALE, INFO_SQL_LENGTH,
    INFO_SQL_FIELD, INFO_SQL_RELATION, INFO_SQL_OWNER, INFO_SQL_ALIAS,
    INFO_SQL_DESCRIBE_END,
];

const DESCRIBE_SELECT: &[u8] = PREPARE_ITEMS.split_at(13).0.split_at(1).1;

const DESCRIBE_BIND: &[u8] = PREPARE_ITEMS.split_at(13).1;

/// Lifecycle of a [`Statement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementState {
    Deallocated,
    Allocated,
    Prepared,
    Executed,
    Closed,
    Error,
}

/// Statement kind reported by the engine on prepare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    None,
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    GetSegment,
    PutSegment,
    StoredProcedure,
    StartTrans,
    Commit,
    Rollback,
    SelectForUpdate,
    SetGenerator,
    SavePoint,
}

impl StatementKind {
    fn from_code(code: i64) -> Self {
        match code as i32 {
            STMT_SELECT => Self::Select,
            STMT_INSERT => Self::Insert,
            STMT_UPDATE => Self::Update,
            STMT_DELETE => Self::Delete,
            STMT_DDL => Self::Ddl,
            STMT_GET_SEGMENT => Self::GetSegment,
            STMT_PUT_SEGMENT => Self::PutSegment,
            STMT_EXEC_PROCEDURE => Self::StoredProcedure,
            STMT_START_TRANS => Self::StartTrans,
            STMT_COMMIT => Self::Commit,
            STMT_ROLLBACK => Self::Rollback,
            STMT_SELECT_FOR_UPD => Self::SelectForUpdate,
            STMT_SET_GENERATOR => Self::SetGenerator,
            STMT_SAVEPOINT => Self::SavePoint,
            _ => Self::None,
        }
    }

    /// Returns `true` if execution opens a cursor.
    pub fn has_cursor(&self) -> bool {
        matches!(self, Self::Select | Self::SelectForUpdate)
    }

    /// Returns `true` if execution reports affected rows.
    pub fn is_dml(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete | Self::StoredProcedure)
    }
}

/// A prepared SQL statement.
///
/// The statement is bound to the transaction it was prepared with. When the
/// transaction ends, the statement is closed and must be given a new one with
/// [`set_transaction`][Statement::set_transaction] before executing again.
///
/// # Example
///
/// ```no_run
/// # fn app(attachment: &firebro::Attachment) -> firebro::Result<()> {
/// let tx = attachment.begin_transaction(&Default::default())?;
/// let mut stmt = attachment.create_statement();
///
/// stmt.prepare(&tx, "SELECT ID, NAME FROM POST WHERE ID > ?")?;
/// stmt.execute(&[420.into()])?;
///
/// while let Some(row) = stmt.fetch()? {
///     let (id, name): (i32, String) = row.decode()?;
///     println!("{id}: {name}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Statement {
    attachment: Attachment,
    transaction: Option<Transaction>,
    ended: Arc<AtomicBool>,
    handle: Option<StatementHandle>,
    state: StatementState,
    kind: StatementKind,
    parameters: Arc<[FieldDescriptor]>,
    fields: Arc<[FieldDescriptor]>,
    fetch_size: usize,
    rows: VecDeque<Row>,
    all_fetched: bool,
    outputs: VecDeque<Row>,
    records_affected: i64,
    arrays: Vec<ArrayDescriptor>,
}

impl Statement {
    pub(crate) fn new(attachment: &Attachment) -> Self {
        Self {
            attachment: attachment.clone(),
            transaction: None,
            ended: Arc::new(AtomicBool::new(false)),
            handle: None,
            state: StatementState::Allocated,
            kind: StatementKind::None,
            parameters: Arc::new([]),
            fields: Arc::new([]),
            fetch_size: DEFAULT_FETCH_SIZE,
            rows: VecDeque::new(),
            all_fetched: true,
            outputs: VecDeque::new(),
            records_affected: -1,
            arrays: vec![],
        }
    }

    pub fn state(&self) -> StatementState {
        match self.state {
            StatementState::Prepared | StatementState::Executed | StatementState::Error
                if self.ended.load(Ordering::Acquire) => StatementState::Closed,
            state => state,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Descriptors of the output columns.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptors of the input parameters.
    pub fn parameters(&self) -> &[FieldDescriptor] {
        &self.parameters
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Rows requested per fetch round trip.
    pub fn set_fetch_size(&mut self, size: usize) {
        self.fetch_size = size.max(1);
    }

    /// Bind the statement to `transaction` for subsequent operations.
    pub fn set_transaction(&mut self, transaction: &Transaction) {
        if self.transaction.as_ref().is_some_and(|tx| tx.same(transaction)) {
            return;
        }
        if let Some(old) = self.transaction.take() {
            old.unsubscribe(&self.ended);
        }
        self.ended.store(false, Ordering::Release);
        transaction.subscribe(&self.ended);
        self.transaction = Some(transaction.clone());
    }

    /// Prepare `sql` and describe its parameters and output.
    pub fn prepare(&mut self, transaction: &Transaction, sql: &str) -> Result<()> {
        span!("prepare", sql);
        self.observe_transaction_end();
        self.set_transaction(transaction);
        self.rows.clear();
        self.outputs.clear();
        self.records_affected = -1;

        let result = self.prepare_inner(sql);
        self.track(result)
    }

    fn prepare_inner(&mut self, sql: &str) -> Result<()> {
        let tx = self.transaction()?.handle()?;
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = self.attachment.call(|t| t.allocate_statement())?;
                self.handle = Some(handle);
                self.state = StatementState::Allocated;
                handle
            },
        };

        let sql = self.attachment.charset().encode(sql)?;
        let dialect = self.attachment.dialect();
        let info = self.attachment.call(|t| {
            t.prepare_statement(tx, handle, &sql, dialect, PREPARE_ITEMS, PREPARE_INFO_BUFFER_SIZE)
        })?;

        let charset = self.attachment.charset();
        let describe = self.info_doubling(handle, PREPARE_ITEMS, PREPARE_INFO_BUFFER_SIZE, info, |info| {
            parse_describe(info, charset)
        })?;

        self.kind = describe.kind.map(StatementKind::from_code).unwrap_or(StatementKind::None);
        self.fields = describe.select.unwrap_or_default().into();
        self.parameters = describe.bind.unwrap_or_default().into();
        self.state = StatementState::Prepared;
        verbose!(kind = ?self.kind, fields = self.fields.len(), parameters = self.parameters.len(), "prepared");
        Ok(())
    }

    /// Describe output columns again.
    pub fn describe(&mut self) -> Result<&[FieldDescriptor]> {
        let fields = self.describe_items(DESCRIBE_SELECT)?.select.unwrap_or_default();
        self.fields = fields.into();
        Ok(&self.fields)
    }

    /// Describe input parameters again.
    pub fn describe_parameters(&mut self) -> Result<&[FieldDescriptor]> {
        let parameters = self.describe_items(DESCRIBE_BIND)?.bind.unwrap_or_default();
        self.parameters = parameters.into();
        Ok(&self.parameters)
    }

    fn describe_items(&mut self, items: &[u8]) -> Result<Describe> {
        self.observe_transaction_end();
        let handle = self.prepared()?;
        let charset = self.attachment.charset();
        let info = self
            .attachment
            .call(|t| t.statement_info(handle, items, PREPARE_INFO_BUFFER_SIZE))?;
        self.info_doubling(handle, items, PREPARE_INFO_BUFFER_SIZE, info, |info| parse_describe(info, charset))
    }

    /// Execute with `params`, one value for each described parameter.
    ///
    /// Text or bytes bound to a blob parameter are written into a new blob.
    pub fn execute(&mut self, params: &[Value]) -> Result<()> {
        span!("execute", kind = ?self.kind);
        self.observe_transaction_end();
        let handle = self.prepared()?;
        let result = self.execute_inner(handle, params);
        self.track(result)
    }

    fn execute_inner(&mut self, handle: StatementHandle, params: &[Value]) -> Result<()> {
        let transaction = self.transaction()?;
        let tx = transaction.handle()?;

        if params.len() != self.parameters.len() {
            let err = crate::Error::from(DatabaseError::from_codes(&[DSQL_ERROR, DSQL_SQLDA_ERR]));
            return Err(err.with_context(format!(
                "expected {} parameters, found {}",
                self.parameters.len(),
                params.len()
            )));
        }

        let inputs = self.parameters.clone();
        let charset = self.attachment.charset();
        let pending = inputs
            .iter()
            .zip(params)
            .map(|(field, value)| encode_param(charset, field, value))
            .collect::<Result<Vec<_>>>()?;

        // blobs are created only once every parameter is encodable
        let encoded = inputs
            .iter()
            .zip(pending)
            .map(|(field, param)| param.finish(&transaction, field))
            .collect::<Result<Vec<_>>>()?;

        if self.state == StatementState::Executed && self.kind.has_cursor() {
            self.free_cursor();
        }
        self.rows.clear();
        self.outputs.clear();

        let outputs = (self.kind == StatementKind::StoredProcedure).then_some(&*self.fields);
        let row = self
            .attachment
            .call(|t| t.execute(tx, handle, &inputs, &encoded, outputs))?;

        if let Some(row) = row {
            self.outputs.push_back(decode_row(&self.fields, row)?);
        }

        self.records_affected = match self.kind.is_dml() {
            true => self.query_records_affected(handle)?,
            false => -1,
        };
        self.all_fetched = !self.kind.has_cursor();
        self.state = StatementState::Executed;
        Ok(())
    }

    /// Next row of the result, [`None`] when exhausted.
    ///
    /// For stored procedures, returns the output parameters once.
    pub fn fetch(&mut self) -> Result<Option<Row>> {
        self.observe_transaction_end();
        if self.state != StatementState::Executed {
            return Err(StateError::new(format!("fetch on {:?} statement", self.state)).into());
        }

        match self.kind {
            StatementKind::StoredProcedure => return Ok(self.outputs.pop_front()),
            kind if !kind.has_cursor() => {
                return Err(StateError::new(format!("fetch on {kind:?} statement without cursor")).into());
            },
            _ => {},
        }

        if self.rows.is_empty() && !self.all_fetched {
            let result = self.fetch_batch();
            self.track(result)?;
        }

        Ok(self.rows.pop_front())
    }

    fn fetch_batch(&mut self) -> Result<()> {
        let handle = self.prepared()?;
        let fields = self.fields.clone();
        let count = self.fetch_size;
        let fetched = self.attachment.call(|t| t.fetch(handle, &fields, count))?;
        verbose!(rows = fetched.rows.len(), eof = fetched.eof, "fetched");

        for row in fetched.rows {
            self.rows.push_back(decode_row(&fields, row)?);
        }
        self.all_fetched = fetched.eof;
        Ok(())
    }

    /// Dequeue the output of an executed stored procedure.
    pub fn output_parameters(&mut self) -> Option<Row> {
        self.outputs.pop_front()
    }

    /// Inserted, updated and deleted row count of the last execution.
    ///
    /// Returns `-1` for statements that do not modify rows.
    pub fn records_affected(&self) -> i64 {
        self.records_affected
    }

    /// Query plan chosen by the engine.
    pub fn execution_plan(&mut self) -> Result<String> {
        self.observe_transaction_end();
        let handle = self.prepared()?;
        let items = [INFO_SQL_GET_PLAN];
        let info = self
            .attachment
            .call(|t| t.statement_info(handle, &items, DEFAULT_MAX_BUFFER_SIZE))?;
        let charset = self.attachment.charset();
        self.info_doubling(handle, &items, DEFAULT_MAX_BUFFER_SIZE, info, |info| parse_plan(info, charset))
    }

    /// Close the open cursor, errors are suppressed.
    pub fn close(&mut self) {
        self.observe_transaction_end();
        let closeable = matches!(
            self.kind,
            StatementKind::Select | StatementKind::SelectForUpdate | StatementKind::StoredProcedure
        );
        if matches!(self.state, StatementState::Executed | StatementState::Error) && closeable {
            self.free_cursor();
            self.rows.clear();
            self.outputs.clear();
            self.arrays.clear();
            self.state = StatementState::Closed;
        }
    }

    /// Free the server handle.
    ///
    /// The statement can be prepared again afterwards.
    pub fn release(&mut self) -> Result<()> {
        span!("release");
        if let Some(tx) = self.transaction.take() {
            tx.unsubscribe(&self.ended);
        }
        self.ended.store(false, Ordering::Release);
        self.rows.clear();
        self.outputs.clear();
        self.arrays.clear();
        self.parameters = Arc::new([]);
        self.fields = Arc::new([]);
        self.state = StatementState::Deallocated;
        self.kind = StatementKind::None;

        if let Some(handle) = self.handle.take() {
            self.attachment.call(|t| t.free_statement(handle, DSQL_DROP))?;
        }
        Ok(())
    }

    // ===== Blob and Array =====

    /// New blob under the statement transaction.
    pub fn create_blob(&self) -> Result<Blob> {
        Ok(Blob::new(&self.transaction()?))
    }

    pub fn create_blob_with_id(&self, id: BlobId) -> Result<Blob> {
        Ok(Blob::with_id(&self.transaction()?, id))
    }

    pub fn create_array(&mut self, descriptor: ArrayDescriptor) -> Result<Array> {
        self.observe_transaction_end();
        Ok(Array::new(&self.transaction()?, descriptor))
    }

    /// New array with descriptor of `relation.field`.
    ///
    /// Descriptors are cached until the statement is closed.
    pub fn create_array_from_field(&mut self, relation: &str, field: &str) -> Result<Array> {
        self.create_array_with_id(ArrayId::NULL, relation, field)
    }

    pub fn create_array_with_id(&mut self, id: ArrayId, relation: &str, field: &str) -> Result<Array> {
        self.observe_transaction_end();
        let transaction = self.transaction()?;

        let cached = self.arrays.iter().find(|d| d.relation == relation && d.field == field);
        let descriptor = match cached {
            Some(descriptor) => descriptor.clone(),
            None => {
                let descriptor = array::lookup_descriptor(&transaction, relation, field)?;
                self.arrays.push(descriptor.clone());
                descriptor
            },
        };

        Ok(Array::with_id(&transaction, id, descriptor))
    }

    // ===== Internal =====

    fn transaction(&self) -> Result<Transaction> {
        match &self.transaction {
            Some(tx) => Ok(tx.clone()),
            None => Err(StateError::new("statement has no transaction").into()),
        }
    }

    fn prepared(&self) -> Result<StatementHandle> {
        match self.handle {
            Some(handle) if self.kind != StatementKind::None => Ok(handle),
            _ => Err(StateError::new("statement is not prepared").into()),
        }
    }

    fn track<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() {
            self.state = StatementState::Error;
        }
        result
    }

    /// Apply the end of the bound transaction.
    fn observe_transaction_end(&mut self) {
        if !self.ended.swap(false, Ordering::AcqRel) {
            return;
        }
        verbose!("transaction ended, statement closed");
        self.transaction = None;
        self.rows.clear();
        self.arrays.clear();
        self.all_fetched = true;
        if matches!(
            self.state,
            StatementState::Prepared | StatementState::Executed | StatementState::Error
        ) {
            self.state = StatementState::Closed;
        }
    }

    fn free_cursor(&mut self) {
        if let Some(handle) = self.handle {
            if let Err(err) = self.attachment.call(|t| t.free_statement(handle, DSQL_CLOSE)) {
                suppressed!("close cursor", err);
            }
        }
    }

    fn query_records_affected(&self, handle: StatementHandle) -> Result<i64> {
        let items = [INFO_SQL_RECORDS, INFO_END];
        let info = self
            .attachment
            .call(|t| t.statement_info(handle, &items, ROWS_AFFECTED_BUFFER_SIZE))?;

        let mut affected = 0;
        for item in InfoReader::new(&info, "records affected") {
            let InfoItem::Value { item: INFO_SQL_RECORDS, data } = item? else {
                continue;
            };
            for count in InfoReader::new(data, "records affected") {
                match count? {
                    InfoItem::Value {
                        item: INFO_REQ_INSERT_COUNT | INFO_REQ_UPDATE_COUNT | INFO_REQ_DELETE_COUNT,
                        data,
                    } => affected += crate::gds::info::vax_integer(data),
                    _ => {},
                }
            }
        }
        Ok(affected)
    }

    /// Parse info, requesting again with doubled buffer while truncated.
    fn info_doubling<T>(
        &self,
        handle: StatementHandle,
        items: &[u8],
        mut buffer_len: usize,
        mut info: Bytes,
        parse: impl Fn(&[u8]) -> Result<Option<T>, ProtocolError>,
    ) -> Result<T> {
        let mut doublings = 0;
        loop {
            if let Some(parsed) = parse(&info)? {
                return Ok(parsed);
            }
            if doublings == MAX_DOUBLING {
                return Err(ProtocolError::other("statement info truncated").into());
            }
            doublings += 1;
            buffer_len *= 2;
            verbose!(buffer_len, "info truncated, retry");
            info = self.attachment.call(|t| t.statement_info(handle, items, buffer_len))?;
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.release() {
                suppressed!("release statement", err);
            }
        } else if let Some(tx) = self.transaction.take() {
            tx.unsubscribe(&self.ended);
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("handle", &self.handle)
            .field("state", &self.state())
            .field("kind", &self.kind)
            .field("fields", &self.fields.len())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Parameter encoded up to the content of a blob it binds.
enum Param<'a> {
    Encoded(Option<Bytes>),
    Blob(Cow<'a, [u8]>),
}

impl Param<'_> {
    fn finish(self, transaction: &Transaction, field: &FieldDescriptor) -> Result<Option<Bytes>> {
        match self {
            Param::Encoded(data) => Ok(data),
            Param::Blob(content) => {
                let mut blob = Blob::new(transaction);
                blob.write(&content)?;
                codec::encode_value(field, &Value::Blob(blob.id()))
            },
        }
    }
}

fn encode_param<'a>(charset: &Charset, field: &FieldDescriptor, value: &'a Value) -> Result<Param<'a>> {
    match value {
        Value::Text(text) if field.is_blob() => Ok(Param::Blob(charset.encode(text)?)),
        Value::Bytes(bytes) if field.is_blob() => Ok(Param::Blob(Cow::Borrowed(&bytes[..]))),
        _ => codec::encode_value(field, value).map(Param::Encoded),
    }
}

fn decode_row(fields: &Arc<[FieldDescriptor]>, row: RawRow) -> Result<Row> {
    let values = fields
        .iter()
        .zip(row)
        .map(|(field, data)| match data {
            Some(data) => codec::decode(field, &data),
            None => Ok(Value::Null),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(fields.clone(), values))
}

/// Parsed describe info.
#[derive(Debug, Default)]
struct Describe {
    kind: Option<i64>,
    select: Option<Vec<FieldDescriptor>>,
    bind: Option<Vec<FieldDescriptor>>,
}

#[derive(Default)]
struct Var {
    sql_type: i16,
    sub_type: i16,
    scale: i16,
    length: u16,
    name: String,
    relation: String,
    owner: String,
    alias: String,
}

impl Var {
    fn build(self, charset: &'static Charset) -> FieldDescriptor {
        FieldDescriptor::new(self.sql_type, self.length)
            .with_scale(self.scale)
            .with_sub_type(self.sub_type, charset)
            .with_name(&self.name)
            .with_relation(&self.relation)
            .with_owner(&self.owner)
            .with_alias(&self.alias)
    }
}

/// Parse describe info, [`None`] when the response is truncated.
fn parse_describe(info: &[u8], charset: &'static Charset) -> Result<Option<Describe>, ProtocolError> {
    let mut cursor = InfoCursor::new(info, "describe");
    let mut describe = Describe::default();
    let mut section = None;
    let mut vars = vec![];
    let mut var = Var::default();

    fn finish(describe: &mut Describe, section: Option<u8>, vars: &mut Vec<FieldDescriptor>) {
        match section {
            Some(INFO_SQL_SELECT) => describe.select = Some(std::mem::take(vars)),
            Some(INFO_SQL_BIND) => describe.bind = Some(std::mem::take(vars)),
            _ => {},
        }
    }

    while let Some(item) = cursor.peek() {
        cursor.byte()?;
        match item {
            INFO_END => break,
            INFO_TRUNCATED => return Ok(None),
            INFO_SQL_STMT_TYPE => describe.kind = Some(cursor.int()?),
            INFO_SQL_SELECT | INFO_SQL_BIND => {
                finish(&mut describe, section, &mut vars);
                section = Some(item);
            },
            INFO_SQL_DESCRIBE_VARS => {
                let count = cursor.int()?;
                vars = Vec::with_capacity(count.clamp(0, 1024) as usize);
            },
            INFO_SQL_SQLDA_SEQ => {
                cursor.int()?;
                var = Var::default();
            },
            INFO_SQL_TYPE => var.sql_type = cursor.int()? as i16,
            INFO_SQL_SUB_TYPE => var.sub_type = cursor.int()? as i16,
            INFO_SQL_SCALE => var.scale = cursor.int()? as i16,
            INFO_SQL_LENGTH => var.length = cursor.int()? as u16,
            INFO_SQL_FIELD => var.name = charset.decode(cursor.value()?),
            INFO_SQL_RELATION => var.relation = charset.decode(cursor.value()?),
            INFO_SQL_OWNER => var.owner = charset.decode(cursor.value()?),
            INFO_SQL_ALIAS => var.alias = charset.decode(cursor.value()?),
            INFO_SQL_DESCRIBE_END => vars.push(std::mem::take(&mut var).build(charset)),
            item => return Err(ProtocolError::item(item, "describe")),
        }
    }

    finish(&mut describe, section, &mut vars);
    Ok(Some(describe))
}

/// Parse plan info, [`None`] when the response is truncated.
fn parse_plan(info: &[u8], charset: &'static Charset) -> Result<Option<String>, ProtocolError> {
    for item in InfoReader::new(info, "execution plan") {
        match item? {
            InfoItem::Truncated => return Ok(None),
            InfoItem::Value { item: INFO_SQL_GET_PLAN, data } => {
                return Ok(Some(charset.decode(data).trim().to_owned()));
            },
            InfoItem::Value { item, .. } => return Err(ProtocolError::item(item, "execution plan")),
        }
    }
    Ok(Some(String::new()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::ErrorKind,
        transport::mock::{self, Script},
        types::FieldDescriptor as F,
    };

    fn varchar(name: &str, len: u16) -> F {
        F::new(SQL_VARYING + 1, len).with_name(name)
    }

    fn int(name: &str) -> F {
        F::new(SQL_LONG, 4).with_name(name)
    }

    fn posts(count: i32) -> Script {
        Script::new(STMT_SELECT)
            .outputs(vec![int("ID"), varchar("NAME", 20)])
            .rows((1..=count).map(|i| vec![Value::Integer(i), Value::Text(format!("post {i}"))]).collect())
    }

    #[test]
    fn prepare_and_describe() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(0).inputs(vec![int("ID")])));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        assert_eq!(stmt.state(), StatementState::Allocated);
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST WHERE ID > ?").unwrap();

        assert_eq!(stmt.state(), StatementState::Prepared);
        assert_eq!(stmt.kind(), StatementKind::Select);
        assert_eq!(stmt.fields().len(), 2);
        assert_eq!(stmt.fields()[1].name(), "NAME");
        assert_eq!(stmt.fields()[1].length(), 20);
        assert!(stmt.fields()[1].nullable());
        assert_eq!(stmt.parameters().len(), 1);

        assert_eq!(stmt.describe().unwrap().len(), 2);
        assert_eq!(stmt.describe_parameters().unwrap().len(), 1);
    }

    #[test]
    fn fetch_in_batches() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(5)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.set_fetch_size(2);
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        stmt.execute(&[]).unwrap();
        assert_eq!(stmt.records_affected(), -1);

        let mut rows = vec![];
        while let Some(row) = stmt.fetch().unwrap() {
            rows.push(row.decode::<(i32, String)>().unwrap());
        }
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4], (5, "post 5".to_owned()));
        assert_eq!(mock::with(&attachment, |m| m.calls("fetch")), 3);
        assert!(stmt.fetch().unwrap().is_none());
    }

    #[test]
    fn fetch_after_close() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(3)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        stmt.execute(&[]).unwrap();
        assert!(stmt.fetch().unwrap().is_some());

        stmt.close();
        assert_eq!(stmt.state(), StatementState::Closed);
        let err = stmt.fetch().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::State(_)));

        // closed statement can be executed again
        stmt.execute(&[]).unwrap();
        assert!(stmt.fetch().unwrap().is_some());
    }

    #[test]
    fn fetch_without_cursor() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("INSERT", Script::new(STMT_INSERT).affected(2, 0, 0)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        assert!(stmt.fetch().is_err());

        stmt.prepare(&tx, "INSERT INTO POST SELECT * FROM DRAFT").unwrap();
        assert!(stmt.fetch().is_err());
        stmt.execute(&[]).unwrap();
        assert_eq!(stmt.records_affected(), 2);
        assert!(stmt.fetch().is_err());
    }

    #[test]
    fn release_clears_arrays() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("FROM POST", posts(1));
            m.array_field("POST", "TAGS", BLR_LONG, 4, "RDB$5", &[(1, 3)]);
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        stmt.create_array_from_field("POST", "TAGS").unwrap();
        stmt.create_array_with_id(ArrayId::new(7), "POST", "TAGS").unwrap();
        assert_eq!(stmt.arrays.len(), 1);

        stmt.release().unwrap();
        assert!(stmt.arrays.is_empty());
        assert_eq!(stmt.state(), StatementState::Deallocated);
        assert_eq!(stmt.kind(), StatementKind::None);
        assert!(mock::with(&attachment, |m| m.freed(DSQL_DROP)) >= 1);
        assert!(stmt.execute(&[]).is_err());
    }

    #[test]
    fn truncated_describe_doubles_buffer() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("FROM POST", posts(0));
            m.truncate_below(PREPARE_INFO_BUFFER_SIZE * 4);
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        assert_eq!(stmt.fields().len(), 2);
        assert_eq!(mock::with(&attachment, |m| m.calls("statement_info")), 2);
    }

    #[test]
    fn truncated_describe_gives_up() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("FROM POST", posts(0));
            m.truncate_below(PREPARE_INFO_BUFFER_SIZE * 32);
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        let err = stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(stmt.state(), StatementState::Error);
        assert_eq!(mock::with(&attachment, |m| m.calls("statement_info")), MAX_DOUBLING);
    }

    #[test]
    fn stored_procedure_output() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script(
                "EXECUTE PROCEDURE",
                Script::new(STMT_EXEC_PROCEDURE)
                    .inputs(vec![int("A")])
                    .outputs(vec![int("RESULT")])
                    .rows(vec![vec![Value::Integer(42)]])
                    .affected(0, 1, 0),
            )
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "EXECUTE PROCEDURE ANSWER(?)").unwrap();
        stmt.execute(&[Value::Integer(6)]).unwrap();
        assert_eq!(stmt.records_affected(), 1);

        let row = stmt.output_parameters().unwrap();
        assert_eq!(row.try_get::<_, i32>("RESULT").unwrap(), 42);
        assert!(stmt.output_parameters().is_none());
    }

    #[test]
    fn parameter_truncation_is_local() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("INSERT", Script::new(STMT_INSERT).inputs(vec![F::new(SQL_TEXT, 5)]))
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "INSERT INTO T VALUES (?)").unwrap();
        let err = stmt.execute(&[Value::from("abcdef")]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Truncation(_)));
        assert_eq!(stmt.state(), StatementState::Error);
        assert_eq!(mock::with(&attachment, |m| m.calls("execute")), 0);

        assert!(stmt.execute(&[]).is_err());
        assert_eq!(mock::with(&attachment, |m| m.calls("execute")), 0);

        stmt.execute(&[Value::from("abcde")]).unwrap();
        assert_eq!(stmt.state(), StatementState::Executed);
    }

    #[test]
    fn text_into_blob_parameter() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("INSERT", Script::new(STMT_INSERT).inputs(vec![F::new(SQL_BLOB + 1, 8)]))
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "INSERT INTO T VALUES (?)").unwrap();
        stmt.execute(&[Value::from("long text")]).unwrap();

        let params = mock::with(&attachment, |m| m.last_params());
        let id = u64::from_le_bytes(params[0].as_deref().unwrap().try_into().unwrap());
        let mut blob = stmt.create_blob_with_id(BlobId::new(id)).unwrap();
        assert_eq!(blob.read_string().unwrap(), "long text");
    }

    #[test]
    fn invalid_parameter_writes_no_blob() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| {
            m.script("INSERT", Script::new(STMT_INSERT).inputs(vec![F::new(SQL_BLOB + 1, 8), varchar("CODE", 2)]))
        });
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "INSERT INTO T VALUES (?, ?)").unwrap();
        let err = stmt.execute(&[Value::from("long text"), Value::from("abc")]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Truncation(_)));
        assert_eq!(mock::with(&attachment, |m| m.calls("create_blob")), 0);

        stmt.execute(&[Value::from("long text"), Value::from("ab")]).unwrap();
        assert_eq!(mock::with(&attachment, |m| m.calls("create_blob")), 1);
    }

    #[test]
    fn transaction_end_closes_statement() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(3)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        stmt.execute(&[]).unwrap();
        tx.commit().unwrap();

        assert_eq!(stmt.state(), StatementState::Closed);
        assert!(stmt.fetch().is_err());
        assert!(stmt.execute(&[]).is_err());

        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        stmt.set_transaction(&tx);
        stmt.execute(&[]).unwrap();
        assert!(stmt.fetch().unwrap().is_some());
    }

    #[test]
    fn plan() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(0)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        assert_eq!(stmt.execution_plan().unwrap(), mock::PLAN);
    }

    #[test]
    fn drop_frees_handle() {
        let attachment = mock::attachment();
        mock::with(&attachment, |m| m.script("FROM POST", posts(0)));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let mut stmt = attachment.create_statement();
        stmt.prepare(&tx, "SELECT ID, NAME FROM POST").unwrap();
        drop(stmt);
        assert_eq!(mock::with(&attachment, |m| m.freed(DSQL_DROP)), 1);
    }

    #[test]
    fn describe_parsing() {
        let info = mock::describe_info(STMT_SELECT, &[int("ID")], &[]);
        let describe = parse_describe(&info, crate::charset::default()).unwrap().unwrap();
        assert_eq!(describe.kind, Some(STMT_SELECT as i64));
        assert_eq!(describe.select.unwrap()[0].name(), "ID");
        assert!(describe.bind.unwrap().is_empty());

        assert!(parse_describe(&[INFO_TRUNCATED, INFO_END], crate::charset::default()).unwrap().is_none());
        assert!(parse_describe(&[99, 0, 0], crate::charset::default()).is_err());
    }

    #[test]
    fn describe_items() {
        assert_eq!(DESCRIBE_SELECT.len(), 12);
        assert_eq!(DESCRIBE_SELECT[0], INFO_SQL_SELECT);
        assert_eq!(DESCRIBE_BIND.len(), 12);
        assert_eq!(DESCRIBE_BIND[0], INFO_SQL_BIND);
        assert_eq!(DESCRIBE_BIND[11], INFO_SQL_DESCRIBE_END);
    }
}
