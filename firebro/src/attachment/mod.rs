//! The [`Attachment`] type.
use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    Result, Statement, Transaction, TransactionOptions,
    charset::Charset,
    common::{span, verbose},
    error::{StateError, Unsupported},
    gds::{DatabaseError, InfoItem, InfoReader, ProtocolError, StatusEntry, codes::*},
    transport::{
        Backend, Canceller, Transport,
        native::{FbClient, NativeTransport},
        wire::WireTransport,
    },
};

mod config;

pub use config::{Config, ParseError};

type WarningHandler = Arc<dyn Fn(&DatabaseError) + Send + Sync>;

/// Kind of [`Attachment::cancel_operation`] request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelKind {
    /// Disallow cancellation of the attachment.
    Disable,
    /// Allow cancellation again.
    Enable,
    /// Cancel the running request.
    Raise,
    /// Abort the attachment.
    Abort,
}

impl CancelKind {
    fn code(self) -> u16 {
        match self {
            Self::Disable => FB_CANCEL_DISABLE,
            Self::Enable => FB_CANCEL_ENABLE,
            Self::Raise => FB_CANCEL_RAISE,
            Self::Abort => FB_CANCEL_ABORT,
        }
    }
}

/// A connection to one database.
///
/// Cloning shares the same connection, every engine call is serialized
/// through an internal lock.
///
/// # Example
///
/// ```no_run
/// use firebro::{Attachment, Config};
///
/// # fn app() -> firebro::Result<()> {
/// let attachment = Attachment::connect(&Config::from_env())?;
/// println!("{}", attachment.server_version()?);
/// attachment.detach()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Attachment {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Mutex<Backend>,
    backend_name: &'static str,
    canceller: Option<Box<dyn Canceller>>,
    charset: &'static Charset,
    dialect: u16,
    packet_size: usize,
    transactions: AtomicUsize,
    detached: AtomicBool,
    warning_handler: Mutex<Option<WarningHandler>>,
}

impl Attachment {
    /// Attach to a database over the network.
    pub fn connect(config: &Config) -> Result<Self> {
        span!("connect", host = %config.host, database = %config.database);
        let wire = WireTransport::attach(config, false)?;
        Ok(Self::from_backend(Backend::Wire(wire), config))
    }

    /// Attach using configuration from environment variables.
    ///
    /// See [`Config::from_env`].
    pub fn connect_env() -> Result<Self> {
        Self::connect(&Config::from_env())
    }

    /// Create a new database over the network and attach to it.
    pub fn create_database(config: &Config) -> Result<Self> {
        span!("create_database", host = %config.host, database = %config.database);
        let wire = WireTransport::attach(config, true)?;
        Ok(Self::from_backend(Backend::Wire(wire), config))
    }

    /// Attach through the client library.
    pub fn attach_native(client: impl FbClient + 'static, config: &Config) -> Result<Self> {
        let native = NativeTransport::attach(Box::new(client), config, false)?;
        Ok(Self::from_backend(Backend::Native(native), config))
    }

    /// Create a new database through the client library and attach to it.
    pub fn create_database_native(client: impl FbClient + 'static, config: &Config) -> Result<Self> {
        let native = NativeTransport::attach(Box::new(client), config, true)?;
        Ok(Self::from_backend(Backend::Native(native), config))
    }

    pub(crate) fn from_backend(mut backend: Backend, config: &Config) -> Self {
        let transport = backend.transport();
        let backend_name = transport.backend();
        let canceller = transport.canceller();
        Self {
            inner: Arc::new(Inner {
                backend: Mutex::new(backend),
                backend_name,
                canceller,
                charset: config.charset,
                dialect: config.dialect,
                packet_size: config.packet_size,
                transactions: AtomicUsize::new(0),
                detached: AtomicBool::new(false),
                warning_handler: Mutex::new(None),
            }),
        }
    }

    /// Detach from the database.
    ///
    /// Fails when any transaction is still active.
    pub fn detach(&self) -> Result<()> {
        span!("detach");
        let count = self.transaction_count();
        if count > 0 {
            let err = DatabaseError::with_args(OPEN_TRANS, [StatusEntry::Number(count as i32)]);
            return Err(err.into());
        }
        self.call(|t| t.detach())?;
        self.inner.detached.store(true, Ordering::Release);
        Ok(())
    }

    /// Drop the attached database, this also detach.
    pub fn drop_database(&self) -> Result<()> {
        span!("drop_database");
        self.call(|t| t.drop_database())?;
        self.inner.detached.store(true, Ordering::Release);
        Ok(())
    }

    /// Request database info items, returns the raw info block.
    pub fn database_info(&self, items: &[u8]) -> Result<Bytes> {
        self.call(|t| t.database_info(items, DEFAULT_MAX_BUFFER_SIZE))
    }

    /// Server version string, e.g. `LI-V3.0.10.33601 Firebird 3.0`.
    pub fn server_version(&self) -> Result<String> {
        let info = self.database_info(&[INFO_ISC_VERSION, INFO_END])?;
        for item in InfoReader::new(&info, "server version") {
            let InfoItem::Value { item: INFO_ISC_VERSION, data } = item? else {
                continue;
            };
            // count, then length prefixed strings
            let len = *data.get(1).ok_or(ProtocolError::eof("server version"))? as usize;
            let version = data.get(2..2 + len).ok_or(ProtocolError::eof("server version"))?;
            return Ok(String::from_utf8_lossy(version).into_owned());
        }
        Err(ProtocolError::item(INFO_END, "server version").into())
    }

    /// Cancel or toggle cancellation of the running request.
    ///
    /// Cancellation is advisory, the engine checks it at its own pace. The
    /// request is sent without waiting for the running call, which the wire
    /// protocol can not do.
    pub fn cancel_operation(&self, kind: CancelKind) -> Result<()> {
        if self.is_detached() {
            return Err(StateError::new("attachment is detached").into());
        }
        let Some(canceller) = &self.inner.canceller else {
            let backend = self.inner.backend_name;
            return Err(Unsupported { operation: "cancel_operation", backend }.into());
        };
        let warnings = canceller.cancel(kind.code())?;
        self.dispatch_warnings(&warnings);
        Ok(())
    }

    /// Handle warnings returned by the engine.
    ///
    /// Without a handler, warnings are only traced.
    pub fn set_warning_handler<F>(&self, handler: F)
    where
        F: Fn(&DatabaseError) + Send + Sync + 'static,
    {
        *self.inner.warning_handler.lock() = Some(Arc::new(handler));
    }

    /// Start a new transaction.
    pub fn begin_transaction(&self, options: &TransactionOptions) -> Result<Transaction> {
        let tx = Transaction::new(self);
        tx.begin(options)?;
        Ok(tx)
    }

    /// Create a statement, the handle is allocated on first prepare.
    pub fn create_statement(&self) -> Statement {
        Statement::new(self)
    }

    /// Number of active transactions.
    pub fn transaction_count(&self) -> usize {
        self.inner.transactions.load(Ordering::Acquire)
    }

    pub fn charset(&self) -> &'static Charset {
        self.inner.charset
    }

    pub fn dialect(&self) -> u16 {
        self.inner.dialect
    }

    /// Maximum blob segment size.
    pub fn packet_size(&self) -> usize {
        self.inner.packet_size
    }

    /// Returns `true` after [`detach`][Attachment::detach] or
    /// [`drop_database`][Attachment::drop_database] succeed.
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    /// Run engine call holding the attachment lock, then dispatch warnings.
    pub(crate) fn call<R>(&self, f: impl FnOnce(&mut dyn Transport) -> Result<R>) -> Result<R> {
        if self.is_detached() {
            return Err(StateError::new("attachment is detached").into());
        }

        let (result, warnings) = {
            let mut backend = self.inner.backend.lock();
            let transport = backend.transport();
            let result = f(&mut *transport);
            (result, transport.take_warnings())
        };

        self.dispatch_warnings(&warnings);
        result
    }

    fn dispatch_warnings(&self, warnings: &[DatabaseError]) {
        if warnings.is_empty() {
            return;
        }
        // handler may replace itself
        let handler = self.inner.warning_handler.lock().clone();
        for warning in warnings {
            verbose!(%warning, "engine warning");
            if let Some(handler) = &handler {
                handler(warning);
            }
        }
    }

    pub(crate) fn transaction_started(&self) {
        self.inner.transactions.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn transaction_ended(&self) {
        let _ = self.inner.transactions.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> parking_lot::MutexGuard<'_, Backend> {
        self.inner.backend.lock()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("charset", &self.inner.charset.name())
            .field("dialect", &self.inner.dialect)
            .field("transactions", &self.transaction_count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::mock;

    #[test]
    fn detach_with_open_transaction() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();

        let err = attachment.detach().unwrap_err();
        assert_eq!(err.code(), Some(OPEN_TRANS));
        assert!(err.to_string().contains("(1 active)"));

        tx.commit().unwrap();
        attachment.detach().unwrap();
        assert!(attachment.is_detached());

        let err = attachment.begin_transaction(&Default::default()).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::State(_)));
    }

    #[test]
    fn warnings_reach_handler() {
        let attachment = mock::attachment();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        attachment.set_warning_handler(move |w| {
            assert!(w.is_warning());
            counter.fetch_add(1, Ordering::AcqRel);
        });

        mock::with(&attachment, |m| m.warn_next(DatabaseError::new(vec![StatusEntry::Warning(STRING_TRUNCATION)])));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        assert_eq!(seen.load(Ordering::Acquire), 1);
        tx.commit().unwrap();
        assert_eq!(seen.load(Ordering::Acquire), 1);
    }

    #[test]
    fn handler_replaces_itself() {
        let attachment = mock::attachment();
        let seen = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (attachment.clone(), seen.clone());
        attachment.set_warning_handler(move |_| {
            counter.fetch_add(1, Ordering::AcqRel);
            inner.set_warning_handler(|_| {});
        });

        let warning = || DatabaseError::new(vec![StatusEntry::Warning(STRING_TRUNCATION)]);
        mock::with(&attachment, |m| m.warn_next(warning()));
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        mock::with(&attachment, |m| m.warn_next(warning()));
        tx.commit().unwrap();
        assert_eq!(seen.load(Ordering::Acquire), 1);
    }

    #[test]
    fn server_version() {
        let attachment = mock::attachment();
        assert_eq!(attachment.server_version().unwrap(), mock::SERVER_VERSION);
    }

    #[test]
    fn cancel_unsupported() {
        let attachment = mock::attachment();
        let err = attachment.cancel_operation(CancelKind::Raise).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Unsupported(_)));
        assert!(err.to_string().contains("mock"));
    }
}
