//! The [`Transaction`] type.
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak, atomic::AtomicBool, atomic::Ordering},
};

use crate::{
    Attachment, Result,
    common::{span, suppressed},
    error::StateError,
    gds::{ParameterBuffer, codes::*},
    transport::TransactionHandle,
};

/// Lifecycle of a [`Transaction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    NoTransaction,
    Active,
    Committed,
    RolledBack,
}

/// Transaction isolation level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Table stability, `isc_tpb_consistency`.
    Consistency,
    /// Snapshot, `isc_tpb_concurrency`.
    Concurrency,
    /// See committed changes, optionally the latest committed record version.
    ReadCommitted { record_version: bool },
}

/// Transaction parameters, turned into a TPB.
///
/// Default is read committed with record version, wait, read write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOptions {
    isolation: IsolationLevel,
    wait: bool,
    lock_timeout: Option<i32>,
    read_only: bool,
    no_auto_undo: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted { record_version: true },
            wait: true,
            lock_timeout: None,
            read_only: false,
            no_auto_undo: false,
        }
    }
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Fail on lock conflict instead of waiting.
    pub fn nowait(mut self) -> Self {
        self.wait = false;
        self
    }

    /// Wait at most `seconds` on lock conflict.
    pub fn lock_timeout(mut self, seconds: i32) -> Self {
        self.wait = true;
        self.lock_timeout = Some(seconds);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn no_auto_undo(mut self) -> Self {
        self.no_auto_undo = true;
        self
    }

    /// Build the transaction parameter buffer.
    pub fn to_tpb(&self) -> ParameterBuffer {
        let mut tpb = ParameterBuffer::new(TPB_VERSION3);

        match self.isolation {
            IsolationLevel::Consistency => tpb.put_flag(TPB_CONSISTENCY),
            IsolationLevel::Concurrency => tpb.put_flag(TPB_CONCURRENCY),
            IsolationLevel::ReadCommitted { record_version } => {
                tpb.put_flag(TPB_READ_COMMITTED);
                tpb.put_flag(if record_version { TPB_REC_VERSION } else { TPB_NO_REC_VERSION });
            },
        }

        tpb.put_flag(if self.wait { TPB_WAIT } else { TPB_NOWAIT });
        if let Some(timeout) = self.lock_timeout {
            tpb.put_int(TPB_LOCK_TIMEOUT, timeout);
        }
        tpb.put_flag(if self.read_only { TPB_READ } else { TPB_WRITE });
        if self.no_auto_undo {
            tpb.put_flag(TPB_NO_AUTO_UNDO);
        }

        tpb
    }
}

/// A transaction of an [`Attachment`].
///
/// Cloning shares the same transaction. When the last clone is dropped while
/// still active, the transaction is rolled back.
///
/// # Example
///
/// ```no_run
/// # fn app(attachment: &firebro::Attachment) -> firebro::Result<()> {
/// use firebro::TransactionOptions;
///
/// let tx = attachment.begin_transaction(&TransactionOptions::new().nowait())?;
///
/// let mut stmt = attachment.create_statement();
/// stmt.prepare(&tx, "insert into post(name) values('foo')")?;
/// stmt.execute(&[])?;
///
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

struct Inner {
    attachment: Attachment,
    state: Mutex<State>,
    subscribers: Mutex<Vec<Weak<AtomicBool>>>,
}

struct State {
    handle: Option<TransactionHandle>,
    state: TransactionState,
}

impl Transaction {
    /// Transaction that is not started yet, see [`begin`][Transaction::begin].
    pub fn new(attachment: &Attachment) -> Self {
        Self {
            inner: Arc::new(Inner {
                attachment: attachment.clone(),
                state: Mutex::new(State { handle: None, state: TransactionState::NoTransaction }),
                subscribers: Mutex::new(vec![]),
            }),
        }
    }

    pub fn attachment(&self) -> &Attachment {
        &self.inner.attachment
    }

    pub fn state(&self) -> TransactionState {
        self.inner.state.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Start the transaction.
    pub fn begin(&self, options: &TransactionOptions) -> Result<()> {
        span!("begin");
        let mut state = self.inner.state.lock();
        if state.state == TransactionState::Active {
            return Err(StateError::new("transaction is already active").into());
        }

        let tpb = options.to_tpb();
        let handle = self.inner.attachment.call(|t| t.begin_transaction(tpb.as_bytes()))?;

        state.handle = Some(handle);
        state.state = TransactionState::Active;
        self.inner.attachment.transaction_started();
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        span!("commit");
        self.finish(TransactionState::Committed, |t, handle| t.commit(handle))
    }

    pub fn rollback(&self) -> Result<()> {
        span!("rollback");
        self.finish(TransactionState::RolledBack, |t, handle| t.rollback(handle))
    }

    /// Commit and keep the transaction context active.
    pub fn commit_retaining(&self) -> Result<()> {
        self.retain(|t, handle| t.commit_retaining(handle))
    }

    /// Rollback and keep the transaction context active.
    pub fn rollback_retaining(&self) -> Result<()> {
        self.retain(|t, handle| t.rollback_retaining(handle))
    }

    /// First phase of two phase commit without a message, does nothing.
    pub fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// First phase of two phase commit with a recovery message.
    pub fn prepare_with(&self, message: &[u8]) -> Result<()> {
        let state = self.inner.state.lock();
        let handle = active(&state)?;
        self.inner.attachment.call(|t| t.prepare_transaction(handle, message))
    }

    /// Returns `true` if both refer to the same transaction.
    pub(crate) fn same(&self, other: &Transaction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn handle(&self) -> Result<TransactionHandle> {
        active(&self.inner.state.lock())
    }

    /// Register flag which is set when the transaction ends.
    pub(crate) fn subscribe(&self, flag: &Arc<AtomicBool>) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|s| s.strong_count() > 0);
        subscribers.push(Arc::downgrade(flag));
    }

    pub(crate) fn unsubscribe(&self, flag: &Arc<AtomicBool>) {
        self.inner
            .subscribers
            .lock()
            .retain(|s| s.strong_count() > 0 && !std::ptr::eq(s.as_ptr(), Arc::as_ptr(flag)));
    }

    fn finish(
        &self,
        next: TransactionState,
        f: impl FnOnce(&mut dyn crate::transport::Transport, TransactionHandle) -> Result<()>,
    ) -> Result<()> {
        let mut state = self.inner.state.lock();
        let handle = active(&state)?;
        self.inner.attachment.call(|t| f(t, handle))?;

        state.handle = None;
        state.state = next;
        drop(state);

        self.inner.attachment.transaction_ended();
        self.inner.notify();
        Ok(())
    }

    fn retain(
        &self,
        f: impl FnOnce(&mut dyn crate::transport::Transport, TransactionHandle) -> Result<TransactionHandle>,
    ) -> Result<()> {
        let mut state = self.inner.state.lock();
        let handle = active(&state)?;
        state.handle = Some(self.inner.attachment.call(|t| f(t, handle))?);
        Ok(())
    }
}

fn active(state: &State) -> Result<TransactionHandle> {
    match (state.state, state.handle) {
        (TransactionState::Active, Some(handle)) => Ok(handle),
        (state, _) => Err(StateError::new(format!("transaction is not active ({state:?})")).into()),
    }
}

impl Inner {
    fn notify(&self) {
        for flag in self.subscribers.lock().drain(..) {
            if let Some(flag) = flag.upgrade() {
                flag.store(true, Ordering::Release);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let (TransactionState::Active, Some(handle)) = (state.state, state.handle.take()) {
            state.state = TransactionState::RolledBack;
            if let Err(err) = self.attachment.call(|t| t.rollback(handle)) {
                suppressed!("rollback", err);
            }
            self.attachment.transaction_ended();
            self.notify();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Transaction")
            .field("handle", &state.handle)
            .field("state", &state.state)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::mock;

    #[test]
    fn default_tpb() {
        let tpb = TransactionOptions::default().to_tpb();
        assert_eq!(
            tpb.as_bytes(),
            &[TPB_VERSION3, TPB_READ_COMMITTED, TPB_REC_VERSION, TPB_WAIT, TPB_WRITE]
        );
    }

    #[test]
    fn custom_tpb() {
        let tpb = TransactionOptions::new()
            .isolation(IsolationLevel::Concurrency)
            .lock_timeout(5)
            .read_only()
            .no_auto_undo()
            .to_tpb();
        assert_eq!(
            tpb.as_bytes(),
            &[
                TPB_VERSION3, TPB_CONCURRENCY, TPB_WAIT,
                TPB_LOCK_TIMEOUT, 4, 5, 0, 0, 0,
                TPB_READ, TPB_NO_AUTO_UNDO,
            ]
        );
    }

    #[test]
    fn commit_without_begin() {
        let attachment = mock::attachment();
        let tx = Transaction::new(&attachment);
        assert_eq!(tx.state(), TransactionState::NoTransaction);

        let err = tx.commit().unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::State(_)));
        assert!(tx.rollback().is_err());
        assert_eq!(mock::with(&attachment, |m| m.calls("commit")), 0);
    }

    #[test]
    fn lifecycle_and_count() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        assert!(tx.is_active());
        assert_eq!(attachment.transaction_count(), 1);

        tx.commit_retaining().unwrap();
        assert!(tx.is_active());
        assert_eq!(attachment.transaction_count(), 1);

        tx.rollback_retaining().unwrap();
        assert!(tx.is_active());

        tx.commit().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(attachment.transaction_count(), 0);
        assert!(tx.commit().is_err());
        assert!(tx.begin(&Default::default()).is_ok());
    }

    #[test]
    fn begin_twice() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        assert!(tx.begin(&Default::default()).is_err());
    }

    #[test]
    fn drop_rolls_back() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        let clone = tx.clone();
        drop(tx);
        assert_eq!(mock::with(&attachment, |m| m.calls("rollback")), 0);

        drop(clone);
        assert_eq!(mock::with(&attachment, |m| m.calls("rollback")), 1);
        assert_eq!(attachment.transaction_count(), 0);
    }

    #[test]
    fn end_notifies_subscribers() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let other = Arc::new(AtomicBool::new(false));
        tx.subscribe(&flag);
        tx.subscribe(&other);
        tx.unsubscribe(&other);

        tx.rollback().unwrap();
        assert!(flag.load(Ordering::Acquire));
        assert!(!other.load(Ordering::Acquire));
    }

    #[test]
    fn two_phase_prepare() {
        let attachment = mock::attachment();
        let tx = attachment.begin_transaction(&Default::default()).unwrap();
        tx.prepare().unwrap();
        assert_eq!(mock::with(&attachment, |m| m.calls("prepare_transaction")), 0);
        tx.prepare_with(b"recovery").unwrap();
        assert_eq!(mock::with(&attachment, |m| m.calls("prepare_transaction")), 1);
        tx.commit().unwrap();
    }
}
