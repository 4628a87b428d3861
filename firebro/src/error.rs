//! `firebro` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt};

use crate::{
    attachment::ParseError,
    gds::{DatabaseError, ProtocolError, codes},
    row::DecodeError,
    types::{ConversionError, TruncationError},
};

/// A specialized [`Result`] type for `firebro` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `firebro` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Primary engine error code.
    ///
    /// Local errors that have no engine counterpart returns [`None`].
    pub fn code(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Database(e) => Some(e.code()),
            ErrorKind::Truncation(_) => Some(codes::ARITH_EXCEPT),
            ErrorKind::Conversion(e) => Some(e.code()),
            ErrorKind::State(_)
            | ErrorKind::Unsupported(_)
            | ErrorKind::Protocol(_)
            | ErrorKind::Config(_)
            | ErrorKind::Decode(_) => None,
        }
    }

    /// Derived SQLSTATE, empty if unknown.
    pub fn sqlstate(&self) -> &str {
        match &self.kind {
            ErrorKind::Database(e) => e.sqlstate(),
            ErrorKind::Truncation(_) => "22001",
            ErrorKind::Conversion(e) => e.sqlstate(),
            ErrorKind::State(_) => "HY010",
            ErrorKind::Unsupported(_) => "0A000",
            ErrorKind::Protocol(_) => "08S01",
            ErrorKind::Config(_) | ErrorKind::Decode(_) => "",
        }
    }

    /// Returns `true` if the attachment should not be reused after this error.
    pub fn is_fatal(&self) -> bool {
        match &self.kind {
            ErrorKind::Database(e) => e.is_fatal(),
            ErrorKind::Protocol(_) => true,
            _ => false,
        }
    }

    /// Returns the engine error, if this error came from a status vector.
    pub fn as_database(&self) -> Option<&DatabaseError> {
        match &self.kind {
            ErrorKind::Database(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// All possible error kind from `firebro` library.
pub enum ErrorKind {
    /// Error reported by the engine through a status vector.
    Database(DatabaseError),
    /// String value longer than the field can hold.
    Truncation(TruncationError),
    /// Value can not be converted to the field type.
    Conversion(ConversionError),
    /// Operation is not valid in the current object state.
    State(StateError),
    /// Operation is not available on the transport backend.
    Unsupported(Unsupported),
    /// Malformed response from the engine.
    Protocol(ProtocolError),
    Config(ParseError),
    Decode(DecodeError),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<TruncationError>e => ErrorKind::Truncation(e));
from!(<ConversionError>e => ErrorKind::Conversion(e));
from!(<StateError>e => ErrorKind::State(e));
from!(<Unsupported>e => ErrorKind::Unsupported(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<ParseError>e => ErrorKind::Config(e));
from!(<DecodeError>e => ErrorKind::Decode(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => e.fmt(f),
            Self::Truncation(e) => e.fmt(f),
            Self::Conversion(e) => e.fmt(f),
            Self::State(e) => e.fmt(f),
            Self::Unsupported(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Local precondition violation, raised without contacting the engine.
pub struct StateError {
    reason: Cow<'static,str>,
}

impl StateError {
    pub(crate) fn new(reason: impl Into<Cow<'static,str>>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::error::Error for StateError { }

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state: {}", self.reason)
    }
}

impl fmt::Debug for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Operation is not meaningful on the current transport backend.
pub struct Unsupported {
    pub(crate) operation: &'static str,
    pub(crate) backend: &'static str,
}

impl std::error::Error for Unsupported { }

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not supported by the {} backend", self.operation, self.backend)
    }
}

impl fmt::Debug for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
