//! GDS protocol building blocks shared by every transport backend.
//!
//! - [`codes`], engine constants
//! - [`status`], status vector and [`DatabaseError`]
//! - [`buffer`], parameter buffers
//! - [`info`], info block reader
//! - [`blr`], BLR message and SDL builders
use std::{borrow::Cow, fmt};

pub mod codes;
pub mod message;
pub mod status;
pub mod buffer;
pub mod info;
pub mod blr;

pub use status::{DatabaseError, Status, StatusBuilder, StatusEntry, StringResolver};
pub use buffer::ParameterBuffer;
pub use info::{InfoCursor, InfoItem, InfoReader};

/// An error when translating engine response.
pub enum ProtocolError {
    /// Response ended before expected data.
    UnexpectedEof {
        context: &'static str,
    },
    /// Unknown item code in info block.
    UnexpectedItem {
        item: u8,
        context: &'static str,
    },
    /// Unexpected wire operation.
    UnexpectedOp {
        expect: Option<i32>,
        found: i32,
    },
    Other(Cow<'static,str>),
}

impl ProtocolError {
    pub(crate) fn eof(context: &'static str) -> Self {
        Self::UnexpectedEof { context }
    }

    pub(crate) fn item(item: u8, context: &'static str) -> Self {
        Self::UnexpectedItem { item, context }
    }

    pub(crate) fn op(expect: Option<i32>, found: i32) -> Self {
        Self::UnexpectedOp { expect, found }
    }

    pub(crate) fn other(reason: impl Into<Cow<'static,str>>) -> Self {
        Self::Other(reason.into())
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { context } => write!(f, "unexpected end of response in `{context}`"),
            Self::UnexpectedItem { item, context } => write!(f, "unexpected info item `{item}` in `{context}`"),
            Self::UnexpectedOp { expect: Some(expect), found } => {
                write!(f, "expected operation `{expect}` found `{found}`")
            },
            Self::UnexpectedOp { expect: None, found } => write!(f, "unexpected operation `{found}`"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
