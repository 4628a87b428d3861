//! Supporting utility type.

/// Trace when `verbose` feature enabled.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*)
    };
}

/// Create and enter `Span` when `verbose` feature enabled.
macro_rules! span {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        let s = tracing::trace_span!($($tt)*);
        #[cfg(feature = "verbose")]
        let _s = s.enter();
    };
}

/// Log suppressed cleanup error when `log` feature enabled.
macro_rules! suppressed {
    ($what:literal, $err:expr) => {{
        let _err = $err;
        #[cfg(feature = "log")]
        log::warn!(concat!($what, " failed during cleanup: {}"), _err);
    }};
}

pub(crate) use verbose;
pub(crate) use span;
pub(crate) use suppressed;
