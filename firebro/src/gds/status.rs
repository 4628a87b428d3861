//! Status vector parsing and the structured [`DatabaseError`].
//!
//! The engine reports every call outcome as a sequence of tagged entries
//! terminated by [`ARG_END`]. The native client fills a vector of machine
//! words where string entries are pointers, the wire protocol sends the same
//! sequence inline as XDR. Both feed a [`StatusBuilder`].
use std::{ffi::CStr, fmt};

use super::{
    codes::*,
    message,
};

/// One entry of a status vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusEntry {
    /// `isc_arg_gds` error code.
    Error(i32),
    /// `isc_arg_warning` code.
    Warning(i32),
    /// String argument, from `string`, `cstring` or `interpreted` tags.
    String(String),
    /// Numeric argument, from `number` or `win32` tags.
    Number(i32),
    /// Explicit SQLSTATE.
    SqlState(String),
    /// Any other tag with its value.
    Other { tag: i32, value: i32 },
}

impl StatusEntry {
    /// Returns `true` for entries substituted into a message template.
    pub fn is_argument(&self) -> bool {
        matches!(self, Self::String(_) | Self::Number(_))
    }
}

/// Outcome of a parsed status vector.
#[derive(Debug)]
pub enum Status {
    /// Call succeeded.
    Ok,
    /// Call succeeded with warnings.
    Warning(DatabaseError),
    /// Call failed.
    Error(DatabaseError),
}

impl Status {
    /// Convert into [`Result`], handing warning to `warn`.
    pub fn into_result(self, warn: impl FnOnce(DatabaseError)) -> Result<(), DatabaseError> {
        match self {
            Status::Ok => Ok(()),
            Status::Warning(w) => {
                warn(w);
                Ok(())
            },
            Status::Error(e) => Err(e),
        }
    }
}

/// Collect status vector entries until end tag.
#[derive(Debug, Default)]
pub struct StatusBuilder {
    entries: Vec<StatusEntry>,
}

impl StatusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an entry for given tag and numeric value.
    ///
    /// Zero codes for `gds` and `warning` tags are success markers and skipped.
    pub fn push_code(&mut self, tag: i32, value: i32) {
        match tag {
            ARG_GDS if value != 0 => self.entries.push(StatusEntry::Error(value)),
            ARG_WARNING if value != 0 => self.entries.push(StatusEntry::Warning(value)),
            ARG_GDS | ARG_WARNING => {},
            ARG_NUMBER | ARG_WIN32 => self.entries.push(StatusEntry::Number(value)),
            tag => self.entries.push(StatusEntry::Other { tag, value }),
        }
    }

    /// Push a string entry for given tag.
    pub fn push_string(&mut self, tag: i32, value: String) {
        match tag {
            ARG_SQL_STATE => self.entries.push(StatusEntry::SqlState(value)),
            _ => self.entries.push(StatusEntry::String(value)),
        }
    }

    pub fn push(&mut self, entry: StatusEntry) {
        self.entries.push(entry);
    }

    /// Finish parsing, build the error if any error or warning code collected.
    pub fn finish(self) -> Status {
        let has_error = self.entries.iter().any(|e| matches!(e, StatusEntry::Error(_)));
        let has_warning = self.entries.iter().any(|e| matches!(e, StatusEntry::Warning(_)));

        match (has_error, has_warning) {
            (true, _) => Status::Error(DatabaseError::new(self.entries)),
            (false, true) => Status::Warning(DatabaseError::new(self.entries)),
            (false, false) => Status::Ok,
        }
    }
}

/// Resolve string arguments of a native status vector.
pub trait StringResolver {
    /// Resolve a nul terminated string at `ptr`.
    fn resolve(&self, ptr: isize) -> String;

    /// Resolve a `len` bytes string at `ptr`.
    fn resolve_counted(&self, ptr: isize, len: usize) -> String;
}

/// Resolve string by dereferencing raw pointers filled by the client library.
///
/// Only valid for a status vector freshly returned by the library, the
/// strings are owned by the library and overwritten on the next call.
pub struct RawPointers;

impl StringResolver for RawPointers {
    fn resolve(&self, ptr: isize) -> String {
        if ptr == 0 {
            return String::new();
        }
        // SAFETY: client library stores pointers to nul terminated strings
        // which live until the next call on the same status vector
        unsafe { CStr::from_ptr(ptr as *const std::ffi::c_char) }
            .to_string_lossy()
            .into_owned()
    }

    fn resolve_counted(&self, ptr: isize, len: usize) -> String {
        if ptr == 0 || len == 0 {
            return String::new();
        }
        // SAFETY: `cstring` entries carry the length of the pointed buffer
        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Parse native status vector.
///
/// Parsing stops at end tag or at the end of the slice.
pub fn parse_native<R: StringResolver + ?Sized>(vector: &[isize], strings: &R) -> Status {
    let mut builder = StatusBuilder::new();
    let mut words = vector.iter().copied();

    while let Some(tag) = words.next() {
        let tag = tag as i32;
        match tag {
            ARG_END => break,
            ARG_STRING | ARG_INTERPRETED | ARG_SQL_STATE => {
                let Some(ptr) = words.next() else { break };
                builder.push_string(tag, strings.resolve(ptr));
            },
            ARG_CSTRING => {
                let (Some(len), Some(ptr)) = (words.next(), words.next()) else { break };
                builder.push_string(tag, strings.resolve_counted(ptr, len.max(0) as usize));
            },
            tag => {
                let Some(value) = words.next() else { break };
                builder.push_code(tag, value as i32);
            },
        }
    }

    builder.finish()
}

/// Structured error built from status vector.
#[derive(Clone)]
pub struct DatabaseError {
    entries: Vec<StatusEntry>,
    code: i32,
    sqlstate: String,
    message: String,
    warning: bool,
}

impl DatabaseError {
    /// Build error from parsed entries.
    pub fn new(entries: Vec<StatusEntry>) -> Self {
        let mut code = None;
        let mut warning = false;
        let mut explicit_state = None;
        let mut messages = Vec::new();

        for (i,entry) in entries.iter().enumerate() {
            match entry {
                StatusEntry::Error(c) | StatusEntry::Warning(c) => {
                    let args = entries[i + 1..]
                        .iter()
                        .take_while(|e| e.is_argument())
                        .collect::<Vec<_>>();

                    if code.is_none() {
                        warning = matches!(entry, StatusEntry::Warning(_));
                        code = match args.first() {
                            Some(StatusEntry::Number(n)) if *c == EXCEPT => Some(*n),
                            _ => Some(*c),
                        };
                    }

                    messages.push(format_message(*c, &args));
                },
                StatusEntry::SqlState(s) if explicit_state.is_none() => {
                    explicit_state = Some(s.clone());
                },
                _ => {},
            }
        }

        let first = entries.iter().find_map(|e| match e {
            StatusEntry::Error(c) | StatusEntry::Warning(c) => Some(*c),
            _ => None,
        });

        let sqlstate = match explicit_state {
            Some(s) => s,
            None => first.and_then(message::sqlstate).unwrap_or_default().to_owned(),
        };

        Self {
            message: messages.join("\n"),
            code: code.unwrap_or_default(),
            entries,
            sqlstate,
            warning,
        }
    }

    /// Build error from list of codes without arguments.
    pub fn from_codes(codes: &[i32]) -> Self {
        Self::new(codes.iter().map(|c| StatusEntry::Error(*c)).collect())
    }

    /// Build error from code with arguments.
    pub fn with_args(code: i32, args: impl IntoIterator<Item = StatusEntry>) -> Self {
        let mut entries = vec![StatusEntry::Error(code)];
        entries.extend(args);
        Self::new(entries)
    }

    /// Primary error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// SQLSTATE, empty if unknown.
    pub fn sqlstate(&self) -> &str {
        &self.sqlstate
    }

    /// Formatted multi line message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    /// Returns `true` if the first entry is a warning.
    pub fn is_warning(&self) -> bool {
        self.warning
    }

    /// Returns `true` if the first error code is classified fatal.
    pub fn is_fatal(&self) -> bool {
        let first = self.entries.iter().find_map(|e| match e {
            StatusEntry::Error(c) | StatusEntry::Warning(c) => Some(*c),
            _ => None,
        });
        first.is_some_and(message::is_fatal)
    }

    /// Returns `true` if any entry carries given code.
    pub fn contains(&self, code: i32) -> bool {
        self.entries.iter().any(|e| matches!(e, StatusEntry::Error(c) | StatusEntry::Warning(c) if *c == code))
    }
}

fn format_message(code: i32, args: &[&StatusEntry]) -> String {
    let fallback = || format!("No message for error code {code} found.");

    let Some(template) = message::template(code) else {
        return fallback();
    };

    let mut out = String::with_capacity(template.len());
    let mut used = vec![false; args.len()];
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '@' {
            out.push(ch);
            continue;
        }
        let Some(n) = chars.peek().and_then(|c| c.to_digit(10)) else {
            out.push(ch);
            continue;
        };
        chars.next();
        let idx = n as usize;
        if idx == 0 || idx > args.len() {
            return fallback();
        }
        used[idx - 1] = true;
        write_arg(&mut out, args[idx - 1]);
    }

    for (arg,used) in args.iter().zip(used) {
        if !used {
            out.push(' ');
            write_arg(&mut out, arg);
        }
    }

    out
}

fn write_arg(out: &mut String, arg: &StatusEntry) {
    match arg {
        StatusEntry::String(s) => out.push_str(s),
        StatusEntry::Number(n) => out.push_str(itoa::Buffer::new().format(*n)),
        _ => {},
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() || self.sqlstate.is_empty() {
            return f.write_str(&self.message)
        }
        write!(f, "[{}] {}", self.sqlstate, self.message)
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseError")
            .field("code", &self.code)
            .field("sqlstate", &self.sqlstate)
            .field("message", &self.message)
            .finish()
    }
}
