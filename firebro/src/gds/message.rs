//! Error message templates, SQLSTATE mapping and fatal classification.
use super::codes::*;

/// Message template for given error code.
///
/// Placeholders are `@1` to `@9`, substituted with status vector arguments.
pub fn template(code: i32) -> Option<&'static str> {
    let i = MESSAGES.binary_search_by_key(&code, |(c, _)| *c).ok()?;
    Some(MESSAGES[i].1)
}

/// SQLSTATE derived from error code when the status vector does not carry one.
pub fn sqlstate(code: i32) -> Option<&'static str> {
    let i = SQLSTATES.binary_search_by_key(&code, |(c, _)| *c).ok()?;
    Some(SQLSTATES[i].1)
}

/// Returns `true` if error with given code leave the attachment unusable.
pub fn is_fatal(code: i32) -> bool {
    FATAL.binary_search(&code).is_ok()
}

/// Sorted ascending.
const FATAL: &[i32] = &[
    BAD_DB_HANDLE,
    BUGCHECK,
    DB_CORRUPT,
    IO_ERROR,
    UNAVAILABLE,
    CONNECT_REJECT,
    SHUTDOWN,
    LOST_DB_CONNECTION,
    NETWORK_ERROR,
    NET_CONNECT_ERR,
    NET_READ_ERR,
    NET_WRITE_ERR,
    NETWORK_LOST,
    ATT_SHUTDOWN,
];

/// Sorted ascending by code.
const MESSAGES: &[(i32, &str)] = &[
    (ARITH_EXCEPT, "arithmetic exception, numeric overflow, or string truncation"),
    (BAD_DB_HANDLE, "invalid database handle (no active connection)"),
    (BAD_REQ_HANDLE, "invalid request handle"),
    (BAD_SEGSTR_HANDLE, "invalid BLOB handle"),
    (BAD_TRANS_HANDLE, "invalid transaction handle (expecting explicit transaction start)"),
    (BUGCHECK, "internal Firebird consistency check (@1)"),
    (CONVERT_ERROR, "conversion error from string \"@1\""),
    (DB_CORRUPT, "database file appears corrupt (@1)"),
    (DEADLOCK, "deadlock"),
    (IO_ERROR, "I/O error during \"@1\" operation for file \"@2\""),
    (LOCK_CONFLICT, "lock conflict on no wait transaction"),
    (NOT_VALID, "validation error for column @1, value \"@2\""),
    (NO_DUP, "attempt to store duplicate value (visible to active transactions) in unique index \"@1\""),
    (NO_META_UPDATE, "unsuccessful metadata update"),
    (NO_PRIV, "no permission for @1 access to @2 @3"),
    (OPEN_TRANS, "cannot disconnect database with open transactions (@1 active)"),
    (SEGMENT, "segment buffer length shorter than expected"),
    (SEGSTR_EOF, "attempted retrieval of more segments than exist"),
    (STREAM_EOF, "attempt to fetch past the last record in a record stream"),
    (UNAVAILABLE, "unavailable database"),
    (RANDOM, "@1"),
    (CONNECT_REJECT, "connection rejected by remote interface"),
    (SQLERR, "SQL error code = @1"),
    (UPDATE_CONFLICT, "update conflicts with concurrent update"),
    (INVALID_DIMENSION, "column not array or invalid dimensions (expected @1, encountered @2)"),
    (FOREIGN_KEY, "violation of FOREIGN KEY constraint \"@1\" on table \"@2\""),
    (LOGIN, "Your user name and password are not defined. Ask your database administrator to set up a Firebird login."),
    (SHUTINPROG, "database @1 shutdown in progress"),
    (EXCEPT, "exception @1"),
    (SHUTDOWN, "database @1 shutdown"),
    (DSQL_ERROR, "Dynamic SQL Error"),
    (DSQL_COMMAND_ERR, "Invalid command"),
    (DSQL_CURSOR_CLOSE_ERR, "Attempt to reclose a closed cursor"),
    (DSQL_SQLDA_ERR, "SQLDA error"),
    (DSQL_TOKEN_UNK_ERR, "Token unknown - line @1, column @2"),
    (LOST_DB_CONNECTION, "Connection lost to pipe server"),
    (SING_SELECT_ERR, "multiple rows in singleton select"),
    (UNIQUE_KEY_VIOLATION, "violation of PRIMARY or UNIQUE KEY constraint \"@1\" on table \"@2\""),
    (NETWORK_ERROR, "Unable to complete network request to host \"@1\"."),
    (NET_CONNECT_ERR, "Failed to establish a connection."),
    (NET_READ_ERR, "Error reading data from the connection."),
    (NET_WRITE_ERR, "Error writing data to the connection."),
    (NETWORK_LOST, "connection lost to database"),
    (CANCELLED, "operation was cancelled"),
    (STACK_TRACE, "@1"),
    (EXCEPT2, "exception @1"),
    (ATT_SHUTDOWN, "connection shutdown"),
    (DATETIME_RANGE_EXCEEDED, "value exceeds the range for valid timestamps"),
    (STRING_TRUNCATION, "string right truncation"),
];

/// Sorted ascending by code.
const SQLSTATES: &[(i32, &str)] = &[
    (ARITH_EXCEPT, "22000"),
    (BAD_DB_HANDLE, "08003"),
    (BAD_TRANS_HANDLE, "25000"),
    (CONVERT_ERROR, "22018"),
    (DEADLOCK, "40001"),
    (LOCK_CONFLICT, "40001"),
    (NOT_VALID, "23000"),
    (NO_DUP, "23000"),
    (NO_PRIV, "28000"),
    (OPEN_TRANS, "25000"),
    (UPDATE_CONFLICT, "40001"),
    (FOREIGN_KEY, "23000"),
    (LOGIN, "28000"),
    (DSQL_ERROR, "42000"),
    (DSQL_CURSOR_CLOSE_ERR, "24000"),
    (DSQL_TOKEN_UNK_ERR, "42000"),
    (SING_SELECT_ERR, "21000"),
    (UNIQUE_KEY_VIOLATION, "23000"),
    (NETWORK_ERROR, "08006"),
    (NET_CONNECT_ERR, "08001"),
    (NET_READ_ERR, "08006"),
    (NET_WRITE_ERR, "08006"),
    (NETWORK_LOST, "08003"),
    (CANCELLED, "HY008"),
    (DATETIME_RANGE_EXCEEDED, "22008"),
    (STRING_TRUNCATION, "22001"),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tables_sorted() {
        assert!(FATAL.windows(2).all(|w| w[0] < w[1]));
        assert!(MESSAGES.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(SQLSTATES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn lookup() {
        assert_eq!(template(DEADLOCK), Some("deadlock"));
        assert_eq!(template(1), None);
        assert_eq!(sqlstate(STRING_TRUNCATION), Some("22001"));
        assert!(is_fatal(NETWORK_LOST));
        assert!(!is_fatal(DEADLOCK));
    }
}
