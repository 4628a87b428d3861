//! Engine constants.
//!
//! Values are fixed by the engine public header (`ibase.h`), names drop the
//! `isc_` prefix.

// ===== Status vector tags =====

pub const ARG_END: i32 = 0;
pub const ARG_GDS: i32 = 1;
pub const ARG_STRING: i32 = 2;
pub const ARG_CSTRING: i32 = 3;
pub const ARG_NUMBER: i32 = 4;
pub const ARG_INTERPRETED: i32 = 5;
pub const ARG_VMS: i32 = 6;
pub const ARG_UNIX: i32 = 7;
pub const ARG_DOMAIN: i32 = 8;
pub const ARG_DOS: i32 = 9;
pub const ARG_MPEXL: i32 = 10;
pub const ARG_MPEXL_IPC: i32 = 11;
pub const ARG_NEXT_MACH: i32 = 15;
pub const ARG_NETWARE: i32 = 16;
pub const ARG_WIN32: i32 = 17;
pub const ARG_WARNING: i32 = 18;
pub const ARG_SQL_STATE: i32 = 19;

/// Status vector length used by the native client.
pub const STATUS_LENGTH: usize = 20;

// ===== Error codes =====

pub const ARITH_EXCEPT: i32 = 335544321;
pub const BAD_DB_HANDLE: i32 = 335544324;
pub const BAD_REQ_HANDLE: i32 = 335544327;
pub const BAD_SEGSTR_HANDLE: i32 = 335544328;
pub const BAD_TRANS_HANDLE: i32 = 335544332;
pub const BUGCHECK: i32 = 335544333;
pub const CONVERT_ERROR: i32 = 335544334;
pub const DB_CORRUPT: i32 = 335544335;
pub const DEADLOCK: i32 = 335544336;
pub const IO_ERROR: i32 = 335544344;
pub const LOCK_CONFLICT: i32 = 335544345;
pub const NOT_VALID: i32 = 335544347;
pub const NO_DUP: i32 = 335544349;
pub const NO_META_UPDATE: i32 = 335544351;
pub const NO_PRIV: i32 = 335544352;
pub const OPEN_TRANS: i32 = 335544357;
pub const SEGMENT: i32 = 335544366;
pub const SEGSTR_EOF: i32 = 335544367;
pub const STREAM_EOF: i32 = 335544374;
pub const UNAVAILABLE: i32 = 335544375;
pub const RANDOM: i32 = 335544382;
pub const CONNECT_REJECT: i32 = 335544421;
pub const SQLERR: i32 = 335544436;
pub const UPDATE_CONFLICT: i32 = 335544451;
pub const INVALID_DIMENSION: i32 = 335544458;
pub const FOREIGN_KEY: i32 = 335544466;
pub const LOGIN: i32 = 335544472;
pub const SHUTINPROG: i32 = 335544506;
pub const EXCEPT: i32 = 335544517;
pub const SHUTDOWN: i32 = 335544528;
pub const DSQL_ERROR: i32 = 335544569;
pub const DSQL_COMMAND_ERR: i32 = 335544570;
pub const DSQL_CURSOR_CLOSE_ERR: i32 = 335544577;
pub const DSQL_SQLDA_ERR: i32 = 335544583;
pub const DSQL_TOKEN_UNK_ERR: i32 = 335544634;
pub const LOST_DB_CONNECTION: i32 = 335544648;
pub const SING_SELECT_ERR: i32 = 335544652;
pub const UNIQUE_KEY_VIOLATION: i32 = 335544665;
pub const NETWORK_ERROR: i32 = 335544721;
pub const NET_CONNECT_ERR: i32 = 335544722;
pub const NET_READ_ERR: i32 = 335544726;
pub const NET_WRITE_ERR: i32 = 335544727;
pub const NETWORK_LOST: i32 = 335544741;
pub const CANCELLED: i32 = 335544794;
pub const STACK_TRACE: i32 = 335544842;
pub const EXCEPT2: i32 = 335544848;
pub const ATT_SHUTDOWN: i32 = 335544856;
pub const DATETIME_RANGE_EXCEEDED: i32 = 335544913;
pub const STRING_TRUNCATION: i32 = 335544914;

// ===== SQL types =====

pub const SQL_TEXT: i16 = 452;
pub const SQL_VARYING: i16 = 448;
pub const SQL_SHORT: i16 = 500;
pub const SQL_LONG: i16 = 496;
pub const SQL_FLOAT: i16 = 482;
pub const SQL_DOUBLE: i16 = 480;
pub const SQL_D_FLOAT: i16 = 530;
pub const SQL_TIMESTAMP: i16 = 510;
pub const SQL_BLOB: i16 = 520;
pub const SQL_ARRAY: i16 = 540;
pub const SQL_QUAD: i16 = 550;
pub const SQL_TYPE_TIME: i16 = 560;
pub const SQL_TYPE_DATE: i16 = 570;
pub const SQL_INT64: i16 = 580;
pub const SQL_BOOLEAN: i16 = 32764;
pub const SQL_NULL: i16 = 32766;

// ===== BLR =====

pub const BLR_TEXT: u8 = 14;
pub const BLR_TEXT2: u8 = 15;
pub const BLR_SHORT: u8 = 7;
pub const BLR_LONG: u8 = 8;
pub const BLR_QUAD: u8 = 9;
pub const BLR_INT64: u8 = 16;
pub const BLR_FLOAT: u8 = 10;
pub const BLR_DOUBLE: u8 = 27;
pub const BLR_D_FLOAT: u8 = 11;
pub const BLR_TIMESTAMP: u8 = 35;
pub const BLR_VARYING: u8 = 37;
pub const BLR_VARYING2: u8 = 38;
pub const BLR_BLOB: u16 = 261;
pub const BLR_CSTRING: u8 = 40;
pub const BLR_CSTRING2: u8 = 41;
pub const BLR_BLOB_ID: u8 = 45;
pub const BLR_SQL_DATE: u8 = 12;
pub const BLR_SQL_TIME: u8 = 13;
pub const BLR_BOOL: u8 = 23;

pub const BLR_VERSION5: u8 = 5;
pub const BLR_BEGIN: u8 = 2;
pub const BLR_MESSAGE: u8 = 4;
pub const BLR_EOC: u8 = 76;
pub const BLR_END: u8 = 255;

// ===== SDL =====

pub const SDL_VERSION1: u8 = 1;
pub const SDL_EOC: u8 = 255;
pub const SDL_RELATION: u8 = 2;
pub const SDL_FIELD: u8 = 4;
pub const SDL_STRUCT: u8 = 6;
pub const SDL_VARIABLE: u8 = 7;
pub const SDL_SCALAR: u8 = 8;
pub const SDL_TINY_INTEGER: u8 = 9;
pub const SDL_SHORT_INTEGER: u8 = 10;
pub const SDL_LONG_INTEGER: u8 = 11;
pub const SDL_DO2: u8 = 34;
pub const SDL_DO1: u8 = 35;
pub const SDL_ELEMENT: u8 = 36;

/// Maximum array dimensions the engine accepts.
pub const MAX_DIMENSIONS: usize = 16;

// ===== Info items =====

pub const INFO_END: u8 = 1;
pub const INFO_TRUNCATED: u8 = 2;
pub const INFO_ERROR: u8 = 3;

pub const INFO_SQL_SELECT: u8 = 4;
pub const INFO_SQL_BIND: u8 = 5;
pub const INFO_SQL_NUM_VARIABLES: u8 = 6;
pub const INFO_SQL_DESCRIBE_VARS: u8 = 7;
pub const INFO_SQL_DESCRIBE_END: u8 = 8;
pub const INFO_SQL_SQLDA_SEQ: u8 = 9;
pub const INFO_SQL_MESSAGE_SEQ: u8 = 10;
pub const INFO_SQL_TYPE: u8 = 11;
pub const INFO_SQL_SUB_TYPE: u8 = 12;
pub const INFO_SQL_SCALE: u8 = 13;
pub const INFO_SQL_LENGTH: u8 = 14;
pub const INFO_SQL_NULL_IND: u8 = 15;
pub const INFO_SQL_FIELD: u8 = 16;
pub const INFO_SQL_RELATION: u8 = 17;
pub const INFO_SQL_OWNER: u8 = 18;
pub const INFO_SQL_ALIAS: u8 = 19;
pub const INFO_SQL_SQLDA_START: u8 = 20;
pub const INFO_SQL_STMT_TYPE: u8 = 21;
pub const INFO_SQL_GET_PLAN: u8 = 22;
pub const INFO_SQL_RECORDS: u8 = 23;
pub const INFO_SQL_BATCH_FETCH: u8 = 24;
pub const INFO_SQL_RELATION_ALIAS: u8 = 25;

pub const INFO_REQ_SELECT_COUNT: u8 = 13;
pub const INFO_REQ_INSERT_COUNT: u8 = 14;
pub const INFO_REQ_UPDATE_COUNT: u8 = 15;
pub const INFO_REQ_DELETE_COUNT: u8 = 16;

pub const INFO_DB_ID: u8 = 4;
pub const INFO_ISC_VERSION: u8 = 12;
pub const INFO_FIREBIRD_VERSION: u8 = 103;

// ===== Statement kinds =====

pub const STMT_SELECT: i32 = 1;
pub const STMT_INSERT: i32 = 2;
pub const STMT_UPDATE: i32 = 3;
pub const STMT_DELETE: i32 = 4;
pub const STMT_DDL: i32 = 5;
pub const STMT_GET_SEGMENT: i32 = 6;
pub const STMT_PUT_SEGMENT: i32 = 7;
pub const STMT_EXEC_PROCEDURE: i32 = 8;
pub const STMT_START_TRANS: i32 = 9;
pub const STMT_COMMIT: i32 = 10;
pub const STMT_ROLLBACK: i32 = 11;
pub const STMT_SELECT_FOR_UPD: i32 = 12;
pub const STMT_SET_GENERATOR: i32 = 13;
pub const STMT_SAVEPOINT: i32 = 14;

// ===== Free options =====

pub const DSQL_CLOSE: u16 = 1;
pub const DSQL_DROP: u16 = 2;

// ===== Buffer sizes =====

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8192;
pub const ROWS_AFFECTED_BUFFER_SIZE: usize = 34;
pub const STATEMENT_TYPE_BUFFER_SIZE: usize = 8;
/// Segment length is a 16 bit word.
pub const MAX_SEGMENT_SIZE: usize = u16::MAX as usize;
pub const PREPARE_INFO_BUFFER_SIZE: usize = 32768;

// ===== Blob flags =====

pub const RBL_EOF: u8 = 1;
pub const RBL_SEGMENT: u8 = 2;
pub const RBL_EOF_PENDING: u8 = 4;
pub const RBL_CREATE: u8 = 8;

// ===== Dialects =====

pub const SQL_DIALECT_V5: u16 = 1;
pub const SQL_DIALECT_V6_TRANSITION: u16 = 2;
pub const SQL_DIALECT_CURRENT: u16 = 3;

// ===== DPB =====

pub const DPB_VERSION1: u8 = 1;
pub const DPB_USER_NAME: u8 = 28;
pub const DPB_PASSWORD: u8 = 29;
pub const DPB_LC_CTYPE: u8 = 48;
pub const DPB_DUMMY_PACKET_INTERVAL: u8 = 58;
pub const DPB_SQL_ROLE_NAME: u8 = 60;
pub const DPB_SQL_DIALECT: u8 = 63;

// ===== TPB =====

pub const TPB_VERSION3: u8 = 3;
pub const TPB_CONSISTENCY: u8 = 1;
pub const TPB_CONCURRENCY: u8 = 2;
pub const TPB_SHARED: u8 = 3;
pub const TPB_PROTECTED: u8 = 4;
pub const TPB_EXCLUSIVE: u8 = 5;
pub const TPB_WAIT: u8 = 6;
pub const TPB_NOWAIT: u8 = 7;
pub const TPB_READ: u8 = 8;
pub const TPB_WRITE: u8 = 9;
pub const TPB_LOCK_READ: u8 = 10;
pub const TPB_LOCK_WRITE: u8 = 11;
pub const TPB_IGNORE_LIMBO: u8 = 14;
pub const TPB_READ_COMMITTED: u8 = 15;
pub const TPB_AUTOCOMMIT: u8 = 16;
pub const TPB_REC_VERSION: u8 = 17;
pub const TPB_NO_REC_VERSION: u8 = 18;
pub const TPB_NO_AUTO_UNDO: u8 = 20;
pub const TPB_LOCK_TIMEOUT: u8 = 21;

// ===== BPB =====

pub const BPB_VERSION1: u8 = 1;

// ===== Cancel =====

pub const FB_CANCEL_DISABLE: u16 = 1;
pub const FB_CANCEL_ENABLE: u16 = 2;
pub const FB_CANCEL_RAISE: u16 = 3;
pub const FB_CANCEL_ABORT: u16 = 4;
