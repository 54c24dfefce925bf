//! Error types for relmap operations.

use std::fmt;

/// The primary error type for all relmap operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, lost, pool checkout)
    Connection(ConnectionError),
    /// Query execution errors reported by the driver
    Query(QueryError),
    /// Value conversion errors
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Pool errors
    Pool(PoolError),
    /// Schema check errors
    Schema(SchemaError),
    /// Malformed model or relation declaration
    Config(ConfigError),
    /// A single-row read found nothing
    NoRows,
    /// Statement ran but touched an unexpected number of rows
    RowsAffected(RowsAffectedError),
    /// Destination has the wrong shape for the result
    Shape(ShapeError),
    /// Template placeholder could not be resolved
    Param(ParamError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost or unusable
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Lock contention
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// BEGIN while a transaction is already open
    AlreadyActive,
    /// COMMIT/ROLLBACK with no open transaction
    NotActive,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// All `max_open` connections are checked out
    Exhausted,
    /// Pool has been closed
    Closed,
    /// Invalid pool settings
    Config,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table has no columns or does not exist
    TableNotFound,
    /// A mapped field has no backing column
    ColumnNotFound,
    /// Table was never registered
    NotRegistered,
}

#[derive(Debug)]
pub struct ConfigError {
    /// Type whose declaration is malformed
    pub model: &'static str,
    /// Offending field, when the problem is field-local
    pub field: Option<&'static str>,
    pub message: String,
}

/// Affected-row assertion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowsAffectedError {
    pub sql: String,
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug)]
pub struct ShapeError {
    pub expected: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ParamError {
    /// Placeholder name that did not resolve
    pub name: String,
    /// Original template text
    pub statement: String,
}

impl Error {
    /// Build a configuration error for `model`, optionally pinned to one field.
    pub fn config(
        model: &'static str,
        field: Option<&'static str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Config(ConfigError {
            model,
            field,
            message: message.into(),
        })
    }

    /// Build a shape error.
    pub fn shape(expected: &'static str, message: impl Into<String>) -> Self {
        Error::Shape(ShapeError {
            expected,
            message: message.into(),
        })
    }

    /// Is this the "not found" sentinel from a single-row read?
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Error::NoRows)
    }

    /// Is this an affected-row assertion failure rather than an execution failure?
    pub fn is_rows_affected_mismatch(&self) -> bool {
        matches!(self, Error::RowsAffected(_))
    }

    /// Is this a configuration error raised while building a descriptor?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::RowsAffected(r) => Some(&r.sql),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::NoRows => write!(f, "no rows in result set"),
            Error::RowsAffected(e) => write!(f, "{}", e),
            Error::Shape(e) => write!(f, "Shape error: expected {}: {}", e.expected, e.message),
            Error::Param(e) => write!(f, "{}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{}.{}: {}", self.model, field, self.message),
            None => write!(f, "{}: {}", self.model, self.message),
        }
    }
}

impl fmt::Display for RowsAffectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query [{}] should only affect {} rows, really affect {} rows",
            self.sql, self.expected, self.actual
        )
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing parameter '{}' for statement [{}]",
            self.name, self.statement
        )
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<RowsAffectedError> for Error {
    fn from(err: RowsAffectedError) -> Self {
        Error::RowsAffected(err)
    }
}

impl From<ParamError> for Error {
    fn from(err: ParamError) -> Self {
        Error::Param(err)
    }
}

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;
