use std::io;
use std::result::Result as StdResult;

use crate::connection::ServerVersion;

/// A specialized `Result` type for this crate.
pub type Result<T> = StdResult<T, Error>;

/// Represents all the ways describing a command can fail.
///
/// Every variant is fatal for the build that raised it: no descriptor is
/// published or cached, and nothing is retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error raised by the server while executing a metadata query.
    #[error("error returned from the server: {0}")]
    Engine(#[source] EngineError),

    /// Error communicating with the server.
    #[error("error communicating with the server: {0}")]
    Io(#[from] io::Error),

    /// Unexpected or invalid metadata encountered while describing a command.
    ///
    /// This indicates the server broke the metadata contract (for example a
    /// parameter row without the `@` sigil) or there is a bug in the client
    /// driver underneath.
    #[error("encountered unexpected or invalid metadata: {0}")]
    Protocol(String),

    /// The server is older than the oldest release that carries both
    /// metadata functions this crate relies on.
    #[error("server version {version} is not supported; {minimum} or newer is required")]
    UnsupportedServerVersion {
        version: ServerVersion,
        minimum: ServerVersion,
    },

    /// A type id reported by the server has no mapping in the type catalog.
    #[error(
        "no type mapping for {context}: system type id {type_id}, user type `{}`",
        .udt_name.as_deref().unwrap_or("<builtin>")
    )]
    UnmappedType {
        /// `sys.types.system_type_id` as reported by the server.
        type_id: u8,
        /// Schema-qualified user-defined type name, if the id points at one.
        udt_name: Option<String>,
        /// The parameter or column that asked for the mapping.
        context: String,
    },

    /// The connection target was blank.
    #[error("connection target is empty; provide a connection URL or a named configuration entry")]
    EmptyConnectionTarget,

    /// The connection URL could not be parsed.
    #[error("invalid connection URL: {0}")]
    InvalidConnectionTarget(#[source] url::ParseError),

    /// The result set contains a column the server did not name.
    ///
    /// Unnamed columns cannot be bound to record fields; alias the
    /// expression (`SELECT <expr> AS name`).
    #[error("column {ordinal} of the result set has no name; add an alias to the select list")]
    EmptyColumnName { ordinal: usize },

    /// Result-set introspection failed through both the primary metadata
    /// function and the fallback.
    ///
    /// Carries the error reported by the primary function, which names the
    /// actual defect in the statement.
    #[error("could not introspect the result set: {0}")]
    SchemaIntrospectionFailed(#[source] EngineError),

    /// A row bound to a table-valued parameter has the wrong number of
    /// values for the table type's column list.
    #[error("table type `{type_name}` has {expected} columns, but the row carries {got} values")]
    TvpArityMismatch {
        type_name: String,
        expected: usize,
        got: usize,
    },

    /// Two columns of a record-shaped result set share a name.
    ///
    /// Records address fields by name; alias one of the columns. Tuple and
    /// table shapes address by position and accept duplicates.
    #[error("duplicate column name `{name}` at ordinals {first} and {second} in a record result")]
    DuplicateColumn {
        name: String,
        first: usize,
        second: usize,
    },

    /// A saved descriptor file could not be parsed.
    #[cfg(feature = "offline")]
    #[error("invalid saved command data: {0}")]
    OfflineData(#[from] serde_json::Error),
}

impl Error {
    #[inline]
    pub(crate) fn protocol(err: impl std::fmt::Display) -> Self {
        Error::Protocol(err.to_string())
    }
}

/// An error raised by the server, as surfaced through a metadata function
/// or an `ERROR` token on the wire.
#[derive(Debug, Clone, thiserror::Error)]
#[error("#{number} (severity {severity}): {message}")]
pub struct EngineError {
    /// Server-assigned error number, e.g. 207 for an invalid column name.
    pub number: i32,
    pub severity: u8,
    pub message: String,
}

impl EngineError {
    pub fn new(number: i32, severity: u8, message: impl Into<String>) -> Self {
        Self {
            number,
            severity,
            message: message.into(),
        }
    }
}

impl From<EngineError> for Error {
    #[inline]
    fn from(error: EngineError) -> Self {
        Error::Engine(error)
    }
}

// Format an error message as a `Protocol` error
macro_rules! err_protocol {
    ($expr:expr) => {
        $crate::error::Error::Protocol($expr.into())
    };

    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Protocol(format!($fmt, $($arg)*))
    };
}
