//! Typed descriptions of raw T-SQL commands.
//!
//! Given a command's statement text and a connection to the target server,
//! this crate produces an immutable [`CommandDescriptor`]: the command's
//! parameters with their directions, its output columns and the overall
//! output shape, exactly as SQL Server's own metadata functions report
//! them. A descriptor is what a code emitter consumes to generate a typed
//! data-access layer; nothing here parses T-SQL or executes the described
//! command.
//!
//! [`CommandProvider`] is the usual entry point: it memoizes descriptors
//! per command, reuses type catalogs per server version, and accepts
//! invalidation signals from an external file watcher. One-shot use goes
//! through [`describe`].
//!
//! The connection itself is abstracted behind [`connection::Client`], a
//! blocking trait any TDS driver can implement; [`testing`] ships a
//! scripted implementation for writing tests without a server.

#[macro_use]
mod error;

pub use cache::{CacheKey, DescriptorCache, InvalidationHandle};
pub use catalog::{TypeCatalog, TypeCatalogRegistry};
pub use column::Column;
pub use connection::{Client, Connect, ServerVersion, Session, MINIMUM_SERVER_VERSION};
pub use descriptor::{describe, CommandDescriptor, SourceInfo};
pub use error::{EngineError, Error, Result};
pub use options::{
    CommandInput, CommandOptions, ConnectionTarget, ResultType, SourceId, TextSource,
};
pub use output::{Cardinality, OutputDescriptor, OutputShape};
pub use parameter::{Direction, Parameter};
pub use provider::CommandProvider;
pub use row::{RawColumn, ResultSet, Row};
pub use tvp::{TableType, TvpColumn, TvpRow};
pub use type_info::{LengthKind, TypeId, TypeInfo};
pub use value::SqlValue;
pub use watch::{SourceWatcher, WatchGuard};

mod cache;
mod catalog;
mod column;
pub mod connection;
mod descriptor;
mod options;
mod output;
mod parameter;
mod provider;
mod row;
mod tvp;
mod type_info;
mod value;
mod watch;

#[cfg(feature = "offline")]
pub mod offline;

pub mod testing;
