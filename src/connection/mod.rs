use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::row::ResultSet;

mod describe;

pub use describe::{Introspection, IntrospectedColumn, SuggestedParameter};

/// The oldest release carrying both metadata functions the describe flow
/// drives (SQL Server 2012).
pub const MINIMUM_SERVER_VERSION: ServerVersion = ServerVersion {
    major: 11,
    minor: 0,
    build: 0,
};

/// A blocking query-execution primitive over one server connection.
///
/// This is the seam to the external network driver. Everything this crate
/// asks of a server goes through [`query`](Client::query); the driver is
/// responsible for the wire protocol, authentication and pooling.
pub trait Client {
    /// Executes a batch and buffers its first result set.
    ///
    /// A batch that produces no result set at all returns an empty
    /// [`ResultSet`] (no header, no rows). A server-raised error surfaces
    /// as [`Error::Engine`].
    fn query(&mut self, sql: &str) -> Result<ResultSet>;
}

/// Opens client connections for a connection target.
///
/// Implemented by the external driver; the provider uses it to open one
/// short-lived connection per descriptor actually built.
pub trait Connect {
    type Client: Client;

    fn connect(&self, target: &crate::options::ConnectionTarget) -> Result<Self::Client>;
}

/// A SQL Server version as reported by `SERVERPROPERTY('ProductVersion')`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(4, '.');

        let mut next = || -> Result<u16> {
            parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| err_protocol!("malformed server version `{s}`"))
        };

        Ok(ServerVersion {
            major: next()?,
            minor: next()?,
            // The trailing revision component is noise; versions compare
            // fine without it.
            build: next()?,
        })
    }
}

impl Display for ServerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// A short-lived introspection session over one established connection.
///
/// Establishing verifies the server version; the two describe primitives
/// and the raw catalog fetch then run over the same connection. Sessions
/// are cheap and single-purpose: one per descriptor build.
#[derive(Debug)]
pub struct Session<'c, C: Client> {
    client: &'c mut C,
    version: ServerVersion,
}

impl<'c, C: Client> Session<'c, C> {
    /// Queries the server version and fails fast when the server predates
    /// the metadata functions the describe flow relies on.
    pub fn establish(client: &'c mut C) -> Result<Self> {
        let rs = client.query(
            "SELECT CAST(SERVERPROPERTY('ProductVersion') AS nvarchar(128)) AS product_version",
        )?;

        let row = rs
            .rows
            .first()
            .ok_or_else(|| err_protocol!("server returned no product version"))?;

        let version: ServerVersion = row.try_get_str(0)?.parse()?;

        if version < MINIMUM_SERVER_VERSION {
            return Err(Error::UnsupportedServerVersion {
                version,
                minimum: MINIMUM_SERVER_VERSION,
            });
        }

        tracing::debug!(%version, "established introspection session");

        Ok(Self { client, version })
    }

    pub fn version(&self) -> ServerVersion {
        self.version
    }

    /// Raw passthrough used by the catalog queries.
    pub(crate) fn fetch(&mut self, sql: &str) -> Result<ResultSet> {
        self.client.query(sql)
    }
}
