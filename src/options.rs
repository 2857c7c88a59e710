use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// How the rows of a described command should be surfaced to the caller.
///
/// `Records` and `Tuples` are materialized row shapes (named fields vs.
/// positional); `Table` asks for a whole mutable table value; `Cursor`
/// bypasses introspection of the select list and hands back the raw
/// forward-only reader.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ResultType {
    #[default]
    Records,
    Tuples,
    Table,
    Cursor,
}

/// Options that shape a described command.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandOptions {
    pub result_type: ResultType,

    /// The statement yields at most one row; composite shapes collapse
    /// from a sequence to an optional single value.
    pub single_row: bool,

    /// Every input parameter accepts an absent value, coerced to `NULL`
    /// at bind time regardless of the underlying column's nullability.
    pub all_parameters_optional: bool,
}

/// Where the statement text comes from.
///
/// A leading `@` in the supplied text marks an external file reference;
/// anything else is the statement itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Inline(String),
    Path(PathBuf),
}

impl TextSource {
    /// Applies the `@file` convention to raw input text.
    pub fn parse(text: &str) -> TextSource {
        match text.trim_start().strip_prefix('@') {
            Some(path) => TextSource::Path(PathBuf::from(path.trim())),
            None => TextSource::Inline(text.to_owned()),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TextSource::Path(_))
    }

    /// Produces the statement text and the identity it is cached and
    /// watched under. File sources are read eagerly; a vanished or
    /// unreadable file fails the whole build.
    pub fn resolve(&self) -> Result<ResolvedText> {
        match self {
            TextSource::Inline(text) => Ok(ResolvedText {
                text: text.clone(),
                id: SourceId::Text(hash_string(text)),
            }),

            TextSource::Path(path) => {
                // Canonicalize so that the watch identity is stable no
                // matter how the caller spelled the path.
                let canonical = path.canonicalize().map_err(Error::Io)?;
                let text = fs::read_to_string(&canonical).map_err(Error::Io)?;

                Ok(ResolvedText {
                    text,
                    id: SourceId::File(canonical),
                })
            }
        }
    }
}

/// Statement text with the identity it resolves to.
#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub(crate) text: String,
    pub(crate) id: SourceId,
}

impl ResolvedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }
}

/// Identity of a command's text source: the unit of caching and of
/// invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceId {
    /// Hex SHA-256 of inline statement text.
    Text(String),
    /// Canonical path of a file source.
    File(PathBuf),
}

/// Which server a command is described against.
///
/// Resolution of a named entry against its configuration file is the
/// caller's concern; this crate only carries the reference, and the pair
/// participates in the cache key so commands against different servers
/// never share a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionTarget {
    /// A literal connection URL.
    Url(String),
    /// A named entry in a configuration file.
    Named { name: String, config: PathBuf },
}

impl ConnectionTarget {
    /// Fails on a blank target or an unparseable URL.
    ///
    /// Called at the start of every descriptor build; a target that fails
    /// here aborts the build before any connection is opened.
    pub fn validate(&self) -> Result<()> {
        match self {
            ConnectionTarget::Url(raw) => {
                if raw.trim().is_empty() {
                    return Err(Error::EmptyConnectionTarget);
                }

                raw.parse::<url::Url>()
                    .map(drop)
                    .map_err(Error::InvalidConnectionTarget)
            }

            ConnectionTarget::Named { name, .. } => {
                if name.trim().is_empty() {
                    return Err(Error::EmptyConnectionTarget);
                }

                Ok(())
            }
        }
    }
}

/// The declarative input for one described command.
#[derive(Debug, Clone)]
pub struct CommandInput {
    /// Name of the generated surface, e.g. the type the emitter renders.
    pub name: String,
    pub source: TextSource,
    pub target: ConnectionTarget,
    pub options: CommandOptions,
}

impl CommandInput {
    pub fn new(name: impl Into<String>, text: &str, target: ConnectionTarget) -> Self {
        Self {
            name: name.into(),
            source: TextSource::parse(text),
            target,
            options: CommandOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }
}

pub(crate) fn hash_string(text: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(text.as_bytes()))
}
