use std::fmt::{self, Display, Formatter};

use crate::catalog::TypeCatalogRegistry;
use crate::column::Column;
use crate::connection::{Client, ServerVersion, Session};
use crate::error::{Error, Result};
use crate::options::{CommandInput, ResolvedText, ResultType, SourceId};
use crate::output::{select_shape, OutputDescriptor, OutputShape};
use crate::parameter::{self, Direction, Parameter};

/// Where a descriptor's statement text came from and which server it was
/// described against.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceInfo {
    pub(crate) id: SourceId,
    pub(crate) server_version: ServerVersion,
}

impl SourceInfo {
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }
}

/// The immutable product of describing one command: its parameters in
/// declaration order and the shape of its output.
///
/// A descriptor never changes once built; invalidation replaces the cached
/// instance with a freshly built one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandDescriptor {
    pub(crate) name: String,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) output: OutputDescriptor,
    pub(crate) source: SourceInfo,
}

impl CommandDescriptor {
    /// The declared name of the generated surface.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn output(&self) -> &OutputDescriptor {
        &self.output
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }
}

impl Display for CommandDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} parameter{}, {}",
            self.name,
            self.parameters.len(),
            if self.parameters.len() == 1 { "" } else { "s" },
            self.output.shape(),
        )
    }
}

impl Display for OutputShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OutputShape::RowsAffected => f.write_str("affected row count"),
            OutputShape::Scalar(column) => write!(f, "scalar {}", column.type_info()),
            OutputShape::Record(columns) => write!(f, "record of {} columns", columns.len()),
            OutputShape::Tuple(columns) => write!(f, "tuple of {} columns", columns.len()),
            OutputShape::Table(columns) => write!(f, "table of {} columns", columns.len()),
            OutputShape::Cursor => f.write_str("raw cursor"),
        }
    }
}

/// Describes a command over an already-open connection.
///
/// Resolves the text source, validates the connection target, establishes
/// the introspection session and assembles the descriptor. Any failure
/// aborts the whole build; no partial descriptor is ever produced.
///
/// Callers that want caching and file-watch registration go through
/// [`CommandProvider`](crate::provider::CommandProvider) instead, which
/// ends up here on a cache miss.
pub fn describe<C: Client>(
    client: &mut C,
    catalogs: &TypeCatalogRegistry,
    input: &CommandInput,
) -> Result<CommandDescriptor> {
    input.target.validate()?;
    let resolved = input.source.resolve()?;

    describe_resolved(client, catalogs, input, &resolved)
}

pub(crate) fn describe_resolved<C: Client>(
    client: &mut C,
    catalogs: &TypeCatalogRegistry,
    input: &CommandInput,
    resolved: &ResolvedText,
) -> Result<CommandDescriptor> {
    let mut session = Session::establish(client)?;
    let catalog = catalogs.get_or_build(&mut session)?;

    let suggested = session.describe_parameters(&resolved.text)?;
    let mut parameters = Vec::with_capacity(suggested.len());

    for raw in suggested {
        let context = format!("parameter `{}`", raw.name);
        let base = catalog.lookup(raw.type_id, raw.udt_name.as_deref(), &context)?;
        let type_info = base.with_reported_length(raw.max_length);
        let direction = Direction::from_flags(raw.is_input, raw.is_output);

        // Table-valued parameters stay required: an absent row set has no
        // meaning at bind time.
        let optional = input.options.all_parameters_optional
            && direction.is_input()
            && !type_info.is_table();

        parameters.push(Parameter::new(raw.name, type_info, direction, optional)?);
    }

    parameter::ensure_unique(&parameters)?;

    // An opaque cursor is never introspected; DDL and procedures whose
    // shape the engine cannot state still describe their parameters.
    let columns = if input.options.result_type == ResultType::Cursor {
        Vec::new()
    } else {
        let introspected = session.columns(&resolved.text)?;
        let mut columns = Vec::with_capacity(introspected.len());

        for raw in introspected {
            let name = raw.name.unwrap_or_default();

            if name.is_empty() {
                return Err(Error::EmptyColumnName {
                    ordinal: raw.ordinal,
                });
            }

            let context = format!("column `{name}` at ordinal {}", raw.ordinal);
            let base = catalog.lookup(raw.type_id, raw.udt_name.as_deref(), &context)?;
            let type_info = match raw.max_length {
                Some(len) => base.with_reported_length(len),
                None => base.clone(),
            };

            columns.push(Column::new(raw.ordinal, name, type_info, raw.nullable)?);
        }

        columns
    };

    let shape = select_shape(input.options.result_type, columns)?;

    let descriptor = CommandDescriptor {
        name: input.name.clone(),
        parameters,
        output: OutputDescriptor::new(shape, input.options.single_row),
        source: SourceInfo {
            id: resolved.id.clone(),
            server_version: session.version(),
        },
    };

    tracing::debug!(command = %descriptor, "described");

    Ok(descriptor)
}
