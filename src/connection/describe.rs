use crate::catalog::decode_type_id;
use crate::connection::{Client, Session};
use crate::error::{EngineError, Error, Result};
use crate::type_info::TypeId;

/// One row from the undeclared-parameters metadata function, before type
/// resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestedParameter {
    pub name: String,
    pub type_id: TypeId,
    /// Schema-qualified user-defined type name, when the suggested type is
    /// one.
    pub udt_name: Option<String>,
    pub is_input: bool,
    pub is_output: bool,
    /// Suggested length in bytes, `-1` for `max`.
    pub max_length: i64,
}

/// One column from result-set introspection, before type resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectedColumn {
    /// Zero-based position in the result set.
    pub ordinal: usize,
    /// `None` when the server reports an unnamed column.
    pub name: Option<String>,
    pub type_id: TypeId,
    pub udt_name: Option<String>,
    pub nullable: bool,
    /// Declared length in bytes, `-1` for `max`; `None` when the metadata
    /// path does not report one.
    pub max_length: Option<i64>,
}

/// Outcome of primary result-set introspection.
///
/// The metadata function reports its own failure in-row rather than by
/// raising, so the outcome is a value: either the column rows, or the
/// engine error that tells the caller to try the legacy mode. Which error
/// wins when the fallback also fails is decided by [`Session::columns`],
/// not by exception flow.
#[derive(Debug)]
pub enum Introspection {
    Columns(Vec<IntrospectedColumn>),
    NeedsFallback(EngineError),
}

impl<C: Client> Session<'_, C> {
    /// Enumerates the undeclared parameters of `text` in declaration
    /// order, with the engine's suggested types and directions.
    pub fn describe_parameters(&mut self, text: &str) -> Result<Vec<SuggestedParameter>> {
        let sql = format!(
            "EXEC sys.sp_describe_undeclared_parameters @tsql = {}",
            n_literal(text)
        );

        let rs = self.fetch(&sql)?;

        if rs.schema.is_empty() {
            // No undeclared parameters: the procedure returns no result
            // set at all.
            return Ok(Vec::new());
        }

        let ordinal = rs.column_index("parameter_ordinal")?;
        let name = rs.column_index("name")?;
        let type_id = rs.column_index("suggested_system_type_id")?;
        let udt_schema = rs.column_index("suggested_user_type_schema")?;
        let udt_name = rs.column_index("suggested_user_type_name")?;
        let is_input = rs.column_index("suggested_is_input")?;
        let is_output = rs.column_index("suggested_is_output")?;
        let max_length = rs.column_index("suggested_max_length")?;

        let mut parameters = Vec::with_capacity(rs.rows.len());

        for row in &rs.rows {
            parameters.push((
                row.try_get_i64(ordinal)?,
                SuggestedParameter {
                    name: row.try_get_str(name)?.to_owned(),
                    type_id: decode_type_id(row.try_get_i64(type_id)?)?,
                    udt_name: qualify(
                        row.try_get_str_opt(udt_schema)?,
                        row.try_get_str_opt(udt_name)?,
                    ),
                    is_input: row.try_get_bool(is_input)?,
                    is_output: row.try_get_bool(is_output)?,
                    max_length: row.try_get_i64(max_length)?,
                },
            ));
        }

        // The procedure reports in ordinal order already; sorting keeps
        // declaration order even if a driver reorders rows.
        parameters.sort_by_key(|(ordinal, _)| *ordinal);

        Ok(parameters.into_iter().map(|(_, p)| p).collect())
    }

    /// Primary, schema-only result-set introspection: no side effects, no
    /// rows materialized.
    pub fn introspect_columns(&mut self, text: &str) -> Result<Introspection> {
        let sql = format!(
            "SELECT column_ordinal, name, is_nullable, system_type_id, max_length, \
                    user_type_schema, user_type_name, \
                    error_number, error_severity, error_message \
             FROM sys.dm_exec_describe_first_result_set({}, NULL, 0) \
             WHERE is_hidden = 0 OR is_hidden IS NULL \
             ORDER BY column_ordinal",
            n_literal(text)
        );

        let rs = self.fetch(&sql)?;

        let error_number = rs.column_index("error_number")?;
        let error_severity = rs.column_index("error_severity")?;
        let error_message = rs.column_index("error_message")?;

        // A rejected statement comes back as a single row whose column
        // fields are all NULL and whose error fields are not.
        if let Some(first) = rs.rows.first() {
            if let Some(number) = first.try_get_i64_opt(error_number)? {
                let severity = first.try_get_i64_opt(error_severity)?.unwrap_or(16);

                return Ok(Introspection::NeedsFallback(EngineError {
                    number: i32::try_from(number)
                        .map_err(|_| Error::protocol("error number out of range"))?,
                    severity: u8::try_from(severity).unwrap_or(16),
                    message: first
                        .try_get_str_opt(error_message)?
                        .unwrap_or_default()
                        .to_owned(),
                }));
            }
        }

        let ordinal = rs.column_index("column_ordinal")?;
        let name = rs.column_index("name")?;
        let nullable = rs.column_index("is_nullable")?;
        let type_id = rs.column_index("system_type_id")?;
        let max_length = rs.column_index("max_length")?;
        let udt_schema = rs.column_index("user_type_schema")?;
        let udt_name = rs.column_index("user_type_name")?;

        let mut columns = Vec::with_capacity(rs.rows.len());

        for row in &rs.rows {
            let reported = row.try_get_i64(ordinal)?;

            // column_ordinal is one-based
            let ordinal = usize::try_from(reported - 1)
                .map_err(|_| err_protocol!("column ordinal {reported} out of range"))?;

            columns.push(IntrospectedColumn {
                ordinal,
                name: row.try_get_str_opt(name)?.map(str::to_owned),
                type_id: decode_type_id(row.try_get_i64(type_id)?)?,
                udt_name: qualify(
                    row.try_get_str_opt(udt_schema)?,
                    row.try_get_str_opt(udt_name)?,
                ),
                nullable: row.try_get_bool(nullable)?,
                max_length: Some(row.try_get_i64(max_length)?),
            });
        }

        Ok(Introspection::Columns(columns))
    }

    /// Fallback introspection: execute under `SET FMTONLY ON`, which
    /// suppresses rows server-side and returns only the result-set header.
    pub(crate) fn fallback_columns(&mut self, text: &str) -> Result<Vec<IntrospectedColumn>> {
        let rs = self.fetch(&format!("SET FMTONLY ON; {text}; SET FMTONLY OFF;"))?;

        Ok(rs
            .schema
            .iter()
            .enumerate()
            .map(|(ordinal, column)| IntrospectedColumn {
                ordinal,
                name: (!column.name.is_empty()).then(|| column.name.clone()),
                type_id: column.type_id,
                // The wire header names no user-defined types; alias
                // columns arrive as their base type.
                udt_name: None,
                nullable: column.nullable,
                max_length: column.max_length,
            })
            .collect())
    }

    /// The full two-step column-extraction protocol.
    ///
    /// When the primary path rejects the statement and the fallback then
    /// fails too, the primary's error is the one surfaced; the fallback
    /// failure is diagnostic noise.
    pub fn columns(&mut self, text: &str) -> Result<Vec<IntrospectedColumn>> {
        match self.introspect_columns(text)? {
            Introspection::Columns(columns) => Ok(columns),

            Introspection::NeedsFallback(primary) => {
                tracing::debug!(
                    error = %primary,
                    "schema-only introspection rejected the statement; trying fmtonly"
                );

                match self.fallback_columns(text) {
                    Ok(columns) => Ok(columns),
                    Err(error) => {
                        tracing::debug!(%error, "describe: fmtonly introspection failed");

                        Err(Error::SchemaIntrospectionFailed(primary))
                    }
                }
            }
        }
    }
}

/// Joins user-type schema and name when both are present.
fn qualify(schema: Option<&str>, name: Option<&str>) -> Option<String> {
    match (schema, name) {
        (Some(schema), Some(name)) => Some(format!("{schema}.{name}")),
        (None, Some(name)) => Some(name.to_owned()),
        _ => None,
    }
}

/// Embeds statement text as an `N'...'` literal.
fn n_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 3);
    quoted.push_str("N'");

    for ch in text.chars() {
        if ch == '\'' {
            quoted.push('\'');
        }

        quoted.push(ch);
    }

    quoted.push('\'');
    quoted
}
