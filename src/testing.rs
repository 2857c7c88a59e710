//! Test doubles for exercising describe flows without a live server.
//!
//! [`MockClient`] plays back scripted metadata result sets keyed by a
//! substring of the incoming batch, and [`fixtures`] builds the result
//! sets the engine's metadata functions would return. Together they let a
//! test drive the whole describe pipeline, including introspection
//! fallback and engine failures, deterministically.

use std::sync::{Arc, Mutex, PoisonError};

use crate::connection::{Client, Connect};
use crate::error::{EngineError, Error, Result};
use crate::options::ConnectionTarget;
use crate::row::ResultSet;

/// Shared record of every batch a [`MockClient`] executed.
///
/// Clones share the same underlying log, so a handle taken before the
/// client moves into a connector keeps observing it.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// How many executed batches contain `marker`.
    pub fn count_containing(&self, marker: &str) -> usize {
        self.lock().iter().filter(|sql| sql.contains(marker)).count()
    }

    fn record(&self, sql: &str) {
        self.lock().push(sql.to_owned());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scripted stand-in for a live connection.
///
/// Each incoming batch is matched by substring against the registered
/// markers, failures before responses. A batch matching nothing is an
/// error, so a missing fixture fails a test loudly instead of describing
/// garbage.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    responses: Vec<(String, ResultSet)>,
    failures: Vec<(String, EngineError)>,
    log: CallLog,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the result set returned for any batch containing `marker`.
    pub fn on(mut self, marker: impl Into<String>, response: ResultSet) -> Self {
        self.responses.push((marker.into(), response));
        self
    }

    /// Registers an engine failure for any batch containing `marker`.
    pub fn fail_on(mut self, marker: impl Into<String>, error: EngineError) -> Self {
        self.failures.push((marker.into(), error));
        self
    }

    /// Handle on the call log; survives the client moving elsewhere.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Client for MockClient {
    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.log.record(sql);

        if let Some((_, error)) = self
            .failures
            .iter()
            .find(|(marker, _)| sql.contains(marker.as_str()))
        {
            return Err(Error::Engine(error.clone()));
        }

        match self
            .responses
            .iter()
            .find(|(marker, _)| sql.contains(marker.as_str()))
        {
            Some((_, response)) => Ok(response.clone()),
            None => Err(err_protocol!("no scripted response matches the batch: {sql}")),
        }
    }
}

/// Connector handing out clones of a prototype [`MockClient`].
///
/// Every connection shares the prototype's call log, so a test can count
/// metadata round-trips across reconnects.
#[derive(Debug, Clone)]
pub struct MockConnect {
    client: MockClient,
}

impl MockConnect {
    pub fn new(client: MockClient) -> Self {
        Self { client }
    }
}

impl Connect for MockConnect {
    type Client = MockClient;

    fn connect(&self, _target: &ConnectionTarget) -> Result<MockClient> {
        Ok(self.client.clone())
    }
}

/// Canned result sets shaped like the engine's metadata functions.
pub mod fixtures {
    use crate::catalog::builtin_inventory;
    use crate::row::{RawColumn, ResultSet, Row};
    use crate::type_info::TypeId;
    use crate::value::SqlValue;

    /// A result set with no schema and no rows, as a batch that returns
    /// nothing produces.
    pub fn empty() -> ResultSet {
        ResultSet::default()
    }

    /// The `SERVERPROPERTY('ProductVersion')` result.
    pub fn product_version(version: &str) -> ResultSet {
        ResultSet::new(
            vec![RawColumn::new("product_version", TypeId::NVARCHAR, true)],
            vec![Row::new(vec![SqlValue::from(version)])],
        )
    }

    /// A server type inventory: every builtin this crate maps, the
    /// `sys.sysname` and `dbo.Email` alias types (both `nvarchar(128)`),
    /// and the `dbo.TagList` table type described by [`sys_table_types`].
    pub fn sys_types() -> ResultSet {
        let schema = vec![
            RawColumn::new("system_type_id", TypeId::TINYINT, false),
            RawColumn::new("user_type_id", TypeId::INT, false),
            RawColumn::new("schema_name", TypeId::NVARCHAR, false),
            RawColumn::new("name", TypeId::NVARCHAR, false),
            RawColumn::new("is_table_type", TypeId::BIT, false),
            RawColumn::new("max_length", TypeId::SMALLINT, false),
        ];

        let mut rows: Vec<Row> = builtin_inventory()
            .map(|(id, name)| type_row(id, i64::from(id.0), "sys", name, false, 8))
            .collect();

        rows.push(type_row(TypeId::NVARCHAR, 256, "sys", "sysname", false, 256));
        rows.push(type_row(TypeId::NVARCHAR, 261, "dbo", "Email", false, 256));
        rows.push(type_row(TypeId::TABLE, 257, "dbo", "TagList", true, -1));

        ResultSet::new(schema, rows)
    }

    /// Column schemas of the table types in [`sys_types`]: `dbo.TagList`
    /// is `(Tag nvarchar(100) NOT NULL, Weight float NULL)`.
    pub fn sys_table_types() -> ResultSet {
        let schema = vec![
            RawColumn::new("user_type_id", TypeId::INT, false),
            RawColumn::new("column_id", TypeId::INT, false),
            RawColumn::new("name", TypeId::NVARCHAR, false),
            RawColumn::new("system_type_id", TypeId::TINYINT, false),
            RawColumn::new("is_nullable", TypeId::BIT, true),
            RawColumn::new("max_length", TypeId::SMALLINT, false),
        ];

        ResultSet::new(
            schema,
            vec![
                table_column_row(257, 1, "Tag", TypeId::NVARCHAR, false, 200),
                table_column_row(257, 2, "Weight", TypeId::FLOAT, true, 8),
            ],
        )
    }

    /// Undeclared-parameter suggestions; tuples are `(parameter_ordinal,
    /// name, suggested type, is_input, is_output)`.
    pub fn suggested_parameters(parameters: &[(i64, &str, TypeId, bool, bool)]) -> ResultSet {
        let rows = parameters
            .iter()
            .map(|&(ordinal, name, type_id, is_input, is_output)| {
                Row::new(vec![
                    SqlValue::from(ordinal),
                    SqlValue::from(name),
                    SqlValue::from(i64::from(type_id.0)),
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::from(is_input),
                    SqlValue::from(is_output),
                    SqlValue::from(suggested_length(type_id)),
                ])
            })
            .collect();

        ResultSet::new(parameter_schema(), rows)
    }

    /// A single suggested parameter of a user-defined alias type;
    /// `max_length` is the declared byte length the engine reports for it.
    pub fn suggested_alias_parameter(
        name: &str,
        udt_schema: &str,
        udt_name: &str,
        base: TypeId,
        max_length: i64,
    ) -> ResultSet {
        ResultSet::new(
            parameter_schema(),
            vec![Row::new(vec![
                SqlValue::from(1i64),
                SqlValue::from(name),
                SqlValue::from(i64::from(base.0)),
                SqlValue::from(udt_schema),
                SqlValue::from(udt_name),
                SqlValue::from(true),
                SqlValue::from(false),
                SqlValue::from(max_length),
            ])],
        )
    }

    /// A single suggested parameter of a user-defined table type.
    pub fn suggested_tvp_parameter(name: &str, udt_schema: &str, udt_name: &str) -> ResultSet {
        ResultSet::new(
            parameter_schema(),
            vec![Row::new(vec![
                SqlValue::from(1i64),
                SqlValue::from(name),
                SqlValue::from(i64::from(TypeId::TABLE.0)),
                SqlValue::from(udt_schema),
                SqlValue::from(udt_name),
                SqlValue::from(true),
                SqlValue::from(false),
                SqlValue::from(-1i64),
            ])],
        )
    }

    /// First-result-set introspection rows; tuples are `(column_ordinal,
    /// name, type, is_nullable)` with the ordinal one-based as reported.
    pub fn introspected_columns(columns: &[(i64, Option<&str>, TypeId, bool)]) -> ResultSet {
        let rows = columns
            .iter()
            .map(|&(ordinal, name, type_id, nullable)| {
                Row::new(vec![
                    SqlValue::from(ordinal),
                    SqlValue::from(name.map(str::to_owned)),
                    SqlValue::from(nullable),
                    SqlValue::from(i64::from(type_id.0)),
                    SqlValue::from(suggested_length(type_id)),
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::Null,
                    SqlValue::Null,
                ])
            })
            .collect();

        ResultSet::new(introspection_schema(), rows)
    }

    /// The in-row rejection the primary introspection function produces
    /// for statements it cannot see through.
    pub fn introspection_error(number: i32, message: &str) -> ResultSet {
        ResultSet::new(
            introspection_schema(),
            vec![Row::new(vec![
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::from(number),
                SqlValue::from(16i32),
                SqlValue::from(message),
            ])],
        )
    }

    /// A rows-suppressed execution result: header only, no rows; columns
    /// are `(name, type, is_nullable)`.
    pub fn header(columns: &[(&str, TypeId, bool)]) -> ResultSet {
        ResultSet::new(
            columns
                .iter()
                .map(|&(name, type_id, nullable)| {
                    RawColumn::new(name, type_id, nullable)
                        .with_max_length(suggested_length(type_id))
                })
                .collect(),
            Vec::new(),
        )
    }

    fn type_row(
        system: TypeId,
        user_type_id: i64,
        schema: &str,
        name: &str,
        is_table_type: bool,
        max_length: i64,
    ) -> Row {
        Row::new(vec![
            SqlValue::from(i64::from(system.0)),
            SqlValue::from(user_type_id),
            SqlValue::from(schema),
            SqlValue::from(name),
            SqlValue::from(is_table_type),
            SqlValue::from(max_length),
        ])
    }

    fn table_column_row(
        user_type_id: i64,
        column_id: i64,
        name: &str,
        type_id: TypeId,
        nullable: bool,
        max_length: i64,
    ) -> Row {
        Row::new(vec![
            SqlValue::from(user_type_id),
            SqlValue::from(column_id),
            SqlValue::from(name),
            SqlValue::from(i64::from(type_id.0)),
            SqlValue::from(nullable),
            SqlValue::from(max_length),
        ])
    }

    fn parameter_schema() -> Vec<RawColumn> {
        vec![
            RawColumn::new("parameter_ordinal", TypeId::INT, false),
            RawColumn::new("name", TypeId::NVARCHAR, false),
            RawColumn::new("suggested_system_type_id", TypeId::INT, false),
            RawColumn::new("suggested_user_type_schema", TypeId::NVARCHAR, true),
            RawColumn::new("suggested_user_type_name", TypeId::NVARCHAR, true),
            RawColumn::new("suggested_is_input", TypeId::BIT, false),
            RawColumn::new("suggested_is_output", TypeId::BIT, false),
            RawColumn::new("suggested_max_length", TypeId::SMALLINT, false),
        ]
    }

    fn introspection_schema() -> Vec<RawColumn> {
        vec![
            RawColumn::new("column_ordinal", TypeId::INT, true),
            RawColumn::new("name", TypeId::NVARCHAR, true),
            RawColumn::new("is_nullable", TypeId::BIT, true),
            RawColumn::new("system_type_id", TypeId::INT, true),
            RawColumn::new("max_length", TypeId::SMALLINT, true),
            RawColumn::new("user_type_schema", TypeId::NVARCHAR, true),
            RawColumn::new("user_type_name", TypeId::NVARCHAR, true),
            RawColumn::new("error_number", TypeId::INT, true),
            RawColumn::new("error_severity", TypeId::INT, true),
            RawColumn::new("error_message", TypeId::NVARCHAR, true),
        ]
    }

    // Byte lengths the engine plausibly suggests; ignored by resolution
    // for types that do not declare one.
    fn suggested_length(type_id: TypeId) -> i64 {
        if type_id.declares_length() {
            8000
        } else {
            8
        }
    }
}
