use crate::error::{Error, Result};
use crate::type_info::TypeInfo;
use crate::value::SqlValue;

/// A user-defined table type, the declared type of a table-valued
/// parameter.
///
/// Loaded from the server catalog (`sys.table_types` joined to
/// `sys.columns`); the column list is ordered by `column_id` and immutable
/// once built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct TableType {
    pub(crate) name: String,
    pub(crate) columns: Vec<TvpColumn>,
}

/// One column of a [`TableType`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct TvpColumn {
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
    pub(crate) nullable: bool,
}

/// One row of values bound to a table-valued parameter, validated against
/// the owning [`TableType`].
#[derive(Debug, Clone, PartialEq)]
pub struct TvpRow {
    values: Vec<SqlValue>,
}

impl TableType {
    /// Schema-qualified name, e.g. `dbo.TagList`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[TvpColumn] {
        &self.columns
    }

    /// Binds one row of values to this table type.
    ///
    /// The value count must match the column count exactly; a mismatch
    /// means the cached table schema has drifted from the caller and is a
    /// fatal error, not a conversion problem. `SqlValue::Null` is accepted
    /// for any column here; rejecting a null in a non-nullable column is
    /// the engine's job at execution time.
    pub fn row(&self, values: Vec<SqlValue>) -> Result<TvpRow> {
        if values.len() != self.columns.len() {
            return Err(Error::TvpArityMismatch {
                type_name: self.name.clone(),
                expected: self.columns.len(),
                got: values.len(),
            });
        }

        Ok(TvpRow { values })
    }
}

impl TvpColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Declared maximum length, where the column's type carries one.
    pub fn max_length(&self) -> Option<u16> {
        self.type_info.max_length()
    }
}

impl TvpRow {
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}
