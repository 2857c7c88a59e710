use crate::error::{Error, Result};
use crate::type_info::TypeInfo;

/// One column of a described result set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct Column {
    pub(crate) ordinal: usize,
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
    pub(crate) nullable: bool,
}

impl Column {
    /// Builds a column from introspected metadata.
    ///
    /// The name must be non-empty: the metadata functions report `NULL` for
    /// an unaliased expression, and a descriptor cannot bind a field to a
    /// nameless column.
    pub(crate) fn new(
        ordinal: usize,
        name: impl Into<String>,
        type_info: TypeInfo,
        nullable: bool,
    ) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::EmptyColumnName { ordinal });
        }

        Ok(Self {
            ordinal,
            name,
            type_info,
            nullable,
        })
    }

    /// Zero-based position in the result set.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// Whether the column can be `NULL` in any returned row.
    ///
    /// Emitters wrap nullable columns in `Option`.
    pub fn nullable(&self) -> bool {
        self.nullable
    }
}
