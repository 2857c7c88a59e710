use crate::error::Result;
use crate::type_info::TypeId;
use crate::value::SqlValue;

/// Schema of one column of a raw result set, as reported by the client
/// driver in the result-set header.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub type_id: TypeId,
    pub nullable: bool,
    /// Declared length in bytes, `-1` for `max`; `None` when the driver
    /// does not report one.
    pub max_length: Option<i64>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, type_id: TypeId, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_id,
            nullable,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// One row of a raw result set; values are positional against the owning
/// [`ResultSet`] schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    fn get(&self, index: usize) -> Result<&SqlValue> {
        self.values.get(index).ok_or_else(|| {
            err_protocol!(
                "metadata row has {} values but column {index} was requested",
                self.values.len()
            )
        })
    }

    pub(crate) fn try_get_i64(&self, index: usize) -> Result<i64> {
        let value = self.get(index)?;

        value.as_i64().ok_or_else(|| {
            err_protocol!(
                "metadata column {index}: expected an integer, found {}",
                value.kind()
            )
        })
    }

    pub(crate) fn try_get_i64_opt(&self, index: usize) -> Result<Option<i64>> {
        match self.get(index)? {
            SqlValue::Null => Ok(None),
            _ => self.try_get_i64(index).map(Some),
        }
    }

    pub(crate) fn try_get_str(&self, index: usize) -> Result<&str> {
        let value = self.get(index)?;

        value.as_str().ok_or_else(|| {
            err_protocol!(
                "metadata column {index}: expected a string, found {}",
                value.kind()
            )
        })
    }

    pub(crate) fn try_get_str_opt(&self, index: usize) -> Result<Option<&str>> {
        match self.get(index)? {
            SqlValue::Null => Ok(None),
            _ => self.try_get_str(index).map(Some),
        }
    }

    pub(crate) fn try_get_bool(&self, index: usize) -> Result<bool> {
        let value = self.get(index)?;

        value.as_bool().ok_or_else(|| {
            err_protocol!(
                "metadata column {index}: expected a bit, found {}",
                value.kind()
            )
        })
    }
}

/// A fully buffered result set: the header schema plus zero or more rows.
///
/// Metadata queries return a handful of rows at most, so buffering the
/// whole set is the simplest correct interface for the client driver to
/// implement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub schema: Vec<RawColumn>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(schema: Vec<RawColumn>, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// Resolves a column name against the header once; row access is then
    /// positional.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| {
                err_protocol!("metadata result set is missing the `{name}` column")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec![
                RawColumn::new("name", TypeId::NVARCHAR, false),
                RawColumn::new("ordinal", TypeId::INT, false),
                RawColumn::new("udt", TypeId::NVARCHAR, true),
            ],
            vec![Row::new(vec![
                SqlValue::from("@id"),
                SqlValue::from(1i32),
                SqlValue::Null,
            ])],
        )
    }

    #[test]
    fn resolves_columns_by_name() {
        let rs = sample();

        assert_eq!(rs.column_index("ordinal").unwrap(), 1);
        assert!(matches!(
            rs.column_index("missing").unwrap_err(),
            Error::Protocol(_)
        ));
    }

    #[test]
    fn typed_getters_decode_and_reject() {
        let rs = sample();
        let row = &rs.rows[0];

        assert_eq!(row.try_get_str(0).unwrap(), "@id");
        assert_eq!(row.try_get_i64(1).unwrap(), 1);
        assert_eq!(row.try_get_str_opt(2).unwrap(), None);

        let err = row.try_get_i64(0).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let err = row.try_get_str(3).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
