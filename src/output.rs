use crate::column::Column;
use crate::error::{Error, Result};
use crate::options::ResultType;

/// How a described command's output is represented.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputShape {
    /// The statement yields no result columns; its value is the affected
    /// row count.
    RowsAffected,

    /// Exactly one column: values of that column, unwrapped from any
    /// requested composite shape.
    Scalar(Column),

    /// Rows with named fields, one per column.
    Record(Vec<Column>),

    /// Rows as positional values, ordered by column ordinal.
    Tuple(Vec<Column>),

    /// All rows materialized into one mutable tabular value.
    Table(Vec<Column>),

    /// An opaque forward-only cursor; the select list was never
    /// introspected.
    Cursor,
}

impl OutputShape {
    /// The introspected columns behind this shape. Empty for
    /// [`RowsAffected`](OutputShape::RowsAffected) and
    /// [`Cursor`](OutputShape::Cursor).
    pub fn columns(&self) -> &[Column] {
        match self {
            OutputShape::RowsAffected | OutputShape::Cursor => &[],
            OutputShape::Scalar(column) => std::slice::from_ref(column),
            OutputShape::Record(columns)
            | OutputShape::Tuple(columns)
            | OutputShape::Table(columns) => columns,
        }
    }
}

/// How many values the emitted execution surface produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum Cardinality {
    /// Exactly one value.
    One,
    /// Zero or one value; an emitter renders this as `Option`.
    AtMostOne,
    /// An unbounded, forward-only, single-pass sequence of values.
    Many,
}

/// The output half of a command descriptor.
///
/// One descriptor serves both execution forms an emitter renders: the
/// blocking surface and the asynchronous one share the shape, the column
/// order and the nullability mapping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputDescriptor {
    pub(crate) shape: OutputShape,
    pub(crate) single_row: bool,
}

impl OutputDescriptor {
    pub(crate) fn new(shape: OutputShape, single_row: bool) -> Self {
        Self { shape, single_row }
    }

    pub fn shape(&self) -> &OutputShape {
        &self.shape
    }

    pub fn single_row(&self) -> bool {
        self.single_row
    }

    pub fn columns(&self) -> &[Column] {
        self.shape.columns()
    }

    /// Derived from the shape and the single-row option.
    ///
    /// `single_row` wraps a composite shape, table values included, in an
    /// optional single value and tightens a scalar sequence to exactly
    /// one; the row count and the raw cursor are single-valued whatever
    /// the options say.
    pub fn cardinality(&self) -> Cardinality {
        match &self.shape {
            OutputShape::RowsAffected | OutputShape::Cursor => Cardinality::One,

            OutputShape::Scalar(_) => {
                if self.single_row {
                    Cardinality::One
                } else {
                    Cardinality::Many
                }
            }

            OutputShape::Record(_) | OutputShape::Tuple(_) => {
                if self.single_row {
                    Cardinality::AtMostOne
                } else {
                    Cardinality::Many
                }
            }

            OutputShape::Table(_) => {
                if self.single_row {
                    Cardinality::AtMostOne
                } else {
                    Cardinality::One
                }
            }
        }
    }
}

/// Decides the output representation from the requested result type and
/// the extracted columns.
///
/// `Cursor` never reaches column extraction, so its arm sees no columns by
/// construction. A single column always collapses to `Scalar`, whatever
/// composite was requested; zero columns mean the statement is a non-query
/// and its value is the affected row count.
pub(crate) fn select_shape(
    result_type: ResultType,
    mut columns: Vec<Column>,
) -> Result<OutputShape> {
    Ok(match result_type {
        ResultType::Cursor => OutputShape::Cursor,

        _ if columns.is_empty() => OutputShape::RowsAffected,

        ResultType::Table => OutputShape::Table(columns),

        ResultType::Records | ResultType::Tuples if columns.len() == 1 => {
            OutputShape::Scalar(columns.remove(0))
        }

        ResultType::Records => {
            ensure_distinct_names(&columns)?;
            OutputShape::Record(columns)
        }

        ResultType::Tuples => OutputShape::Tuple(columns),
    })
}

/// Record fields are addressed by name, so two columns sharing one is an
/// error; tuples and tables address by position and tolerate it.
fn ensure_distinct_names(columns: &[Column]) -> Result<()> {
    for (i, column) in columns.iter().enumerate() {
        if let Some(dup) = columns[..i].iter().find(|c| c.name == column.name) {
            return Err(Error::DuplicateColumn {
                name: column.name.clone(),
                first: dup.ordinal,
                second: column.ordinal,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::type_info::TypeId;

    fn column(ordinal: usize, name: &str, id: TypeId) -> Column {
        Column::new(ordinal, name, builtin(id).unwrap(), false).unwrap()
    }

    #[test]
    fn cursor_bypasses_selection() {
        assert_eq!(
            select_shape(ResultType::Cursor, vec![]).unwrap(),
            OutputShape::Cursor
        );
    }

    #[test]
    fn zero_columns_mean_affected_rows() {
        // requested composite shapes are ignored for non-queries
        for result_type in [ResultType::Records, ResultType::Tuples, ResultType::Table] {
            assert_eq!(
                select_shape(result_type, vec![]).unwrap(),
                OutputShape::RowsAffected
            );
        }
    }

    #[test]
    fn single_column_collapses_to_scalar() {
        for result_type in [ResultType::Records, ResultType::Tuples] {
            let shape =
                select_shape(result_type, vec![column(0, "count", TypeId::INT)]).unwrap();

            assert!(matches!(shape, OutputShape::Scalar(ref c) if c.name() == "count"));
        }

        // a table is a table even with one column
        let shape = select_shape(ResultType::Table, vec![column(0, "count", TypeId::INT)])
            .unwrap();
        assert!(matches!(shape, OutputShape::Table(_)));
    }

    #[test]
    fn composite_shapes_keep_their_columns() {
        let columns = vec![
            column(0, "id", TypeId::INT),
            column(1, "name", TypeId::NVARCHAR),
        ];

        let record = select_shape(ResultType::Records, columns.clone()).unwrap();
        assert!(matches!(record, OutputShape::Record(ref c) if c.len() == 2));

        let tuple = select_shape(ResultType::Tuples, columns).unwrap();
        assert!(matches!(tuple, OutputShape::Tuple(ref c) if c.len() == 2));
    }

    #[test]
    fn duplicate_names_reject_records_only() {
        let columns = || {
            vec![
                column(0, "id", TypeId::INT),
                column(1, "id", TypeId::BIGINT),
            ]
        };

        let err = select_shape(ResultType::Records, columns()).unwrap_err();
        match err {
            Error::DuplicateColumn {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "id");
                assert_eq!((first, second), (0, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(select_shape(ResultType::Tuples, columns()).is_ok());
        assert!(select_shape(ResultType::Table, columns()).is_ok());
    }

    #[test]
    fn cardinality_follows_shape_and_single_row() {
        let scalar = OutputShape::Scalar(column(0, "n", TypeId::INT));
        let record = OutputShape::Record(vec![
            column(0, "id", TypeId::INT),
            column(1, "name", TypeId::NVARCHAR),
        ]);

        let table = OutputShape::Table(vec![column(0, "id", TypeId::INT)]);

        assert_eq!(
            OutputDescriptor::new(scalar.clone(), false).cardinality(),
            Cardinality::Many
        );
        assert_eq!(
            OutputDescriptor::new(scalar, true).cardinality(),
            Cardinality::One
        );

        assert_eq!(
            OutputDescriptor::new(record.clone(), false).cardinality(),
            Cardinality::Many
        );
        assert_eq!(
            OutputDescriptor::new(record, true).cardinality(),
            Cardinality::AtMostOne
        );

        assert_eq!(
            OutputDescriptor::new(table.clone(), false).cardinality(),
            Cardinality::One
        );
        assert_eq!(
            OutputDescriptor::new(table, true).cardinality(),
            Cardinality::AtMostOne
        );

        assert_eq!(
            OutputDescriptor::new(OutputShape::RowsAffected, false).cardinality(),
            Cardinality::One
        );
        assert_eq!(
            OutputDescriptor::new(OutputShape::Cursor, true).cardinality(),
            Cardinality::One
        );
    }
}
