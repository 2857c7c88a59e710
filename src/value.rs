/// An owned scalar value as exchanged with the engine.
///
/// Used in two places: decoding the rows that come back from the metadata
/// functions, and binding rows of a table-valued parameter. `Null` is the
/// engine's null marker; it is a value in its own right, not an absence of
/// one, so a nullable column round-trips without losing the distinction
/// between `NULL` and a default.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum SqlValue {
    Null,
    Bool(bool),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// `Null` reads back as `None`, everything else as `Some`.
    ///
    /// The inverse of the `From<Option<T>>` impl: together they form the
    /// absent-to-null coercion contract for optional parameters.
    pub fn as_option(&self) -> Option<&SqlValue> {
        match self {
            SqlValue::Null => None,
            other => Some(other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Widening integer read used by the metadata row decoder; the server
    /// reports ordinals and type ids in several integer widths.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match *self {
            SqlValue::TinyInt(v) => Some(i64::from(v)),
            SqlValue::SmallInt(v) => Some(i64::from(v)),
            SqlValue::Int(v) => Some(i64::from(v)),
            SqlValue::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Bit columns surface as `Bool`, but some code paths deliver them as
    /// 0/1 tinyints; both decode.
    pub(crate) fn as_bool(&self) -> Option<bool> {
        match *self {
            SqlValue::Bool(v) => Some(v),
            SqlValue::TinyInt(0) => Some(false),
            SqlValue::TinyInt(1) => Some(true),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::TinyInt(_) => "tinyint",
            SqlValue::SmallInt(_) => "smallint",
            SqlValue::Int(_) => "int",
            SqlValue::BigInt(_) => "bigint",
            SqlValue::Float(_) => "float",
            SqlValue::String(_) => "string",
            SqlValue::Bytes(_) => "bytes",
        }
    }
}

/// Absent writes as `Null`, present coerces through the value's own
/// conversion.
impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => SqlValue::Null,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<u8> for SqlValue {
    fn from(value: u8) -> Self {
        SqlValue::TinyInt(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        SqlValue::SmallInt(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}
