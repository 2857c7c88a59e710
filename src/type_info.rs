use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use crate::tvp::TableType;

/// A unique identifier for a SQL Server data type.
///
/// This is `sys.types.system_type_id`: stable across servers and versions
/// for the builtin types, and the discriminant both metadata functions
/// report for parameters and result columns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(pub u8);

// Data types
// https://learn.microsoft.com/sql/t-sql/data-types/data-types-transact-sql

impl TypeId {
    pub const IMAGE: Self = Self(34);
    pub const TEXT: Self = Self(35);

    /// `uniqueidentifier`. Maps to `uuid::Uuid`.
    pub const UNIQUEIDENTIFIER: Self = Self(36);

    pub const DATE: Self = Self(40);
    pub const TIME: Self = Self(41);
    pub const DATETIME2: Self = Self(42);
    pub const DATETIMEOFFSET: Self = Self(43);

    /// A 1-byte unsigned integer. Maps to `u8`.
    pub const TINYINT: Self = Self(48);

    /// A 2-byte integer. Maps to `i16`.
    pub const SMALLINT: Self = Self(52);

    /// A 4-byte integer. Maps to `i32`.
    pub const INT: Self = Self(56);

    pub const SMALLDATETIME: Self = Self(58);

    /// A 4-byte floating-point number. Maps to `f32`.
    pub const REAL: Self = Self(59);

    pub const MONEY: Self = Self(60);
    pub const DATETIME: Self = Self(61);

    /// An 8-byte floating-point number. Maps to `f64`.
    pub const FLOAT: Self = Self(62);

    pub const SQL_VARIANT: Self = Self(98);
    pub const NTEXT: Self = Self(99);

    /// The `bit` type. Maps to `bool`.
    pub const BIT: Self = Self(104);

    pub const DECIMAL: Self = Self(106);
    pub const NUMERIC: Self = Self(108);
    pub const SMALLMONEY: Self = Self(122);

    /// An 8-byte integer. Maps to `i64`.
    pub const BIGINT: Self = Self(127);

    pub const VARBINARY: Self = Self(165);
    pub const VARCHAR: Self = Self(167);
    pub const BINARY: Self = Self(173);
    pub const CHAR: Self = Self(175);

    /// `rowversion` (legacy name `timestamp`). Maps to `Vec<u8>`.
    pub const ROWVERSION: Self = Self(189);

    pub const NVARCHAR: Self = Self(231);
    pub const NCHAR: Self = Self(239);
    pub const XML: Self = Self(241);

    /// The system type id shared by every user-defined table type. The
    /// concrete table type is identified by its name, not this id.
    pub const TABLE: Self = Self(243);

    /// The char and binary families take a declared length in type syntax,
    /// e.g. `nvarchar(4000)` or `binary(16)`.
    pub(crate) fn declares_length(self) -> bool {
        const DECLARED: [TypeId; 6] = [
            TypeId::CHAR,
            TypeId::VARCHAR,
            TypeId::NCHAR,
            TypeId::NVARCHAR,
            TypeId::BINARY,
            TypeId::VARBINARY,
        ];

        DECLARED.contains(&self)
    }

    // nchar and nvarchar lengths come back in bytes, two per character
    pub(crate) fn is_double_byte(self) -> bool {
        self == TypeId::NCHAR || self == TypeId::NVARCHAR
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Whether values of a type occupy a fixed number of bytes, a declared
/// variable maximum, or a size the catalog cannot state up front.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum LengthKind {
    Fixed,
    Variable,
    Unknown,
}

/// Provides information about a SQL Server type as resolved through the
/// type catalog: SQL name, engine type id, the Rust type an emitter should
/// bind, and the declared length where the type carries one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeInfo {
    pub(crate) id: TypeId,
    pub(crate) name: Cow<'static, str>,
    pub(crate) rust_type: Option<Cow<'static, str>>,
    pub(crate) length: LengthKind,
    pub(crate) max_length: Option<u16>,
    pub(crate) table: Option<Box<TableType>>,
}

impl TypeInfo {
    /// Returns the unique identifier for this type.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the SQL name for this type, e.g. `nvarchar`.
    ///
    /// For an alias user-defined type this is the name of the builtin base
    /// type, the name actually usable in a parameter declaration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the Rust type an emitter should bind for this type, or
    /// `None` when there is no scalar binding (table types).
    pub fn rust_type(&self) -> Option<&str> {
        self.rust_type.as_deref()
    }

    pub const fn length(&self) -> LengthKind {
        self.length
    }

    /// Declared maximum length in characters (double-byte types count
    /// characters, not bytes). `None` means `max` or not applicable.
    pub const fn max_length(&self) -> Option<u16> {
        self.max_length
    }

    /// The table type behind a table-valued parameter, if this is one.
    pub fn table(&self) -> Option<&TableType> {
        self.table.as_deref()
    }

    pub fn is_table(&self) -> bool {
        self.table.is_some()
    }

    /// Copy of this type carrying the length the server reported for one
    /// specific parameter or column.
    ///
    /// The metadata functions report lengths in bytes with `-1` standing
    /// for `max`; double-byte character types halve to a character count.
    pub(crate) fn with_reported_length(&self, raw: i64) -> TypeInfo {
        let mut info = self.clone();

        if !info.id.declares_length() {
            return info;
        }

        info.max_length = if raw < 0 {
            None
        } else {
            let chars = if info.id.is_double_byte() { raw / 2 } else { raw };

            u16::try_from(chars).ok()
        };

        info
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        if self.id.declares_length() {
            match (self.max_length, self.length) {
                (Some(n), _) => write!(f, "({n})")?,
                (None, LengthKind::Variable) => f.write_str("(max)")?,
                (None, _) => {}
            }
        }

        Ok(())
    }
}
