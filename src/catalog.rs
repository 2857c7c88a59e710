use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::connection::{Client, ServerVersion, Session};
use crate::error::{Error, Result};
use crate::tvp::{TableType, TvpColumn};
use crate::type_info::{LengthKind, TypeId, TypeInfo};

// The static half of the catalog: everything the server reports reduces to
// one of these ids, except user-defined types which resolve by name.
struct Builtin {
    id: TypeId,
    name: &'static str,
    rust_type: &'static str,
    length: LengthKind,
}

#[rustfmt::skip]
const BUILTINS: &[Builtin] = &[
    Builtin { id: TypeId::IMAGE,            name: "image",            rust_type: "Vec<u8>",                              length: LengthKind::Variable },
    Builtin { id: TypeId::TEXT,             name: "text",             rust_type: "String",                               length: LengthKind::Variable },
    Builtin { id: TypeId::UNIQUEIDENTIFIER, name: "uniqueidentifier", rust_type: "uuid::Uuid",                           length: LengthKind::Fixed },
    Builtin { id: TypeId::DATE,             name: "date",             rust_type: "chrono::NaiveDate",                    length: LengthKind::Fixed },
    Builtin { id: TypeId::TIME,             name: "time",             rust_type: "chrono::NaiveTime",                    length: LengthKind::Fixed },
    Builtin { id: TypeId::DATETIME2,        name: "datetime2",        rust_type: "chrono::NaiveDateTime",                length: LengthKind::Fixed },
    Builtin { id: TypeId::DATETIMEOFFSET,   name: "datetimeoffset",   rust_type: "chrono::DateTime<chrono::FixedOffset>", length: LengthKind::Fixed },
    Builtin { id: TypeId::TINYINT,          name: "tinyint",          rust_type: "u8",                                   length: LengthKind::Fixed },
    Builtin { id: TypeId::SMALLINT,         name: "smallint",         rust_type: "i16",                                  length: LengthKind::Fixed },
    Builtin { id: TypeId::INT,              name: "int",              rust_type: "i32",                                  length: LengthKind::Fixed },
    Builtin { id: TypeId::SMALLDATETIME,    name: "smalldatetime",    rust_type: "chrono::NaiveDateTime",                length: LengthKind::Fixed },
    Builtin { id: TypeId::REAL,             name: "real",             rust_type: "f32",                                  length: LengthKind::Fixed },
    Builtin { id: TypeId::MONEY,            name: "money",            rust_type: "bigdecimal::BigDecimal",               length: LengthKind::Fixed },
    Builtin { id: TypeId::DATETIME,         name: "datetime",         rust_type: "chrono::NaiveDateTime",                length: LengthKind::Fixed },
    Builtin { id: TypeId::FLOAT,            name: "float",            rust_type: "f64",                                  length: LengthKind::Fixed },
    Builtin { id: TypeId::NTEXT,            name: "ntext",            rust_type: "String",                               length: LengthKind::Variable },
    Builtin { id: TypeId::BIT,              name: "bit",              rust_type: "bool",                                 length: LengthKind::Fixed },
    Builtin { id: TypeId::DECIMAL,          name: "decimal",          rust_type: "bigdecimal::BigDecimal",               length: LengthKind::Fixed },
    Builtin { id: TypeId::NUMERIC,          name: "numeric",          rust_type: "bigdecimal::BigDecimal",               length: LengthKind::Fixed },
    Builtin { id: TypeId::SMALLMONEY,       name: "smallmoney",       rust_type: "bigdecimal::BigDecimal",               length: LengthKind::Fixed },
    Builtin { id: TypeId::BIGINT,           name: "bigint",           rust_type: "i64",                                  length: LengthKind::Fixed },
    Builtin { id: TypeId::VARBINARY,        name: "varbinary",        rust_type: "Vec<u8>",                              length: LengthKind::Variable },
    Builtin { id: TypeId::VARCHAR,          name: "varchar",          rust_type: "String",                               length: LengthKind::Variable },
    Builtin { id: TypeId::BINARY,           name: "binary",           rust_type: "Vec<u8>",                              length: LengthKind::Fixed },
    Builtin { id: TypeId::CHAR,             name: "char",             rust_type: "String",                               length: LengthKind::Fixed },
    Builtin { id: TypeId::ROWVERSION,       name: "rowversion",       rust_type: "Vec<u8>",                              length: LengthKind::Fixed },
    Builtin { id: TypeId::NVARCHAR,         name: "nvarchar",         rust_type: "String",                               length: LengthKind::Variable },
    Builtin { id: TypeId::NCHAR,            name: "nchar",            rust_type: "String",                               length: LengthKind::Fixed },
    Builtin { id: TypeId::XML,              name: "xml",              rust_type: "String",                               length: LengthKind::Variable },
    // `sql_variant` (98) is deliberately absent: it has no scalar Rust
    // mapping, so encountering one fails the build by name.
];

/// Base [`TypeInfo`] for a builtin type, without a declared length.
pub(crate) fn builtin(id: TypeId) -> Option<TypeInfo> {
    BUILTINS.iter().find(|b| b.id == id).map(|b| TypeInfo {
        id: b.id,
        name: Cow::Borrowed(b.name),
        rust_type: Some(Cow::Borrowed(b.rust_type)),
        length: b.length,
        max_length: None,
        table: None,
    })
}

// (id, name) of every mapped builtin, for synthesizing inventories.
pub(crate) fn builtin_inventory() -> impl Iterator<Item = (TypeId, &'static str)> {
    BUILTINS.iter().map(|b| (b.id, b.name))
}

/// Maps engine type ids and user-defined type names to [`TypeInfo`],
/// including the column schemas of table types.
///
/// Built once per distinct server version from `sys.types`; content is
/// immutable afterwards. Unmappable entries in the server's inventory are
/// skipped at build time and fail by name or id when a statement actually
/// encounters them.
#[derive(Debug)]
pub struct TypeCatalog {
    version: ServerVersion,
    by_id: HashMap<u8, TypeInfo>,
    by_name: HashMap<String, TypeInfo>,
}

impl TypeCatalog {
    /// The server version this catalog was built against.
    pub fn version(&self) -> ServerVersion {
        self.version
    }

    /// Resolves a (type id, user-defined type name) pair as reported by a
    /// metadata function.
    ///
    /// `context` names the parameter or column asking, so an unmapped type
    /// surfaces as an error naming all three; there is no silent default.
    pub fn lookup(
        &self,
        type_id: TypeId,
        udt_name: Option<&str>,
        context: &str,
    ) -> Result<&TypeInfo> {
        let hit = match udt_name {
            Some(name) => self.by_name.get(name),
            None => self.by_id.get(&type_id.0),
        };

        hit.ok_or_else(|| Error::UnmappedType {
            type_id: type_id.0,
            udt_name: udt_name.map(str::to_owned),
            context: context.to_owned(),
        })
    }

    /// Builds the catalog over an established session.
    pub fn build<C: Client>(session: &mut Session<C>) -> Result<TypeCatalog> {
        let types = session.fetch(
            "SELECT t.system_type_id, t.user_type_id, s.name AS schema_name, t.name, \
                    t.is_table_type, t.max_length \
             FROM sys.types t \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             ORDER BY t.user_type_id",
        )?;

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        // (user_type_id, qualified name) of each table type; their column
        // schemas resolve in a second query.
        let mut tables: Vec<(i64, String)> = Vec::new();

        let system_type_id = types.column_index("system_type_id")?;
        let user_type_id = types.column_index("user_type_id")?;
        let schema_name = types.column_index("schema_name")?;
        let name = types.column_index("name")?;
        let is_table_type = types.column_index("is_table_type")?;
        let max_length = types.column_index("max_length")?;

        for row in &types.rows {
            let system_id = decode_type_id(row.try_get_i64(system_type_id)?)?;
            let user_id = row.try_get_i64(user_type_id)?;
            let qualified = format!(
                "{}.{}",
                row.try_get_str(schema_name)?,
                row.try_get_str(name)?
            );

            if row.try_get_bool(is_table_type)? {
                tables.push((user_id, qualified));
            } else if i64::from(system_id.0) == user_id {
                if let Some(info) = builtin(system_id) {
                    by_id.insert(system_id.0, info);
                }
            } else if let Some(base) = builtin(system_id) {
                // Alias type: carries the base type's mapping under its
                // own name, specialized to the declared length.
                by_name.insert(
                    qualified,
                    base.with_reported_length(row.try_get_i64(max_length)?),
                );
            }
        }

        if !tables.is_empty() {
            Self::resolve_table_types(session, &by_id, &mut by_name, &tables)?;
        }

        let version = session.version();

        tracing::debug!(
            builtins = by_id.len(),
            named = by_name.len(),
            %version,
            "built type catalog"
        );

        Ok(TypeCatalog {
            version,
            by_id,
            by_name,
        })
    }

    fn resolve_table_types<C: Client>(
        session: &mut Session<C>,
        by_id: &HashMap<u8, TypeInfo>,
        by_name: &mut HashMap<String, TypeInfo>,
        tables: &[(i64, String)],
    ) -> Result<()> {
        let columns = session.fetch(
            "SELECT tt.user_type_id, c.column_id, c.name, c.system_type_id, \
                    c.is_nullable, c.max_length \
             FROM sys.table_types tt \
             JOIN sys.columns c ON c.object_id = tt.type_table_object_id \
             ORDER BY tt.user_type_id, c.column_id",
        )?;

        let mut grouped: HashMap<i64, Vec<TvpColumn>> = HashMap::new();
        let mut skipped: Vec<i64> = Vec::new();

        let owner = columns.column_index("user_type_id")?;
        let name = columns.column_index("name")?;
        let system_type_id = columns.column_index("system_type_id")?;
        let is_nullable = columns.column_index("is_nullable")?;
        let max_length = columns.column_index("max_length")?;

        for row in &columns.rows {
            let owner_id = row.try_get_i64(owner)?;

            if skipped.contains(&owner_id) {
                continue;
            }

            let column_type = decode_type_id(row.try_get_i64(system_type_id)?)?;

            let Some(base) = by_id.get(&column_type.0) else {
                // One unmappable column poisons its table type, not the
                // whole catalog; the type then fails by name when used.
                tracing::debug!(
                    type_id = column_type.0,
                    column = row.try_get_str(name)?,
                    "skipping table type with an unmapped column type"
                );

                grouped.remove(&owner_id);
                skipped.push(owner_id);
                continue;
            };

            grouped.entry(owner_id).or_default().push(TvpColumn {
                name: row.try_get_str(name)?.to_owned(),
                type_info: base.with_reported_length(row.try_get_i64(max_length)?),
                nullable: row.try_get_bool(is_nullable)?,
            });
        }

        for (user_id, qualified) in tables {
            let Some(columns) = grouped.remove(user_id) else {
                continue;
            };

            let table = TableType {
                name: qualified.clone(),
                columns,
            };

            by_name.insert(
                qualified.clone(),
                TypeInfo {
                    id: TypeId::TABLE,
                    name: Cow::Owned(qualified.clone()),
                    rust_type: None,
                    length: LengthKind::Unknown,
                    max_length: None,
                    table: Some(Box::new(table)),
                },
            );
        }

        Ok(())
    }
}

pub(crate) fn decode_type_id(raw: i64) -> Result<TypeId> {
    u8::try_from(raw)
        .map(TypeId)
        .map_err(|_| err_protocol!("system type id {raw} is out of range"))
}

/// Lazily built [`TypeCatalog`] per server version, safe for concurrent
/// use.
///
/// Entries live as long as the registry; a failed build caches nothing and
/// the next request retries. Concurrent first requests for one version
/// share a single build.
#[derive(Debug, Default)]
pub struct TypeCatalogRegistry {
    catalogs: Mutex<HashMap<ServerVersion, Arc<OnceCell<Arc<TypeCatalog>>>>>,
}

impl TypeCatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog for the session's server version, building it on first
    /// use. The build runs outside the registry lock, so distinct versions
    /// never wait on each other.
    pub fn get_or_build<C: Client>(&self, session: &mut Session<C>) -> Result<Arc<TypeCatalog>> {
        let cell = self
            .catalogs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session.version())
            .or_default()
            .clone();

        cell.get_or_try_init(|| TypeCatalog::build(session).map(Arc::new))
            .cloned()
    }
}
