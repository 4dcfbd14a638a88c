//! Entity definitions and live table snapshots for rowsmith.
//!
//! An [`Entity`] is the declared shape of one table: its columns, their
//! types, nullability and defaults, the primary key, and foreign keys.
//! Entities are built once with [`Entity::builder`] and never mutated.
//!
//! A [`TableSnapshot`] is what the database currently has for a table. The
//! synchronizer compares the two and keeps the snapshot up to date while it
//! applies changes.
//!
//! ## Naming Convention
//!
//! **Table names use singular form** (e.g., `parent`, `sample`).
//!
//! ```
//! use rowsmith_schema::{Column, Entity, PgType};
//!
//! let parent = Entity::builder("parent")
//!     .column(Column::new("id", PgType::Integer).primary_key().auto())
//!     .column(Column::new("name", PgType::Varchar(None)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(parent.primary_key(), vec!["id"]);
//! ```

use indexmap::{IndexMap, IndexSet};
use rowsmith_sql::{quote_ident, quote_idents};
use std::fmt;

mod snapshot;
pub use snapshot::{ColumnSnapshot, TableSnapshot};

/// Errors raised while declaring entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("entity name must not be empty")]
    EmptyName,

    #[error("{table}: column name must not be empty")]
    EmptyColumnName { table: String },

    #[error("{table}: column '{column}' is declared twice")]
    DuplicateColumn { table: String, column: String },

    #[error("{table}: foreign key uses undeclared column '{column}'")]
    UnknownForeignKeyColumn { table: String, column: String },

    #[error("{table}: invalid foreign key reference '{reference}' (expected table.column)")]
    InvalidReference { table: String, reference: String },

    #[error("table '{0}' is declared twice")]
    DuplicateTable(String),
}

/// Postgres column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgType {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// BOOLEAN
    Boolean,
    /// VARCHAR, optionally length-limited (short text)
    Varchar(Option<u32>),
    /// TEXT (long text)
    Text,
    /// JSONB
    Jsonb,
    /// TIMESTAMP (without time zone)
    Timestamp,
    /// TIMESTAMPTZ
    Timestamptz,
}

impl PgType {
    /// Map an `information_schema.columns` type description to a `PgType`.
    ///
    /// Returns `None` for types rowsmith does not model.
    pub fn from_information_schema(data_type: &str, max_length: Option<i32>) -> Option<PgType> {
        let ty = match data_type {
            "smallint" => PgType::SmallInt,
            "integer" => PgType::Integer,
            "bigint" => PgType::BigInt,
            "real" => PgType::Real,
            "double precision" => PgType::DoublePrecision,
            "boolean" => PgType::Boolean,
            "character varying" => PgType::Varchar(max_length.and_then(|n| u32::try_from(n).ok())),
            "text" => PgType::Text,
            "jsonb" => PgType::Jsonb,
            "timestamp without time zone" => PgType::Timestamp,
            "timestamp with time zone" => PgType::Timestamptz,
            _ => return None,
        };
        Some(ty)
    }

    /// The serial pseudo-type for auto-generated integer columns.
    pub fn serial_name(&self) -> Option<&'static str> {
        match self {
            PgType::SmallInt => Some("SMALLSERIAL"),
            PgType::Integer => Some("SERIAL"),
            PgType::BigInt => Some("BIGSERIAL"),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, PgType::SmallInt | PgType::Integer | PgType::BigInt)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PgType::Real | PgType::DoublePrecision)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PgType::Varchar(_) | PgType::Text)
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgType::SmallInt => write!(f, "SMALLINT"),
            PgType::Integer => write!(f, "INTEGER"),
            PgType::BigInt => write!(f, "BIGINT"),
            PgType::Real => write!(f, "REAL"),
            PgType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            PgType::Boolean => write!(f, "BOOLEAN"),
            PgType::Varchar(Some(n)) => write!(f, "VARCHAR({})", n),
            PgType::Varchar(None) => write!(f, "VARCHAR"),
            PgType::Text => write!(f, "TEXT"),
            PgType::Jsonb => write!(f, "JSONB"),
            PgType::Timestamp => write!(f, "TIMESTAMP"),
            PgType::Timestamptz => write!(f, "TIMESTAMPTZ"),
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Postgres type
    pub pg_type: PgType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any), e.g. `now()` or `1`
    pub default: Option<String>,
    /// Whether this column is part of the primary key
    pub primary_key: bool,
    /// Whether the store generates the value (serial)
    pub auto_generated: bool,
    /// Doc comment (if any)
    pub doc: Option<String>,
}

impl Column {
    /// A nullable column with no default.
    pub fn new(name: impl Into<String>, pg_type: PgType) -> Self {
        Self {
            name: name.into(),
            pg_type,
            nullable: true,
            default: None,
            primary_key: false,
            auto_generated: false,
            doc: None,
        }
    }

    /// Mark the column as part of the primary key. Key columns are never null.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value expression.
    pub fn default(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Let the store generate values (SERIAL for integer types).
    pub fn auto(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Whether the store fills this column when an insert omits it.
    pub fn has_store_default(&self) -> bool {
        self.auto_generated || self.default.is_some()
    }

    /// The type as written in DDL (serial pseudo-types for generated columns).
    pub fn ddl_type(&self) -> String {
        if self.auto_generated
            && let Some(serial) = self.pg_type.serial_name()
        {
            return serial.to_string();
        }
        self.pg_type.to_string()
    }

    /// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    ///
    /// Does not include the primary key clause.
    pub fn to_sql(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.ddl_type());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default
            && !self.auto_generated
        {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        def
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Column(s) in this table
    pub columns: Vec<String>,
    /// Referenced table
    pub references_table: String,
    /// Referenced column(s)
    pub references_columns: Vec<String>,
}

impl ForeignKey {
    /// Constraint name, following the Postgres default `{table}_{columns}_fkey`.
    pub fn constraint_name(&self, table: &str) -> String {
        format!("{}_{}_fkey", table, self.columns.join("_"))
    }

    /// Render as `FOREIGN KEY (..) REFERENCES ..(..)`.
    pub fn to_sql(&self) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_idents(&self.columns),
            quote_ident(&self.references_table),
            quote_idents(&self.references_columns)
        )
    }
}

/// Parse a foreign key reference like `parent.id` or `parent(id)`.
pub fn parse_fk_reference(fk_ref: &str) -> Option<(&str, &str)> {
    // Try "table.column" format first
    if let Some((table, col)) = fk_ref.split_once('.')
        && !table.is_empty()
        && !col.is_empty()
    {
        return Some((table, col));
    }

    // Try "table(column)" format
    if let Some(paren_idx) = fk_ref.find('(')
        && fk_ref.ends_with(')')
    {
        let table = &fk_ref[..paren_idx];
        let col = &fk_ref[paren_idx + 1..fk_ref.len() - 1];
        if !table.is_empty() && !col.is_empty() {
            return Some((table, col));
        }
    }

    None
}

/// A declared entity: the schema of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Table name
    pub name: String,
    /// Columns, in declaration order
    pub columns: Vec<Column>,
    /// Foreign keys
    pub foreign_keys: Vec<ForeignKey>,
    /// Doc comment
    pub doc: Option<String>,
}

impl Entity {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            columns: Vec::new(),
            references: Vec::new(),
            doc: None,
        }
    }

    /// Look up a declared column.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key columns, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| c.primary_key)
    }

    /// Generate the CREATE TABLE statement.
    ///
    /// Does not include foreign key constraints; those are added separately
    /// so that table creation order does not matter.
    pub fn to_create_table_sql(&self) -> String {
        let pk_columns = self.primary_key();

        // If there's more than one PK column, we need a table constraint
        let use_table_pk_constraint = pk_columns.len() > 1;

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let mut def = format!("    {}", col.to_sql());
                if col.primary_key && !use_table_pk_constraint {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect();

        if use_table_pk_constraint {
            parts.push(format!("    PRIMARY KEY ({})", quote_idents(&pk_columns)));
        }

        format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_ident(&self.name),
            parts.join(",\n")
        )
    }

    /// The snapshot a freshly created table for this entity would have
    /// (foreign keys are not part of table creation).
    pub fn snapshot(&self) -> TableSnapshot {
        let primary_key: Vec<String> = self.primary_key().into_iter().map(String::from).collect();
        TableSnapshot {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnSnapshot::declared(&self.name, c))
                .collect(),
            primary_key_constraint: (!primary_key.is_empty()).then(|| format!("{}_pkey", self.name)),
            primary_key,
            foreign_keys: Vec::new(),
        }
    }
}

/// Builder for [`Entity`].
pub struct EntityBuilder {
    name: String,
    columns: Vec<Column>,
    references: Vec<(Vec<String>, String)>,
    doc: Option<String>,
}

impl EntityBuilder {
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare a foreign key from `column` to a `table.column` reference.
    pub fn foreign_key(mut self, column: impl Into<String>, reference: impl Into<String>) -> Self {
        self.references.push((vec![column.into()], reference.into()));
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn build(self) -> Result<Entity, SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let mut seen = IndexSet::new();
        for col in &self.columns {
            if col.name.is_empty() {
                return Err(SchemaError::EmptyColumnName {
                    table: self.name.clone(),
                });
            }
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: col.name.clone(),
                });
            }
        }

        let mut foreign_keys = Vec::with_capacity(self.references.len());
        for (columns, reference) in self.references {
            for column in &columns {
                if !seen.contains(column.as_str()) {
                    return Err(SchemaError::UnknownForeignKeyColumn {
                        table: self.name.clone(),
                        column: column.clone(),
                    });
                }
            }
            let Some((table, target)) = parse_fk_reference(&reference) else {
                return Err(SchemaError::InvalidReference {
                    table: self.name.clone(),
                    reference,
                });
            };
            foreign_keys.push(ForeignKey {
                columns,
                references_table: table.to_string(),
                references_columns: vec![target.to_string()],
            });
        }

        Ok(Entity {
            name: self.name,
            columns: self.columns,
            foreign_keys,
            doc: self.doc,
        })
    }
}

/// A set of declared entities.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Entities in the schema, indexed by table name
    pub tables: IndexMap<String, Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Table names must be unique.
    pub fn with(mut self, entity: Entity) -> Result<Self, SchemaError> {
        self.insert(entity)?;
        Ok(self)
    }

    pub fn insert(&mut self, entity: Entity) -> Result<(), SchemaError> {
        if self.tables.contains_key(&entity.name) {
            return Err(SchemaError::DuplicateTable(entity.name));
        }
        self.tables.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.tables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.tables.values()
    }

    /// Entities ordered so that referenced tables come before the tables
    /// that reference them. Cycles fall back to declaration order.
    pub fn creation_order(&self) -> Vec<&Entity> {
        fn visit<'a>(
            schema: &'a Schema,
            entity: &'a Entity,
            visiting: &mut IndexSet<&'a str>,
            done: &mut IndexSet<&'a str>,
            out: &mut Vec<&'a Entity>,
        ) {
            if done.contains(entity.name.as_str()) || !visiting.insert(entity.name.as_str()) {
                return;
            }
            for fk in &entity.foreign_keys {
                if fk.references_table != entity.name
                    && let Some(target) = schema.get(&fk.references_table)
                {
                    visit(schema, target, visiting, done, out);
                }
            }
            visiting.shift_remove(entity.name.as_str());
            done.insert(entity.name.as_str());
            out.push(entity);
        }

        let mut visiting = IndexSet::new();
        let mut done = IndexSet::new();
        let mut out = Vec::with_capacity(self.tables.len());
        for entity in self.tables.values() {
            visit(self, entity, &mut visiting, &mut done, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests;
