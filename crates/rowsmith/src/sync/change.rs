//! Structural changes the synchronizer can apply to a table.

use rowsmith_schema::{Column, Entity, ForeignKey, PgType};
use rowsmith_sql::{quote_ident, quote_idents};
use std::fmt;

/// A single structural change to one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create the table (without foreign keys).
    CreateTable(Entity),
    /// Drop the table.
    DropTable(String),
    /// Rename a column, keeping its data.
    RenameColumn { from: String, to: String },
    /// Add a new column.
    AddColumn(Column),
    /// Drop an existing column.
    DropColumn(String),
    /// Change a column's type, converting existing values.
    AlterColumnType {
        name: String,
        /// Type name as the database reports it
        from: String,
        to: PgType,
    },
    /// Drop the current primary key (if any) and install a new one over
    /// `columns` (if non-empty).
    ReplacePrimaryKey {
        drop: Option<String>,
        columns: Vec<String>,
    },
    /// Add a foreign key constraint.
    AddForeignKey(ForeignKey),
}

impl Change {
    /// Generate the DDL for this change. May contain several statements.
    pub fn to_sql(&self, table_name: &str) -> String {
        let table = quote_ident(table_name);
        match self {
            Change::CreateTable(entity) => entity.to_create_table_sql(),
            Change::DropTable(name) => format!("DROP TABLE {};", quote_ident(name)),
            Change::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                table,
                quote_ident(from),
                quote_ident(to)
            ),
            Change::AddColumn(col) => format!("ALTER TABLE {} ADD COLUMN {};", table, col.to_sql()),
            Change::DropColumn(name) => {
                format!("ALTER TABLE {} DROP COLUMN {};", table, quote_ident(name))
            }
            Change::AlterColumnType { name, to, .. } => {
                let col = quote_ident(name);
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                    table, col, to, col, to
                )
            }
            Change::ReplacePrimaryKey { drop, columns } => {
                let mut statements = Vec::with_capacity(2);
                if let Some(constraint) = drop {
                    statements.push(format!(
                        "ALTER TABLE {} DROP CONSTRAINT {};",
                        table,
                        quote_ident(constraint)
                    ));
                }
                if !columns.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} ADD PRIMARY KEY ({});",
                        table,
                        quote_idents(columns)
                    ));
                }
                statements.join("\n")
            }
            Change::AddForeignKey(fk) => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {};",
                table,
                quote_ident(&fk.constraint_name(table_name)),
                fk.to_sql()
            ),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTable(t) => write!(f, "+ table {}", t.name),
            Change::DropTable(name) => write!(f, "- table {}", name),
            Change::RenameColumn { from, to } => write!(f, "~ rename {} -> {}", from, to),
            Change::AddColumn(col) => {
                let nullable = if col.nullable { " (nullable)" } else { "" };
                write!(f, "+ {}: {}{}", col.name, col.ddl_type(), nullable)
            }
            Change::DropColumn(name) => write!(f, "- {}", name),
            Change::AlterColumnType { name, from, to } => {
                write!(f, "~ {}: {} -> {}", name, from, to)
            }
            Change::ReplacePrimaryKey { columns, .. } if columns.is_empty() => {
                write!(f, "- PRIMARY KEY")
            }
            Change::ReplacePrimaryKey { columns, .. } => {
                write!(f, "~ PRIMARY KEY ({})", columns.join(", "))
            }
            Change::AddForeignKey(fk) => write!(
                f,
                "+ FOREIGN KEY ({}) -> {}.{}",
                fk.columns.join(", "),
                fk.references_table,
                fk.references_columns.join(", ")
            ),
        }
    }
}
