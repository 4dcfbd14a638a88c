//! Observed structure of a live table.

use crate::{Column, ForeignKey, PgType};

/// One live column as reported by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSnapshot {
    pub name: String,
    /// Observed type, if rowsmith models it
    pub pg_type: Option<PgType>,
    /// Type name as reported by the database
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnSnapshot {
    /// The snapshot of a column created from its declaration.
    pub fn declared(table: &str, column: &Column) -> Self {
        let default = if column.auto_generated && column.pg_type.serial_name().is_some() {
            Some(format!(
                "nextval('{}_{}_seq'::regclass)",
                table, column.name
            ))
        } else {
            column.default.clone()
        };
        Self {
            name: column.name.clone(),
            pg_type: Some(column.pg_type),
            data_type: column.pg_type.to_string().to_lowercase(),
            nullable: column.nullable,
            default,
        }
    }
}

/// The observed structure of one table, compared against an
/// [`Entity`](crate::Entity) during synchronization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
    /// Primary key columns in constraint order
    pub primary_key: Vec<String>,
    /// Name of the primary key constraint, if there is one
    pub primary_key_constraint: Option<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSnapshot {
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether a live foreign key covers exactly these columns.
    pub fn has_foreign_key_on(&self, columns: &[String]) -> bool {
        self.foreign_keys.iter().any(|fk| fk.columns == columns)
    }

    /// Rename a column everywhere it is referenced.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        let rename = |name: &mut String| {
            if *name == from {
                *name = to.to_string();
            }
        };
        for col in &mut self.columns {
            rename(&mut col.name);
        }
        self.primary_key.iter_mut().for_each(rename);
        for fk in &mut self.foreign_keys {
            fk.columns.iter_mut().for_each(rename);
        }
    }

    pub fn add_column(&mut self, column: ColumnSnapshot) {
        self.columns.push(column);
    }

    /// Drop a column. Postgres drops constraints that depend on it, so the
    /// snapshot does the same.
    pub fn drop_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
        if self.primary_key.iter().any(|c| c == name) {
            self.primary_key.clear();
            self.primary_key_constraint = None;
        }
        self.foreign_keys
            .retain(|fk| !fk.columns.iter().any(|c| c == name));
    }

    pub fn set_type(&mut self, name: &str, pg_type: PgType) {
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == name) {
            col.pg_type = Some(pg_type);
            col.data_type = pg_type.to_string().to_lowercase();
        }
    }

    /// Replace the primary key. An empty column list removes it.
    pub fn set_primary_key(&mut self, columns: Vec<String>) {
        self.primary_key_constraint = (!columns.is_empty()).then(|| format!("{}_pkey", self.name));
        for col in &mut self.columns {
            if columns.contains(&col.name) {
                col.nullable = false;
            }
        }
        self.primary_key = columns;
    }

    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        self.foreign_keys.push(fk);
    }
}
