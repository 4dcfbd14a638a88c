//! Bring a live table's structure in line with its declared [`Entity`].
//!
//! Synchronization runs a fixed sequence of steps against one table:
//!
//! 1. **create**: create the table (and its foreign keys) if it does not exist
//! 2. **rename**: apply caller-supplied column renames, keeping data
//! 3. **add**: add declared columns missing from the table
//! 4. **drop**: drop live columns the entity no longer declares
//! 5. **retype**: change columns whose live type differs from the declaration
//! 6. **primary key**: report (or, if enabled, replace) a mismatched key
//! 7. **foreign keys**: report (or, if enabled, add) missing foreign keys
//!
//! Each step works from the snapshot as left by the previous steps, so a
//! renamed column is neither re-added nor dropped. A failing change is
//! logged and recorded in the [`SyncReport`]; the run always continues with
//! the remaining changes and steps.

use crate::Result;
use crate::store::SchemaStore;
use indexmap::IndexMap;
use rowsmith_schema::{ColumnSnapshot, Entity, Schema, TableSnapshot};
use std::collections::HashSet;
use std::fmt;
use tracing::{error, info, warn};

mod change;
pub use change::Change;

/// One step of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    Create,
    Rename,
    Add,
    Drop,
    Retype,
    PrimaryKey,
    ForeignKeys,
}

impl SyncStep {
    /// Every step, in execution order.
    pub const ALL: [SyncStep; 7] = [
        SyncStep::Create,
        SyncStep::Rename,
        SyncStep::Add,
        SyncStep::Drop,
        SyncStep::Retype,
        SyncStep::PrimaryKey,
        SyncStep::ForeignKeys,
    ];
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Create => "create",
            SyncStep::Rename => "rename",
            SyncStep::Add => "add",
            SyncStep::Drop => "drop",
            SyncStep::Retype => "retype",
            SyncStep::PrimaryKey => "primary key",
            SyncStep::ForeignKeys => "foreign keys",
        };
        f.write_str(name)
    }
}

/// Which kind of constraint a [`SyncIssue::ConstraintMismatch`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::PrimaryKey => f.write_str("primary key"),
            ConstraintKind::ForeignKey => f.write_str("foreign key"),
        }
    }
}

/// Something a synchronization run could not bring in line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncIssue {
    /// A structural change was rejected by the store.
    #[error("{table}: {step} step failed on `{change}`: {message}")]
    StructuralChangeFailure {
        table: String,
        step: SyncStep,
        change: Change,
        message: String,
    },

    /// A live constraint differs from the declaration and was left alone.
    #[error("{table}: {kind} mismatch (live: [{}], declared: [{}])", .live.join(", "), .declared.join(", "))]
    ConstraintMismatch {
        table: String,
        kind: ConstraintKind,
        live: Vec<String>,
        declared: Vec<String>,
    },
}

/// Caller-controlled knobs for a synchronization run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Column renames, old name to new name, applied in order.
    pub renames: IndexMap<String, String>,
    /// Replace a mismatched primary key instead of only reporting it.
    pub apply_primary_key: bool,
    /// Add missing foreign keys instead of only reporting them.
    pub apply_foreign_keys: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn apply_primary_key(mut self, apply: bool) -> Self {
        self.apply_primary_key = apply;
        self
    }

    pub fn apply_foreign_keys(mut self, apply: bool) -> Self {
        self.apply_foreign_keys = apply;
        self
    }
}

/// Outcome of synchronizing one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub table: String,
    /// Changes that were applied (or, for a plan, would be applied), in order
    pub applied: Vec<Change>,
    pub issues: Vec<SyncIssue>,
}

impl SyncReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            applied: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// True if nothing needed doing and nothing went wrong.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.issues.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i, SyncIssue::StructuralChangeFailure { .. }))
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &SyncIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i, SyncIssue::ConstraintMismatch { .. }))
    }

    /// The DDL for the applied changes, one change per line group.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for change in &self.applied {
            sql.push_str(&change.to_sql(&self.table));
            sql.push('\n');
        }
        sql
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.table)?;
        if self.is_noop() {
            return writeln!(f, "  (up to date)");
        }
        for change in &self.applied {
            writeln!(f, "  {}", change)?;
        }
        for issue in &self.issues {
            writeln!(f, "  ! {}", issue)?;
        }
        Ok(())
    }
}

/// Step-by-step reconciliation state for one table.
///
/// `changes` proposes the changes of a step from the current snapshot;
/// `record` folds each outcome back in. Failed renames protect both names
/// from the add and drop steps.
struct Reconciler<'a> {
    entity: &'a Entity,
    options: &'a SyncOptions,
    live: Option<TableSnapshot>,
    protected: HashSet<String>,
    report: SyncReport,
}

impl<'a> Reconciler<'a> {
    fn new(entity: &'a Entity, options: &'a SyncOptions, live: Option<TableSnapshot>) -> Self {
        Self {
            entity,
            options,
            live,
            protected: HashSet::new(),
            report: SyncReport::new(&entity.name),
        }
    }

    fn changes(&mut self, step: SyncStep) -> Vec<Change> {
        let entity = self.entity;
        let Some(live) = &self.live else {
            return match step {
                // A fresh table gets its foreign keys right away
                SyncStep::Create => std::iter::once(Change::CreateTable(entity.clone()))
                    .chain(entity.foreign_keys.iter().cloned().map(Change::AddForeignKey))
                    .collect(),
                // Nothing to reconcile against until the table exists
                _ => Vec::new(),
            };
        };

        match step {
            SyncStep::Create => Vec::new(),

            SyncStep::Rename => {
                let mut names: HashSet<&str> = live.column_names().into_iter().collect();
                let mut changes = Vec::new();
                for (from, to) in &self.options.renames {
                    if names.contains(from.as_str())
                        && !names.contains(to.as_str())
                        && entity.has_column(to)
                    {
                        names.remove(from.as_str());
                        names.insert(to.as_str());
                        changes.push(Change::RenameColumn {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                }
                changes
            }

            SyncStep::Add => entity
                .columns
                .iter()
                .filter(|c| !live.has_column(&c.name) && !self.protected.contains(&c.name))
                .map(|c| Change::AddColumn(c.clone()))
                .collect(),

            SyncStep::Drop => live
                .columns
                .iter()
                .filter(|c| !entity.has_column(&c.name) && !self.protected.contains(&c.name))
                .map(|c| Change::DropColumn(c.name.clone()))
                .collect(),

            SyncStep::Retype => entity
                .columns
                .iter()
                .filter_map(|declared| {
                    let observed = live.column(&declared.name)?;
                    (observed.pg_type != Some(declared.pg_type)).then(|| Change::AlterColumnType {
                        name: declared.name.clone(),
                        from: observed.data_type.clone(),
                        to: declared.pg_type,
                    })
                })
                .collect(),

            SyncStep::PrimaryKey => {
                let declared: Vec<String> =
                    entity.primary_key().into_iter().map(String::from).collect();
                let same = declared.len() == live.primary_key.len()
                    && declared.iter().all(|c| live.primary_key.contains(c));
                if same {
                    return Vec::new();
                }

                warn!(
                    table = %entity.name,
                    live = ?live.primary_key,
                    declared = ?declared,
                    "primary key differs from declaration"
                );
                if self.options.apply_primary_key {
                    vec![Change::ReplacePrimaryKey {
                        drop: live.primary_key_constraint.clone(),
                        columns: declared,
                    }]
                } else {
                    let issue = SyncIssue::ConstraintMismatch {
                        table: entity.name.clone(),
                        kind: ConstraintKind::PrimaryKey,
                        live: live.primary_key.clone(),
                        declared,
                    };
                    self.report.issues.push(issue);
                    Vec::new()
                }
            }

            SyncStep::ForeignKeys => {
                let missing: Vec<_> = entity
                    .foreign_keys
                    .iter()
                    .filter(|fk| !live.has_foreign_key_on(&fk.columns))
                    .cloned()
                    .collect();
                if missing.is_empty() || self.options.apply_foreign_keys {
                    return missing.into_iter().map(Change::AddForeignKey).collect();
                }

                let live_fks: Vec<String> = live.foreign_keys.iter().map(describe_fk).collect();
                for fk in &missing {
                    warn!(
                        table = %entity.name,
                        foreign_key = %describe_fk(fk),
                        "foreign key missing from live table"
                    );
                    self.report.issues.push(SyncIssue::ConstraintMismatch {
                        table: entity.name.clone(),
                        kind: ConstraintKind::ForeignKey,
                        live: live_fks.clone(),
                        declared: vec![describe_fk(fk)],
                    });
                }
                Vec::new()
            }
        }
    }

    fn record(&mut self, step: SyncStep, change: Change, outcome: std::result::Result<(), String>) {
        let table = self.entity.name.as_str();
        match outcome {
            Ok(()) => {
                info!(table, %step, "{}", change);
                self.observe(&change);
                self.report.applied.push(change);
            }
            Err(message) => {
                error!(table, %step, error = %message, "failed to apply `{}`", change);
                if let Change::RenameColumn { from, to } = &change {
                    self.protected.insert(from.clone());
                    self.protected.insert(to.clone());
                }
                self.report.issues.push(SyncIssue::StructuralChangeFailure {
                    table: table.to_string(),
                    step,
                    change,
                    message,
                });
            }
        }
    }

    /// Update the snapshot to reflect a change the store accepted.
    fn observe(&mut self, change: &Change) {
        if let Change::CreateTable(entity) = change {
            self.live = Some(entity.snapshot());
            return;
        }
        if let Change::DropTable(_) = change {
            self.live = None;
            return;
        }
        let Some(live) = &mut self.live else {
            return;
        };
        match change {
            Change::RenameColumn { from, to } => live.rename_column(from, to),
            Change::AddColumn(col) => live.add_column(ColumnSnapshot::declared(&live.name, col)),
            Change::DropColumn(name) => live.drop_column(name),
            Change::AlterColumnType { name, to, .. } => live.set_type(name, *to),
            Change::ReplacePrimaryKey { columns, .. } => live.set_primary_key(columns.clone()),
            Change::AddForeignKey(fk) => live.add_foreign_key(fk.clone()),
            Change::CreateTable(_) | Change::DropTable(_) => {}
        }
    }

    fn finish(self) -> SyncReport {
        self.report
    }
}

fn describe_fk(fk: &rowsmith_schema::ForeignKey) -> String {
    format!(
        "({}) -> {}({})",
        fk.columns.join(", "),
        fk.references_table,
        fk.references_columns.join(", ")
    )
}

/// Compute the changes a synchronization run would make, without a store.
///
/// Every proposed change is assumed to succeed.
pub fn plan(entity: &Entity, live: Option<&TableSnapshot>, options: &SyncOptions) -> SyncReport {
    let mut reconciler = Reconciler::new(entity, options, live.cloned());
    for step in SyncStep::ALL {
        for change in reconciler.changes(step) {
            reconciler.observe(&change);
            reconciler.report.applied.push(change);
        }
    }
    reconciler.finish()
}

/// Runs synchronization, creation and teardown against a [`SchemaStore`].
pub struct Synchronizer<'s, S> {
    store: &'s S,
}

impl<'s, S: SchemaStore> Synchronizer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Bring one table in line with `entity`.
    ///
    /// Only failing to observe the live table is an error; rejected changes
    /// end up in the report.
    pub async fn synchronize(&self, entity: &Entity, options: &SyncOptions) -> Result<SyncReport> {
        let live = self.store.snapshot(&entity.name).await?;
        let mut reconciler = Reconciler::new(entity, options, live);

        for step in SyncStep::ALL {
            for change in reconciler.changes(step) {
                let outcome = self
                    .store
                    .apply(&entity.name, &change)
                    .await
                    .map_err(|e| e.to_string());
                reconciler.record(step, change, outcome);
            }
        }

        let report = reconciler.finish();
        if report.is_noop() {
            info!(table = %entity.name, "table is up to date");
        }
        Ok(report)
    }

    /// What [`synchronize`](Self::synchronize) would do, against the live
    /// table, without changing anything.
    pub async fn plan(&self, entity: &Entity, options: &SyncOptions) -> Result<SyncReport> {
        let live = self.store.snapshot(&entity.name).await?;
        Ok(plan(entity, live.as_ref(), options))
    }

    /// Synchronize every entity of a schema, referenced tables first.
    ///
    /// `options` applies to every table; renames only fire where the old
    /// name is live and the new name is declared.
    pub async fn synchronize_all(
        &self,
        schema: &Schema,
        options: &SyncOptions,
    ) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(schema.tables.len());
        for entity in schema.creation_order() {
            reports.push(self.synchronize(entity, options).await?);
        }
        Ok(reports)
    }

    /// Create a table and its foreign keys.
    pub async fn create_table(&self, entity: &Entity) -> Result<()> {
        self.store
            .apply(&entity.name, &Change::CreateTable(entity.clone()))
            .await?;
        info!(table = %entity.name, "created table");
        for fk in &entity.foreign_keys {
            self.store
                .apply(&entity.name, &Change::AddForeignKey(fk.clone()))
                .await?;
        }
        Ok(())
    }

    /// Create every missing table of a schema. Existing tables are left
    /// untouched. Returns the names of the tables created.
    pub async fn create_all(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for entity in schema.creation_order() {
            if self.store.snapshot(&entity.name).await?.is_some() {
                continue;
            }
            self.create_table(entity).await?;
            created.push(entity.name.clone());
        }
        Ok(created)
    }

    pub async fn drop_table(&self, table: &str) -> Result<()> {
        self.store
            .apply(table, &Change::DropTable(table.to_string()))
            .await?;
        info!(table, "dropped table");
        Ok(())
    }

    /// Drop every existing table of a schema, dependents first. Returns the
    /// names of the tables dropped.
    pub async fn drop_all(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for entity in schema.creation_order().into_iter().rev() {
            if self.store.snapshot(&entity.name).await?.is_none() {
                continue;
            }
            self.drop_table(&entity.name).await?;
            dropped.push(entity.name.clone());
        }
        Ok(dropped)
    }
}
