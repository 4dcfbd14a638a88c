//! `rowsmith`: synchronize and inspect the built-in `parent` / `sample`
//! tables.
//!
//! Usage:
//!   rowsmith schema
//!   rowsmith plan [--table sample] [--rename old=new]...
//!   rowsmith sync [--apply-pk] [--apply-fk] [--rename old=new]...
//!   rowsmith create | drop [--table sample]
//!
//! Connection settings come from `DATABASE_URL` (a `.env` file is read if
//! present). Logs go to stderr; set `RUST_LOG` to adjust.

use clap::{Args, Parser, Subcommand};
use rowsmith::{
    Config, ConfigError, Entity, PgStore, Schema, SchemaError, SchemaStore, SyncOptions,
    SyncReport, Synchronizer, TracedPool, sample,
};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "rowsmith", version)]
#[command(about = "Synchronize and inspect the sample schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the declared schema
    Schema,
    /// Show what `sync` would change, without changing anything
    Plan(SyncArgs),
    /// Bring live tables in line with the declared schema
    Sync(SyncArgs),
    /// Create missing tables
    Create(TableArg),
    /// Drop tables
    Drop(TableArg),
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[command(flatten)]
    table: TableArg,

    /// Rename a column instead of dropping and re-adding it (repeatable)
    #[arg(long = "rename", value_name = "OLD=NEW", value_parser = parse_rename)]
    renames: Vec<(String, String)>,

    /// Replace a primary key that differs from the declaration
    #[arg(long)]
    apply_pk: bool,

    /// Add missing foreign keys
    #[arg(long)]
    apply_fk: bool,
}

#[derive(Args, Debug)]
struct TableArg {
    /// Only this table (default: every declared table)
    #[arg(short, long)]
    table: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Rowsmith(#[from] rowsmith::Error),

    #[error("no declared table named '{0}'")]
    UnknownTable(String),

    #[error("{0} table(s) could not be fully synchronized")]
    Incomplete(usize),
}

fn parse_rename(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
            Ok((from.trim().to_string(), to.trim().to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got '{raw}'")),
    }
}

impl SyncArgs {
    fn options(&self) -> SyncOptions {
        self.renames
            .iter()
            .fold(SyncOptions::new(), |options, (from, to)| options.rename(from, to))
            .apply_primary_key(self.apply_pk)
            .apply_foreign_keys(self.apply_fk)
    }
}

/// The declared entities a command applies to, referenced tables first.
fn selected<'a>(schema: &'a Schema, table: &TableArg) -> Result<Vec<&'a Entity>, CliError> {
    match &table.table {
        None => Ok(schema.creation_order()),
        Some(name) => schema
            .get(name)
            .map(|entity| vec![entity])
            .ok_or_else(|| CliError::UnknownTable(name.clone())),
    }
}

fn connect() -> Result<PgStore, CliError> {
    let config = Config::from_env()?;
    info!(database = %config.redacted_url(), pool_size = config.pool_max_size, "connecting");
    Ok(PgStore::new(TracedPool::new(config.create_pool()?)))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rowsmith=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let schema = sample::schema()?;

    match cli.command {
        Command::Schema => print_schema(&schema),
        Command::Plan(args) => {
            let store = connect()?;
            let sync = Synchronizer::new(&store);
            let options = args.options();
            for entity in selected(&schema, &args.table)? {
                let report = sync.plan(entity, &options).await?;
                print!("{report}");
                if !report.applied.is_empty() {
                    println!("{}", report.to_sql());
                }
            }
        }
        Command::Sync(args) => {
            let store = connect()?;
            let sync = Synchronizer::new(&store);
            let options = args.options();
            debug!(?options, "synchronizing");

            let mut reports: Vec<SyncReport> = Vec::new();
            for entity in selected(&schema, &args.table)? {
                reports.push(sync.synchronize(entity, &options).await?);
            }
            for report in &reports {
                print!("{report}");
            }
            let incomplete = reports.iter().filter(|r| !r.is_clean()).count();
            if incomplete > 0 {
                return Err(CliError::Incomplete(incomplete));
            }
        }
        Command::Create(table) => {
            let store = connect()?;
            let sync = Synchronizer::new(&store);
            for entity in selected(&schema, &table)? {
                if store.snapshot(&entity.name).await?.is_some() {
                    println!("{}: already exists", entity.name);
                    continue;
                }
                sync.create_table(entity).await?;
                println!("{}: created", entity.name);
            }
        }
        Command::Drop(table) => {
            let store = connect()?;
            let sync = Synchronizer::new(&store);
            for entity in selected(&schema, &table)?.into_iter().rev() {
                if store.snapshot(&entity.name).await?.is_none() {
                    println!("{}: does not exist", entity.name);
                    continue;
                }
                sync.drop_table(&entity.name).await?;
                println!("{}: dropped", entity.name);
            }
        }
    }

    Ok(())
}

fn print_schema(schema: &Schema) {
    println!("Schema ({} tables):", schema.tables.len());
    println!();
    for table in schema.creation_order() {
        println!("  {} ({} columns)", table.name, table.columns.len());
        for col in &table.columns {
            let mut attrs = Vec::new();
            if col.primary_key {
                attrs.push("PK");
            }
            if !col.nullable {
                attrs.push("NOT NULL");
            }
            if col.auto_generated {
                attrs.push("AUTO");
            }
            if let Some(default) = &col.default {
                attrs.push(default);
            }

            let attrs_str = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };

            println!("    {}: {}{}", col.name, col.pg_type, attrs_str);
        }

        for fk in &table.foreign_keys {
            println!(
                "    FK: {} -> {}.{}",
                fk.columns.join(", "),
                fk.references_table,
                fk.references_columns.join(", ")
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rename() {
        assert_eq!(
            parse_rename("prompt=pmpt"),
            Ok(("prompt".to_string(), "pmpt".to_string()))
        );
        assert!(parse_rename("prompt").is_err());
        assert!(parse_rename("=pmpt").is_err());
    }

    #[test]
    fn test_sync_args() {
        let cli = Cli::try_parse_from([
            "rowsmith", "sync", "--table", "sample", "--rename", "a=b", "--rename", "c=d",
            "--apply-fk",
        ])
        .unwrap();
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        let options = args.options();
        assert_eq!(args.table.table.as_deref(), Some("sample"));
        assert_eq!(options.renames.len(), 2);
        assert_eq!(options.renames["c"], "d");
        assert!(options.apply_foreign_keys);
        assert!(!options.apply_primary_key);
    }

    #[test]
    fn test_selected_tables() {
        let schema = sample::schema().unwrap();
        let all = selected(&schema, &TableArg { table: None }).unwrap();
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["parent", "sample"]);

        let err = selected(
            &schema,
            &TableArg {
                table: Some("nope".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CliError::UnknownTable(_)));
    }
}
