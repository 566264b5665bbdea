mod audit;
mod order;
mod truncate;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fk-resolver")]
#[command(author = "Helge Sverre <helge.sverre@gmail.com>")]
#[command(version)]
#[command(about = "Order, truncate and audit database tables by their foreign keys", long_about = None)]
pub struct Cli {
    /// Log library activity (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print tables in dependency order (referenced tables first)
    Order {
        /// DuckDB database file
        database: PathBuf,

        /// Schema to inspect (default: main)
        #[arg(short, long)]
        schema: Option<String>,

        /// Print deletion order instead (dependents first)
        #[arg(short, long)]
        reverse: bool,

        /// Fail if tables form circular foreign keys
        #[arg(long)]
        check: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Empty tables in an order that respects foreign keys
    Truncate {
        /// DuckDB database file
        database: PathBuf,

        /// Only truncate specific tables (comma-separated)
        #[arg(short, long)]
        tables: Option<String>,

        /// Request TRUNCATE ... CASCADE where supported
        #[arg(long)]
        cascade: bool,

        /// Schema to operate on (default: main)
        #[arg(short, long)]
        schema: Option<String>,

        /// Show the deletion order without modifying anything
        #[arg(long)]
        dry_run: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Show progress while truncating
        #[arg(short, long)]
        progress: bool,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Find rows whose foreign key points at a missing parent row
    Audit {
        /// DuckDB database file
        database: PathBuf,

        /// Schema to audit (default: main)
        #[arg(short, long)]
        schema: Option<String>,

        /// Exit non-zero if any orphaned rows are found
        #[arg(long)]
        strict: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Show progress while auditing
        #[arg(short, long)]
        progress: bool,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Order {
            database,
            schema,
            reverse,
            check,
            json,
            config,
        } => order::run(database, schema, reverse, check, json, config),
        Commands::Truncate {
            database,
            tables,
            cascade,
            schema,
            dry_run,
            json,
            progress,
            config,
        } => truncate::run(truncate::TruncateOptions {
            database,
            tables,
            cascade,
            schema,
            dry_run,
            json,
            progress,
            config,
        }),
        Commands::Audit {
            database,
            schema,
            strict,
            json,
            progress,
            config,
        } => audit::run(database, schema, strict, json, progress, config),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "fk-resolver", &mut io::stdout());
            Ok(())
        }
    }
}

/// Open the database file, refusing to create a new one
fn open_database(path: &std::path::Path) -> anyhow::Result<fk_resolver::duckdb::DuckDbConnection> {
    if !path.exists() {
        anyhow::bail!("database file does not exist: {}", path.display());
    }
    fk_resolver::duckdb::DuckDbConnection::open(path)
}
