//! Truncate command - empty tables dependents-first.

use super::open_database;
use anyhow::{bail, Result};
use fk_resolver::config::ResolverConfig;
use fk_resolver::connection::{Mutator, SchemaIntrospector};
use fk_resolver::schema::ForeignKey;
use fk_resolver::truncate::{plan_truncation, TruncationResult};
use fk_resolver::{get_foreign_key_dependencies, safe_truncate_tables};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Truncate command options
pub struct TruncateOptions {
    pub database: PathBuf,
    pub tables: Option<String>,
    pub cascade: bool,
    pub schema: Option<String>,
    pub dry_run: bool,
    pub json: bool,
    pub progress: bool,
    pub config: Option<PathBuf>,
}

/// Run the truncate command
pub fn run(opts: TruncateOptions) -> Result<()> {
    let config = ResolverConfig::load_optional(opts.config.as_deref())?;
    let schema = config.resolve_schema(opts.schema);
    let tables = config.resolve_tables(opts.tables.as_deref());
    let cascade = opts.cascade || config.cascade;
    let conn = open_database(&opts.database)?;

    if opts.dry_run {
        let deps = get_foreign_key_dependencies(&conn, schema.as_deref())?;
        let plan = plan_truncation(&deps.ordered_tables, tables.as_deref());
        if opts.json {
            println!(
                "{}",
                serde_json::json!({ "order": plan.order, "unknown": plan.unknown })
            );
        } else {
            eprintln!("Dry run: would truncate {} tables in order:", plan.order.len());
            for (i, table) in plan.order.iter().enumerate() {
                println!("{:>4}. {}", i + 1, table);
            }
            for table in &plan.unknown {
                eprintln!("  not found: {}", table);
            }
        }
        return Ok(());
    }

    let pb = if opts.progress && !opts.json {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} tables {msg}")
                .expect("valid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let tracked = ProgressMutator {
        inner: &conn,
        pb: pb.as_ref(),
    };
    let result = safe_truncate_tables(&tracked, tables.as_deref(), cascade, schema.as_deref())?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        bail!("{} table(s) could not be truncated", result.errors.len());
    }
    Ok(())
}

fn print_result(result: &TruncationResult) {
    eprintln!("Truncated {} of {} tables:", result.truncated.len(), result.order_used.len());
    for table in &result.truncated {
        println!("  - {}", table);
    }
    if !result.errors.is_empty() {
        eprintln!("\nErrors:");
        for err in &result.errors {
            eprintln!("  - {}", err);
        }
    }
}

/// Ticks a progress bar as tables are emptied
struct ProgressMutator<'a, C> {
    inner: &'a C,
    pb: Option<&'a ProgressBar>,
}

impl<C: SchemaIntrospector> SchemaIntrospector for ProgressMutator<'_, C> {
    fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        self.inner.list_tables(schema)
    }

    fn list_foreign_keys(&self, table: &str, schema: Option<&str>) -> Result<Vec<ForeignKey>> {
        self.inner.list_foreign_keys(table, schema)
    }
}

impl<C: Mutator> Mutator for ProgressMutator<'_, C> {
    fn truncate(&self, table: &str, schema: Option<&str>, cascade: bool) -> Result<()> {
        if let Some(pb) = self.pb {
            pb.set_message(table.to_string());
        }
        let result = self.inner.truncate(table, schema, cascade);
        if result.is_ok() {
            self.tick();
        }
        result
    }

    fn delete(&self, table: &str, schema: Option<&str>) -> Result<()> {
        let result = self.inner.delete(table, schema);
        if result.is_ok() {
            self.tick();
        }
        result
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }
}

impl<C> ProgressMutator<'_, C> {
    fn tick(&self) {
        if let Some(pb) = self.pb {
            pb.inc(1);
        }
    }
}
