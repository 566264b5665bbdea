//! Order command - print tables in foreign-key dependency order.

use super::open_database;
use anyhow::{bail, Result};
use fk_resolver::config::ResolverConfig;
use fk_resolver::get_foreign_key_dependencies;
use std::path::PathBuf;

/// Run the order command
pub fn run(
    database: PathBuf,
    schema: Option<String>,
    reverse: bool,
    check: bool,
    json: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = ResolverConfig::load_optional(config.as_deref())?;
    let schema = config.resolve_schema(schema);
    let conn = open_database(&database)?;

    let deps = get_foreign_key_dependencies(&conn, schema.as_deref())?;
    let blocking_cycles: Vec<_> = deps
        .circular
        .iter()
        .filter(|c| !c.is_self_reference())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&deps)?);
    } else {
        if deps.ordered_tables.is_empty() {
            eprintln!("No tables found.");
            return Ok(());
        }

        if !deps.circular.is_empty() {
            eprintln!("Circular dependencies detected:");
            for cycle in &deps.circular {
                eprintln!("  - {}", cycle.display());
            }
            eprintln!();
        }

        let tables = if reverse {
            deps.reversed()
        } else {
            deps.ordered_tables.clone()
        };
        let label = if reverse { "Deletion" } else { "Dependency" };
        eprintln!("{} order ({} tables):", label, tables.len());
        for (i, table) in tables.iter().enumerate() {
            println!("{:>4}. {}", i + 1, table);
        }
    }

    if check && !blocking_cycles.is_empty() {
        bail!(
            "Check FAILED: {} circular foreign key group(s) prevent a safe ordering",
            blocking_cycles.len()
        );
    }

    Ok(())
}
