//! Audit command - report orphaned foreign key values.

use super::open_database;
use anyhow::{bail, Result};
use fk_resolver::audit_referential_integrity;
use fk_resolver::config::ResolverConfig;
use fk_resolver::integrity::IntegrityAudit;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Run the audit command
pub fn run(
    database: PathBuf,
    schema: Option<String>,
    strict: bool,
    json: bool,
    progress: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = ResolverConfig::load_optional(config.as_deref())?;
    let schema = config.resolve_schema(schema);
    let conn = open_database(&database)?;

    if !json {
        eprintln!("Auditing foreign keys in: {}", database.display());
    }

    let start_time = Instant::now();
    let pb = if progress && !json {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("valid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Checking foreign keys...");
        Some(pb)
    } else {
        None
    };

    let audit = audit_referential_integrity(&conn, schema.as_deref())?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&audit)?);
    } else {
        print_audit(&audit, start_time.elapsed());
    }

    if strict && !audit.is_clean() {
        bail!(
            "Audit FAILED: {} foreign key(s) with orphaned rows",
            audit.violations.len()
        );
    }
    Ok(())
}

fn print_audit(audit: &IntegrityAudit, elapsed: Duration) {
    eprintln!(
        "Checked {} foreign key(s) in {:.2}s",
        audit.edges_checked,
        elapsed.as_secs_f64()
    );

    if audit.is_clean() {
        println!("No orphaned rows found.");
    } else {
        println!(
            "{} foreign key(s) with orphaned rows ({} rows total):",
            audit.violations.len(),
            audit.total_orphaned()
        );
        for v in &audit.violations {
            let samples: Vec<String> = v.sample_ids.iter().map(|s| s.to_string()).collect();
            println!("  - {}", v);
            println!("      sample {}: [{}]", v.sample_column, samples.join(", "));
        }
    }

    if !audit.skipped.is_empty() {
        eprintln!("\nSkipped {} foreign key(s):", audit.skipped.len());
        for skipped in &audit.skipped {
            eprintln!("  - {}", skipped);
        }
    }
}
