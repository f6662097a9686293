//! Subcommand implementations

pub mod files;
pub mod remote;
pub mod vendors;

use anyhow::{Context as _, Result};
use comfy_table::Cell;
use ratelink_core::{ConnectionTestResult, DataType, ImportResult, Record, ValidationReport};
use std::path::Path;

use crate::context::Context;
use crate::output::{print_field, print_list_field, print_section, status_badge, TableDisplay};

/// Split `name=value` arguments
pub fn parse_query(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("Query parameter must be NAME=VALUE (got '{}')", pair))?;
            anyhow::ensure!(!name.trim().is_empty(), "Query parameter name is empty in '{}'", pair);
            Ok((name.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Canonical records from a JSON array, or from any importable file
pub fn load_records(ctx: &Context, path: &Path, kind: DataType) -> Result<Vec<Record>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        return read_json_records(path);
    }

    let outcome = ctx
        .pipeline(None)
        .import_file(path, kind, None, None, Some(&ctx.cancel))
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    for error in &outcome.result.errors {
        ctx.output.warning(error);
    }
    Ok(outcome.records)
}

pub fn read_json_records(path: &Path) -> Result<Vec<Record>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of objects", path.display()))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl TableDisplay for ImportResult {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(status_badge(if self.success { "success" } else { "failed" })),
            Cell::new(self.created),
            Cell::new(self.updated),
            Cell::new(self.skipped),
            Cell::new(self.errors.len()),
        ]
    }

    fn display_single(&self) {
        let status = if self.cancelled {
            "cancelled"
        } else if self.success {
            "success"
        } else if self.processed() > 0 {
            "partial"
        } else {
            "failed"
        };
        print_section("Result");
        print_field("Status", &status_badge(status));
        print_field("Created", &self.created.to_string());
        print_field("Updated", &self.updated.to_string());
        print_field("Skipped", &self.skipped.to_string());
        print_list_field("Errors", &self.errors);
        print_list_field("Warnings", &self.warnings);
    }

    fn display_compact(&self) {
        println!(
            "success={} created={} updated={} skipped={} errors={} warnings={}",
            self.success,
            self.created,
            self.updated,
            self.skipped,
            self.errors.len(),
            self.warnings.len()
        );
    }
}

impl TableDisplay for ValidationReport {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(status_badge(if self.valid { "valid" } else { "invalid" })),
            Cell::new(self.error_count()),
            Cell::new(self.warnings.len()),
            Cell::new(&self.suggestion),
        ]
    }

    fn display_single(&self) {
        print_section("Validation");
        print_field("Status", &status_badge(if self.valid { "valid" } else { "invalid" }));
        print_list_field("Errors", &self.flattened_errors());
        print_list_field("Warnings", &self.warnings);
        print_field("Suggestion", &self.suggestion);
    }

    fn display_compact(&self) {
        println!(
            "valid={} errors={} warnings={}\t{}",
            self.valid,
            self.error_count(),
            self.warnings.len(),
            self.suggestion
        );
    }
}

impl TableDisplay for ConnectionTestResult {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(status_badge(if self.success { "connected" } else { "failed" })),
            Cell::new(&self.message),
        ]
    }

    fn display_single(&self) {
        print_section("Connection");
        print_field("Connected", yes_no(self.success));
        print_field("Message", &self.message);
    }

    fn display_compact(&self) {
        println!("{}\t{}", self.success, self.message);
    }
}
