//! Fetch and push against a vendor API

use anyhow::{Context as _, Result};
use ratelink_adapters::FetchParams;
use ratelink_core::value_to_text;
use serde_json::Value;
use tracing::info;

use crate::cli::{FetchArgs, PushArgs};
use crate::commands::{load_records, parse_query};
use crate::context::Context;
use crate::output::{print_field, print_section};

pub async fn fetch(ctx: &Context, args: FetchArgs) -> Result<()> {
    let adapter = ctx.adapter(args.vendor.vendor.as_deref())?;

    let mut params = FetchParams::new().with_cancellation(ctx.cancel.clone());
    for (name, value) in parse_query(&args.query)? {
        params = params.with_query(name, value);
    }
    if let Some(max_pages) = args.max_pages {
        params = params.with_max_pages(max_pages);
    }

    let outcome = adapter
        .get_data(args.data_type, params)
        .await
        .with_context(|| format!("Failed to fetch {} from '{}'", args.data_type, adapter.vendor_id()))?;

    for warning in &outcome.warnings {
        ctx.output.warning(warning);
    }
    if outcome.cancelled {
        ctx.output.warning("Fetch cancelled; showing records drained so far");
    }

    if let Some(path) = &args.out {
        let result = adapter
            .export_file(path, args.data_type, &outcome.records, None)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        ctx.output
            .success(&format!("Wrote {} record(s) to {}", result.created, path.display()));
    } else {
        ctx.output.write_records(&outcome.records)?;
    }

    info!(
        vendor = adapter.vendor_id(),
        data_type = %args.data_type,
        records = outcome.records.len(),
        pages = outcome.pages,
        "Fetch finished"
    );
    Ok(())
}

pub async fn push(ctx: &Context, args: PushArgs) -> Result<()> {
    let adapter = ctx.adapter(args.vendor.vendor.as_deref())?;
    let records = load_records(ctx, &args.file, args.data_type)?;

    if records.is_empty() {
        ctx.output.info("Nothing to send");
        return Ok(());
    }

    if args.dry_run {
        ctx.output
            .info(&format!("Dry run: {} record(s) would be sent to '{}'", records.len(), adapter.vendor_id()));
        return ctx.output.write_records(&records);
    }

    let summary = adapter
        .send_data(args.data_type, &records)
        .await
        .with_context(|| format!("Failed to send {} to '{}'", args.data_type, adapter.vendor_id()))?;

    match ctx.output.format() {
        crate::output::OutputFormat::Table => {
            print_section("Sent");
            print_field("Records", &summary.sent.to_string());
            print_field("Batches", &summary.batches.to_string());
            print_field("Failed", &summary.failed_records.len().to_string());
            for failed in &summary.failed_records {
                println!("    - {}", describe(failed));
            }
        }
        crate::output::OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&summary)?),
        _ => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if !summary.failed_records.is_empty() {
        anyhow::bail!("{} record(s) were rejected by the vendor", summary.failed_records.len());
    }
    Ok(())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => value_to_text(other),
    }
}
