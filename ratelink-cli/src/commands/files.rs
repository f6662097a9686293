//! File import, validation, export and templates

use anyhow::{Context as _, Result};
use ratelink_adapters::InMemorySink;
use ratelink_import::ImportOutcome;

use crate::cli::{ExportArgs, FileArgs, ImportArgs, TemplateArgs};
use crate::commands::read_json_records;
use crate::context::{load_mapping, Context};
use crate::output::{format_bytes, print_field, print_list_field, print_optional_field, print_section, OutputFormat};

pub fn import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let mapping = load_mapping(args.file.mapping.as_deref())?;
    let sink = InMemorySink::new();
    let path = &args.file.file;

    let outcome = match args.vendor.as_deref() {
        Some(vendor) => ctx
            .adapter(Some(vendor))?
            .import_file(path, args.file.data_type, mapping.as_ref(), Some(&sink), Some(&ctx.cancel))
            .with_context(|| format!("Failed to import {}", path.display()))?,
        None => ctx
            .pipeline(args.file.max_increase)
            .import_file(path, args.file.data_type, mapping.as_ref(), Some(&sink), Some(&ctx.cancel))
            .with_context(|| format!("Failed to import {}", path.display()))?,
    };

    write_outcome(ctx, &outcome, args.show_records)?;

    if !outcome.result.success && outcome.result.processed() == 0 {
        anyhow::bail!("Nothing was imported from {}", path.display());
    }
    Ok(())
}

fn write_outcome(ctx: &Context, outcome: &ImportOutcome, show_records: bool) -> Result<()> {
    if ctx.output.format() != OutputFormat::Table {
        return match ctx.output.format() {
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(outcome)?);
                Ok(())
            }
            OutputFormat::Compact => ctx.output.write(&outcome.result),
            _ => {
                println!("{}", serde_json::to_string_pretty(outcome)?);
                Ok(())
            }
        };
    }

    print_section("File");
    print_field("Rows read", &outcome.rows_read.to_string());
    print_field("SHA-256", &outcome.checksum);
    ctx.output.write(&outcome.result)?;
    if !outcome.report.valid || !outcome.report.warnings.is_empty() {
        ctx.output.write(&outcome.report)?;
    }
    if show_records {
        ctx.output.write_records(&outcome.records)?;
    }
    Ok(())
}

pub fn validate(ctx: &Context, args: FileArgs) -> Result<()> {
    let pipeline = ctx.pipeline(args.max_increase);
    let size = std::fs::metadata(&args.file).map(|m| m.len()).ok();
    let report = pipeline
        .validate_file(&args.file, args.data_type, Some(&ctx.cancel))
        .with_context(|| format!("Failed to validate {}", args.file.display()))?;

    if ctx.output.format() == OutputFormat::Table {
        print_section("File");
        print_field("Path", &args.file.display().to_string());
        print_optional_field("Size", size.map(format_bytes).as_deref());
    }
    ctx.output.write(&report)?;

    if !report.valid {
        anyhow::bail!("{} has {} validation error(s)", args.file.display(), report.error_count());
    }
    Ok(())
}

pub fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let mapping = load_mapping(args.mapping.as_deref())?;
    let records = read_json_records(&args.input)?;

    let result = ctx
        .pipeline(None)
        .export_file(&args.destination, args.data_type, &records, mapping.as_ref())
        .with_context(|| format!("Failed to export to {}", args.destination.display()))?;

    ctx.output.success(&format!(
        "Exported {} {} record(s) to {}",
        result.created,
        args.data_type,
        args.destination.display()
    ));
    Ok(())
}

pub fn template(ctx: &Context, args: TemplateArgs) -> Result<()> {
    let header = ctx
        .pipeline(None)
        .create_template(&args.path, args.data_type)
        .with_context(|| format!("Failed to write template {}", args.path.display()))?;

    if ctx.output.format() == OutputFormat::Table {
        print_section("Template");
        print_field("Path", &args.path.display().to_string());
        print_list_field("Columns", &header);
        println!("  Columns marked * are optional");
    } else {
        println!("{}", serde_json::to_string_pretty(&header)?);
    }
    Ok(())
}
