//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use ratelink_core::DataType;
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::output::OutputFormat;

/// Exchange rates, attorneys, billing and matters with external billing systems
#[derive(Debug, Parser)]
#[command(name = "ratelink", version, about, propagate_version = true)]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, env = "RATELINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of vendor profiles
    #[arg(long, global = true)]
    pub profiles: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Log format; overrides the configured one
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log at debug level for the ratelink crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List configured vendors
    Vendors,

    /// Authenticate against a vendor and check it responds
    TestConnection(VendorArgs),

    /// Fetch every page of an entity kind from a vendor
    Fetch(FetchArgs),

    /// Send canonical records to a vendor
    Push(PushArgs),

    /// Validate and import a CSV or spreadsheet file
    Import(ImportArgs),

    /// Validate a file without importing it
    Validate(FileArgs),

    /// Write canonical records to CSV, TSV or JSON
    Export(ExportArgs),

    /// Write an empty import template
    Template(TemplateArgs),
}

#[derive(Debug, Args)]
pub struct VendorArgs {
    /// Vendor id; the configured default when omitted
    #[arg(long)]
    pub vendor: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub vendor: VendorArgs,

    /// Entity kind (rate, attorney, billing, matter)
    pub data_type: DataType,

    /// Extra query parameter, `name=value`; repeatable
    #[arg(short, long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Also write the records to this file (.csv, .tsv or .json)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub vendor: VendorArgs,

    pub data_type: DataType,

    /// JSON array of canonical records, or an import file
    pub file: PathBuf,

    /// Parse and map the records without sending them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct FileArgs {
    /// File to read
    pub file: PathBuf,

    /// Entity kind in the file
    #[arg(short = 't', long = "type")]
    pub data_type: DataType,

    /// Mapping overriding the default column mapping (JSON or YAML)
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// Rate increase percentage that raises a warning
    #[arg(long)]
    pub max_increase: Option<f64>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Import through this vendor's adapter instead of the standalone pipeline
    #[arg(long)]
    pub vendor: Option<String>,

    /// Print the imported canonical records
    #[arg(long)]
    pub show_records: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// JSON array of canonical records
    pub input: PathBuf,

    /// Destination (.csv, .tsv or .json)
    pub destination: PathBuf,

    #[arg(short = 't', long = "type")]
    pub data_type: DataType,

    /// Mapping overriding the default column mapping (JSON or YAML)
    #[arg(long)]
    pub mapping: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    pub data_type: DataType,

    /// Destination (.csv or .tsv)
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_aliases() {
        let cli = Cli::try_parse_from([
            "ratelink", "fetch", "timekeepers", "--vendor", "elite", "-q", "status=active", "-o", "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.data_type, DataType::Attorney);
                assert_eq!(args.vendor.vendor.as_deref(), Some("elite"));
                assert_eq!(args.query, vec!["status=active"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_data_type_is_rejected() {
        assert!(Cli::try_parse_from(["ratelink", "template", "invoices-ish", "out.csv"]).is_err());
    }
}
