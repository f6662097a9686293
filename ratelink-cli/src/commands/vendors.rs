//! Vendor listing and connection checks

use anyhow::Result;
use comfy_table::Cell;
use ratelink_adapters::{PaginationStyle, VendorProfile};
use serde::Serialize;

use crate::cli::VendorArgs;
use crate::context::Context;
use crate::output::{print_field, print_list_field, print_section, TableDisplay};

#[derive(Debug, Serialize)]
struct VendorDisplay {
    id: String,
    name: String,
    adapter: String,
    base_url: String,
    auth_method: String,
    pagination: String,
    data_types: Vec<String>,
    mapped: Vec<String>,
}

fn style_name(style: &PaginationStyle) -> &'static str {
    match style {
        PaginationStyle::None => "none",
        PaginationStyle::OffsetLimit { .. } => "offset_limit",
        PaginationStyle::PageNumber { .. } => "page_number",
        PaginationStyle::Cursor { .. } => "cursor",
        PaginationStyle::NextLink { .. } => "next_link",
    }
}

impl From<&VendorProfile> for VendorDisplay {
    fn from(p: &VendorProfile) -> Self {
        Self {
            id: p.id.clone(),
            name: p.display_name().to_string(),
            adapter: p.adapter.clone(),
            base_url: p.connection.base_url.clone(),
            auth_method: p.connection.auth_method.as_str().to_string(),
            pagination: style_name(&p.pagination.style).to_string(),
            data_types: p.data_types().iter().map(ToString::to_string).collect(),
            mapped: p.mappings.keys().map(ToString::to_string).collect(),
        }
    }
}

impl TableDisplay for VendorDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.id),
            Cell::new(&self.name),
            Cell::new(&self.auth_method),
            Cell::new(&self.pagination),
            Cell::new(self.data_types.join(", ")),
            Cell::new(&self.base_url),
        ]
    }

    fn display_single(&self) {
        print_section("Vendor");
        print_field("ID", &self.id);
        print_field("Name", &self.name);
        print_field("Adapter", &self.adapter);
        print_field("Base URL", &self.base_url);
        print_field("Auth", &self.auth_method);
        print_field("Pagination", &self.pagination);
        print_list_field("Data types", &self.data_types);
        print_list_field("Mapped", &self.mapped);
    }

    fn display_compact(&self) {
        println!("{}\t{}\t{}", self.id, self.auth_method, self.data_types.join(","));
    }
}

pub fn list(ctx: &Context) -> Result<()> {
    let vendors: Vec<VendorDisplay> = ctx.registry.profiles().map(VendorDisplay::from).collect();
    if vendors.is_empty() {
        ctx.output
            .info(&format!("No vendor profiles in {}", ctx.profile_dir().display()));
    }
    ctx.output
        .write_list(&vendors, &["ID", "Name", "Auth", "Pagination", "Data types", "Base URL"])
}

pub async fn test_connection(ctx: &Context, args: VendorArgs) -> Result<()> {
    let adapter = ctx.adapter(args.vendor.as_deref())?;
    let result = adapter.test_connection().await;
    ctx.output.write(&result)?;

    if !result.success {
        anyhow::bail!("Connection test for '{}' failed", adapter.vendor_id());
    }
    ctx.output.success(&format!("Connected to '{}'", adapter.vendor_id()));
    Ok(())
}
