//! `questline list`

use anyhow::{anyhow, bail, Result};
use clap::Args;
use flow_catalog::FlowCatalog;
use questline_core_types::FlowCategory;
use std::path::Path;

use crate::config::QuestlineConfig;
use crate::output;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show flows in this category (auth, signup, form, navigation, other)
    #[arg(long)]
    pub category: Option<String>,

    /// Emit the flow list as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ListArgs, root: &Path, config: &QuestlineConfig) -> Result<()> {
    if !FlowCatalog::manifest_exists(root) {
        bail!("no flow catalog for this project; run `questline discover` first");
    }

    let category = args
        .category
        .as_deref()
        .map(|raw| raw.parse::<FlowCategory>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let catalog = FlowCatalog::new();
    catalog.load_manifest(root)?;

    let flows = catalog.all(category);
    if args.json {
        output::json(&flows);
        return Ok(());
    }

    if flows.is_empty() {
        output::message("No flows match.");
        return Ok(());
    }

    if catalog.is_stale(config.catalog_ttl()) {
        output::message("(catalog is stale; consider re-running `questline discover`)");
    }
    let rows: Vec<Vec<String>> = flows
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.name.clone(),
                f.category.to_string(),
                f.steps.len().to_string(),
                format!("{:.0}%", f.confidence * 100.0),
            ]
        })
        .collect();
    output::table(&["ID", "NAME", "CATEGORY", "STEPS", "CONFIDENCE"], &rows);
    Ok(())
}
