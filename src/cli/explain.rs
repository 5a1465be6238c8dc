//! `questline explain <flow-id>`

use anyhow::{bail, Result};
use clap::Args;
use flow_catalog::FlowCatalog;
use std::path::Path;

use crate::config::QuestlineConfig;
use crate::output;

#[derive(Debug, Args)]
pub struct ExplainArgs {
    /// Flow to describe
    pub flow_id: String,
}

pub fn execute(args: ExplainArgs, root: &Path, _config: &QuestlineConfig) -> Result<()> {
    if !FlowCatalog::manifest_exists(root) {
        bail!("no flow catalog for this project; run `questline discover` first");
    }

    let catalog = FlowCatalog::new();
    catalog.load_manifest(root)?;

    match catalog.get(&args.flow_id) {
        Some(flow) => {
            output::flow_summary(&flow);
            Ok(())
        }
        None => {
            let known: Vec<String> = catalog.all(None).into_iter().map(|f| f.id).collect();
            bail!(
                "no flow named '{}'; known flows: {}",
                args.flow_id,
                known.join(", ")
            );
        }
    }
}
