//! `questline discover`

use anyhow::{Context, Result};
use clap::Args;
use flow_catalog::FlowCatalog;
use source_watcher::{SourceWatcher, WatcherConfig};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::QuestlineConfig;
use crate::discovery::Discovery;
use crate::output;

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Serve the cached catalog if present instead of re-scanning
    #[arg(long)]
    pub cache: bool,

    /// Keep running and re-scan when source files change
    #[arg(long)]
    pub watch: bool,
}

pub async fn execute(args: DiscoverArgs, root: &Path, config: &QuestlineConfig) -> Result<()> {
    let catalog = Arc::new(FlowCatalog::new());

    if args.cache && FlowCatalog::manifest_exists(root) {
        catalog
            .load_manifest(root)
            .context("cached catalog exists but cannot be loaded")?;
        if catalog.is_stale(config.catalog_ttl()) {
            output::message("(cached catalog is stale; re-scanning)");
            rescan(root, &catalog)?;
        }
    } else {
        rescan(root, &catalog)?;
    }

    print_catalog(&catalog);

    if args.watch {
        watch_loop(root, catalog).await?;
    }
    Ok(())
}

fn rescan(root: &Path, catalog: &FlowCatalog) -> Result<()> {
    let report = Discovery::new(root).scan()?;
    for err in &report.errors {
        warn!(target: "discovery", "{err}");
    }
    catalog.put_all(report.flows.clone());
    catalog
        .save_manifest(root, report.into_manifest())
        .context("cannot persist flow manifest")?;
    Ok(())
}

fn print_catalog(catalog: &FlowCatalog) {
    let flows = catalog.all(None);
    if flows.is_empty() {
        output::message("No flows found. Nothing in this project looks like an auth journey yet.");
        return;
    }
    output::message(&format!("Discovered {} flow(s):", flows.len()));
    for flow in &flows {
        output::message(&format!(
            "  {:12} {} ({:.0}% confidence, {} steps)",
            flow.id,
            flow.name,
            flow.confidence * 100.0,
            flow.steps.len()
        ));
    }
}

async fn watch_loop(root: &Path, catalog: Arc<FlowCatalog>) -> Result<()> {
    let watcher = SourceWatcher::new(root, WatcherConfig::default());

    let cb_root = root.to_path_buf();
    let cb_catalog = catalog.clone();
    watcher.set_change_callback(Arc::new(move |paths| {
        output::message(&format!("{} file(s) changed, re-scanning...", paths.len()));
        match rescan(&cb_root, &cb_catalog) {
            Ok(()) => print_catalog(&cb_catalog),
            Err(err) => warn!(target: "discovery", %err, "re-scan failed"),
        }
    }));

    output::message("Watching for source changes (ctrl-c to stop)...");
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_interrupt.cancel();
    });

    watcher.run(cancel).await?;
    Ok(())
}
