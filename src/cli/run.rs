//! `questline run <flow-id>`

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use flow_catalog::FlowCatalog;
use flow_executor::{CdpBrowser, FlowExecutor};
use questline_core_types::{ExecutionContext, ExecutionResult};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::QuestlineConfig;
use crate::output::{self, TerminalSink};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Flow to execute (see `questline list`)
    pub flow_id: String,

    /// Print the resolved plan without touching the browser
    #[arg(long)]
    pub dry_run: bool,

    /// Variable bindings, comma separated (email=dev@example.com,password=...)
    #[arg(long, value_delimiter = ',', value_name = "NAME=VALUE")]
    pub vars: Vec<String>,
}

pub async fn execute(args: RunArgs, root: &Path, config: &QuestlineConfig) -> Result<()> {
    if !FlowCatalog::manifest_exists(root) {
        bail!("no flow catalog for this project; run `questline discover` first");
    }

    let catalog = FlowCatalog::new();
    catalog.load_manifest(root)?;
    if catalog.is_stale(config.catalog_ttl()) {
        output::message("(catalog is stale; consider re-running `questline discover`)");
    }

    let Some(flow) = catalog.get(&args.flow_id) else {
        let known: Vec<String> = catalog.all(None).into_iter().map(|f| f.id).collect();
        bail!(
            "no flow named '{}'; known flows: {}",
            args.flow_id,
            known.join(", ")
        );
    };

    let mut ctx = ExecutionContext::new(config.base_url.clone())
        .with_environment(config.environment.clone());
    ctx.variables = parse_vars(&args.vars)?;

    let mut sink = TerminalSink;
    let mut executor = FlowExecutor::new();

    if args.dry_run {
        executor.plan(&flow, &ctx, &mut sink)?;
        return Ok(());
    }

    let registry = Arc::new(cdp_client::SessionRegistry::new());
    let browser = CdpBrowser::new(config.cdp(), registry);
    let mut result = executor.execute(&flow, &ctx, &browser, &mut sink).await?;

    match write_run_record(root, &flow.id, &ctx, &result) {
        Ok(path) => result = result.with_artifact(path),
        Err(err) => output::error(&format!("cannot write run record: {err:#}")),
    }

    output::run_result(&flow, &result);
    if !result.success {
        bail!("flow '{}' did not complete", flow.id);
    }
    Ok(())
}

fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("invalid --vars entry '{pair}', expected NAME=VALUE");
        };
        vars.insert(name.trim().to_string(), value.to_string());
    }
    Ok(vars)
}

#[derive(Serialize)]
struct RunRecord<'a> {
    flow: &'a str,
    environment: &'a str,
    base_url: &'a str,
    finished_at: DateTime<Utc>,
    result: &'a ExecutionResult,
}

/// Persist the run outcome under `.questline/runs/` and return its path.
fn write_run_record(
    root: &Path,
    flow_id: &str,
    ctx: &ExecutionContext,
    result: &ExecutionResult,
) -> Result<PathBuf> {
    let dir = root.join(flow_catalog::STATE_DIR).join("runs");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;

    let finished_at = Utc::now();
    let path = dir.join(format!(
        "{flow_id}-{}.json",
        finished_at.format("%Y%m%dT%H%M%S")
    ));
    let record = RunRecord {
        flow: flow_id,
        environment: &ctx.environment,
        base_url: &ctx.base_url,
        finished_at,
        result,
    };
    let json = serde_json::to_string_pretty(&record).context("cannot serialize run record")?;
    std::fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_parse_into_map() {
        let vars = parse_vars(&[
            "email=dev@example.com".to_string(),
            "password=s=cret".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["email"], "dev@example.com");
        // Only the first '=' splits; values may contain more.
        assert_eq!(vars["password"], "s=cret");
    }

    #[test]
    fn malformed_var_is_rejected() {
        assert!(parse_vars(&["emaildev".to_string()]).is_err());
    }

    #[test]
    fn run_record_lands_under_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::new("http://localhost:3000");
        let result = ExecutionResult::succeeded(2, std::time::Duration::from_millis(5));

        let path = write_run_record(dir.path(), "login", &ctx, &result).unwrap();
        assert!(path.starts_with(dir.path().join(flow_catalog::STATE_DIR)));
        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.contains("\"flow\": \"login\""));
    }
}
