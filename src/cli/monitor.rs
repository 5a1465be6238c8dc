//! `questline monitor email`

use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Subcommand};
use mail_monitor::{CdpNavigator, EmailMonitor, HttpMailbox, MonitorConfig, MonitorRegistry};
use std::sync::Arc;
use std::time::Duration;

use crate::config::QuestlineConfig;
use crate::output;

#[derive(Debug, Args)]
pub struct MonitorArgs {
    #[command(subcommand)]
    pub target: MonitorTarget,
}

#[derive(Debug, Subcommand)]
pub enum MonitorTarget {
    /// Watch the dev mailbox for auth links and follow them in the browser
    Email(EmailArgs),
}

#[derive(Debug, Args)]
pub struct EmailArgs {
    /// Chrome remote-debugging host (defaults to the project config)
    #[arg(long)]
    pub chrome_host: Option<String>,

    /// Chrome remote-debugging port (defaults to the project config)
    #[arg(long)]
    pub chrome_port: Option<u16>,

    /// Mailbox poll interval in seconds
    #[arg(long, default_value_t = 3)]
    pub poll_interval: u64,

    /// Follow detected links in the browser (pass `false` to only report them)
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub auto_nav: bool,
}

pub async fn execute(args: MonitorArgs, config: &QuestlineConfig) -> Result<()> {
    match args.target {
        MonitorTarget::Email(email) => run_email(email, config).await,
    }
}

async fn run_email(args: EmailArgs, config: &QuestlineConfig) -> Result<()> {
    let mut cdp = config.cdp();
    if let Some(host) = args.chrome_host {
        cdp.host = host;
    }
    if let Some(port) = args.chrome_port {
        cdp.port = port;
    }

    let registry = Arc::new(cdp_client::SessionRegistry::new());
    let monitors = MonitorRegistry::new();
    let monitor = monitors.get_or_insert("email", || {
        EmailMonitor::new(
            MonitorConfig {
                poll_interval: Duration::from_secs(args.poll_interval.max(1)),
                auto_navigate: args.auto_nav,
            },
            Arc::new(HttpMailbox::new(config.mailbox_url.clone())),
            Arc::new(CdpNavigator::new(cdp, registry)),
        )
    });

    // subscribe before start so no early event is dropped
    let mut events = monitor
        .subscribe()
        .ok_or_else(|| anyhow!("monitor event channel already claimed"))?;
    monitor.start_background()?;

    output::message(&format!(
        "Watching {} every {}s (ctrl-c to stop)...",
        config.mailbox_url, args.poll_interval
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                monitor.stop();
                output::message("Monitor stopped.");
                return Ok(());
            }
            event = events.recv() => {
                match event {
                    Some(event) => output::message(&format!(
                        "[{}] auth link: {}",
                        event.received_at.format("%H:%M:%S"),
                        event.link
                    )),
                    None => return Ok(()),
                }
            }
        }
    }
}
