use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use sn1tch::config::Config;
use sn1tch::dispatch::DispatchOptions;
use sn1tch::report::Reporter;
use sn1tch::synthetic;
use sn1tch::Sn1tch;

#[derive(Parser, Debug)]
#[command(name = "sn1tch")]
#[command(author, version, about = "Detects SSH brute-force attempts in auth logs")]
pub struct Cli {
    /// Path to the auth log file
    #[arg(short, long, default_value = "sample_auth.log")]
    pub file: PathBuf,

    /// Failed attempts before an address is flagged [default: 5]
    #[arg(short, long)]
    pub threshold: Option<u64>,

    /// Look up the location of flagged addresses
    #[arg(long)]
    pub geo: bool,

    /// Save flagged addresses to the results file
    #[arg(long)]
    pub save: bool,

    /// Block flagged addresses with the firewall
    #[arg(long)]
    pub block: bool,

    /// Print failed attempt statistics
    #[arg(long)]
    pub stats: bool,

    /// Send a webhook alert for flagged addresses
    #[arg(long)]
    pub alert: bool,

    /// Follow the log file and flag addresses as they cross the threshold
    #[arg(long)]
    pub live: bool,

    /// Inject N fake failed logins into the log file before scanning
    #[arg(long, value_name = "N", conflicts_with = "live")]
    pub test: Option<usize>,

    /// Keep appending fake failed logins while following the file
    #[arg(long, requires = "live")]
    pub simulate: bool,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Do not print the banner
    #[arg(long)]
    pub no_banner: bool,
}

impl Cli {
    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            geo: self.geo,
            save: self.save,
            block: self.block,
            notify: self.alert,
        }
    }
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    let threshold = cli.threshold.unwrap_or(config.general.threshold);

    let reporter = Arc::new(Reporter::stdout());
    if !cli.no_banner {
        reporter.banner(cli.geo);
    }

    let sn1tch = Sn1tch::new(config, cli.dispatch_options(), reporter.clone())?;

    if cli.live {
        cmd_live(&sn1tch, &cli, threshold).await
    } else {
        if let Some(count) = cli.test {
            synthetic::inject(&cli.file, count)
                .await
                .with_context(|| format!("Failed to write test data to {}", cli.file.display()))?;
            reporter.injected(count, &cli.file);
        }
        cmd_scan(&sn1tch, &cli, threshold).await
    }
}

async fn cmd_scan(sn1tch: &Sn1tch, cli: &Cli, threshold: u64) -> Result<()> {
    let report = sn1tch.scan(&cli.file, threshold).await?;

    sn1tch.reporter().suspicious(&report.alerts, threshold);
    if cli.stats {
        sn1tch.reporter().stats(&report.stats);
    }
    if let Some(path) = &report.saved_to {
        sn1tch.reporter().saved(path);
    }

    Ok(())
}

async fn cmd_live(sn1tch: &Sn1tch, cli: &Cli, threshold: u64) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("Received Ctrl+C");
                let _ = ctrl_c_tx.send(());
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let simulator = if cli.simulate {
        let interval = Duration::from_secs(sn1tch.config().simulate.interval_secs.max(1));
        Some(synthetic::spawn_simulator(
            cli.file.clone(),
            interval,
            shutdown_tx.subscribe(),
        ))
    } else {
        None
    };

    let result = sn1tch.track_live(&cli.file, threshold, shutdown_rx).await;

    // Stop the simulator whether tracking ended cleanly or not
    let _ = shutdown_tx.send(());
    if let Some(handle) = simulator {
        if let Err(e) = handle.await {
            warn!("Simulator task failed: {}", e);
        }
    }

    let summary = result?;
    if cli.stats {
        sn1tch.reporter().stats(&summary.counters.stats());
    }

    Ok(())
}
