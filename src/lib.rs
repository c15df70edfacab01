pub mod config;
pub mod counter;
pub mod dispatch;
pub mod error;
pub mod firewall;
pub mod intel;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod report;
pub mod scanner;
pub mod storage;
pub mod synthetic;
pub mod tailer;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use config::Config;
use dispatch::{AlertDispatcher, AlertSink, DispatchOptions};
use models::{AlertRecord, ScanStats};
use report::Reporter;
use scanner::BatchScanner;
use tailer::{LiveTailer, TailSummary};

pub use counter::CounterStore;
pub use error::ScanError;
pub use matcher::LineMatcher;

/// Outcome of a one-pass scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub snapshot: Vec<(String, u64)>,
    pub alerts: Vec<AlertRecord>,
    pub stats: ScanStats,
    /// Results file, when `--save` is on and the write succeeded
    pub saved_to: Option<PathBuf>,
}

/// Core sn1tch instance: configuration, alert side effects and output
pub struct Sn1tch {
    config: Config,
    dispatcher: AlertDispatcher,
    reporter: Arc<Reporter>,
}

impl Sn1tch {
    /// Create a new instance with the side effects selected by `options`
    pub fn new(config: Config, options: DispatchOptions, reporter: Arc<Reporter>) -> Result<Self> {
        let dispatcher = AlertDispatcher::new(&config, options)
            .context("Failed to set up alert actions")?;

        Ok(Self {
            config,
            dispatcher,
            reporter,
        })
    }

    /// Scan `path` once and dispatch every address at or above `threshold`
    pub async fn scan<P: AsRef<Path>>(&self, path: P, threshold: u64) -> Result<ScanReport> {
        let counters = BatchScanner::new().scan(path.as_ref())?;
        let outcome = self.dispatcher.dispatch_batch(&counters, threshold).await;
        let alerts = outcome.records;

        info!(
            "{} of {} addresses reached {} failed attempts",
            alerts.len(),
            counters.len(),
            threshold
        );

        Ok(ScanReport {
            snapshot: counters.snapshot(),
            alerts,
            stats: counters.stats(),
            saved_to: outcome.saved_to,
        })
    }

    /// Follow `path` until `shutdown` fires, alerting each address once
    pub async fn track_live<P: AsRef<Path>>(
        &self,
        path: P,
        threshold: u64,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<TailSummary> {
        let tailer = LiveTailer::open(path.as_ref(), threshold, self.config.poll_interval()).await?;
        self.reporter.live_started();

        let sink = ReportingSink {
            dispatcher: &self.dispatcher,
            reporter: &self.reporter,
        };
        let summary = tailer.run(&sink, shutdown).await?;

        self.reporter.live_stopped();
        debug!("Live session counted {} addresses", summary.counters.len());
        Ok(summary)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

/// Dispatches live alerts and echoes them to the operator
struct ReportingSink<'a> {
    dispatcher: &'a AlertDispatcher,
    reporter: &'a Reporter,
}

#[async_trait]
impl AlertSink for ReportingSink<'_> {
    async fn raise(&self, ip: &str, attempts: u64) -> AlertRecord {
        let record = self.dispatcher.raise(ip, attempts).await;
        self.reporter.live_detection(&record);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn quiet() -> Arc<Reporter> {
        Arc::new(Reporter::new(Box::new(std::io::sink())))
    }

    #[tokio::test]
    async fn test_scan_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for ip in ["1.1.1.1", "2.2.2.2", "1.1.1.1", "1.1.1.1"] {
            writeln!(file, "sshd[1]: Failed password for root from {} port 22 ssh2", ip).unwrap();
        }

        let sn1tch = Sn1tch::new(Config::default(), DispatchOptions::default(), quiet()).unwrap();
        let report = sn1tch.scan(file.path(), 3).await.unwrap();

        assert_eq!(report.snapshot[0], ("1.1.1.1".to_string(), 3));
        assert_eq!(report.alerts.len(), 1);
        assert!(report.saved_to.is_none());
        assert_eq!(
            report.stats,
            ScanStats {
                total_failed_attempts: 4,
                unique_ips: 2
            }
        );
    }

    #[tokio::test]
    async fn test_scan_reports_saved_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("auth.log");
        std::fs::write(&log, "Failed password for root from 6.6.6.6 port 22 ssh2\n".repeat(5))
            .unwrap();

        let mut config = Config::default();
        config.general.data_dir = dir.path().join("data").display().to_string();
        let options = DispatchOptions {
            save: true,
            ..Default::default()
        };
        let sn1tch = Sn1tch::new(config, options, quiet()).unwrap();
        let report = sn1tch.scan(&log, 5).await.unwrap();

        assert_eq!(report.saved_to, Some(dir.path().join("data").join("output.json")));
    }

    #[tokio::test]
    async fn test_scan_missing_source() {
        let sn1tch = Sn1tch::new(Config::default(), DispatchOptions::default(), quiet()).unwrap();
        let err = sn1tch.scan("/nonexistent/auth.log", 5).await.unwrap_err();

        let scan_err = err.downcast_ref::<ScanError>().unwrap();
        assert!(scan_err.is_source_unavailable());
    }
}
