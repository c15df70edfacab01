//! Alert side effects
//!
//! Each alert resolves a location, then runs the enabled actions (block,
//! notify, persist). Every action reports its own failure and never stops
//! the others or the detection loop.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::counter::CounterStore;
use crate::error::{Result, ScanError};
use crate::firewall::{BlockOutcome, Blocker};
use crate::intel::GeoLocator;
use crate::models::{AlertRecord, DetectionMode, GEO_DISABLED};
use crate::notify::{Notifier, NotifyOutcome};
use crate::storage::ResultStore;

/// Receiver of threshold crossings from a detection session
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Handle one alert for `ip` at `attempts` failures
    async fn raise(&self, ip: &str, attempts: u64) -> AlertRecord;
}

/// Which side effects are switched on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub geo: bool,
    pub save: bool,
    pub block: bool,
    pub notify: bool,
}

/// Records from one batch and where they were saved, if they were
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub records: Vec<AlertRecord>,
    pub saved_to: Option<PathBuf>,
}

#[derive(Default)]
pub struct AlertDispatcher {
    geo: Option<GeoLocator>,
    store: Option<ResultStore>,
    blocker: Option<Blocker>,
    notifier: Option<Notifier>,
    ignore_countries: Vec<String>,
}

impl AlertDispatcher {
    /// Build the collaborators selected by `options`
    pub fn new(config: &Config, options: DispatchOptions) -> Result<Self> {
        let mut dispatcher = Self {
            ignore_countries: config.alerts.ignore_countries.clone(),
            ..Default::default()
        };

        if options.geo {
            let geo = GeoLocator::new(&config.intel)
                .map_err(|e| ScanError::collaborator("geoip", e.to_string()))?;
            dispatcher.geo = Some(geo);
        }
        if options.save {
            dispatcher.store = Some(ResultStore::new(config.output_path()));
        }
        if options.block {
            dispatcher.blocker = Some(Blocker::new(&config.firewall, config.blocked_path())?);
        }
        if options.notify {
            let notifier = Notifier::new(&config.alerts)?;
            if !notifier.is_configured() {
                warn!("Alerts enabled but alerts.discord_webhook is not set");
            }
            dispatcher.notifier = Some(notifier);
        }

        Ok(dispatcher)
    }

    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_blocker(mut self, blocker: Blocker) -> Self {
        self.blocker = Some(blocker);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_ignore_countries(mut self, countries: Vec<String>) -> Self {
        self.ignore_countries = countries;
        self
    }

    async fn locate(&self, ip: &str) -> String {
        match &self.geo {
            Some(geo) => geo.resolve(ip).await,
            None => GEO_DISABLED.to_string(),
        }
    }

    fn is_ignored(&self, record: &AlertRecord) -> bool {
        record.country().is_some_and(|country| {
            self.ignore_countries
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(country))
        })
    }

    /// Locate `ip`, build its record and run the enabled actions
    pub async fn dispatch(&self, ip: &str, attempts: u64, mode: DetectionMode) -> AlertRecord {
        let location = self.locate(ip).await;
        let record = AlertRecord::new(ip, attempts, location);
        self.dispatch_record(&record, mode).await;
        record
    }

    /// Run block/notify (and, live, save) for an already located record
    pub async fn dispatch_record(&self, record: &AlertRecord, mode: DetectionMode) {
        debug!(
            "Dispatching {} alert for {} ({} attempts)",
            mode, record.ip, record.attempts
        );

        if self.is_ignored(record) {
            info!(
                "{} is in an ignored country ({}), not blocking or notifying",
                record.ip, record.location
            );
        } else {
            self.block(record).await;
            self.notify(record).await;
        }

        if mode == DetectionMode::Live {
            if let Some(store) = &self.store {
                if let Err(e) = store.append(record).await {
                    error!("Failed to save result for {}: {}", record.ip, e);
                }
            }
        }
    }

    /// Dispatch every address at or above `threshold`, highest count first,
    /// then save the whole batch once
    pub async fn dispatch_batch(&self, counters: &CounterStore, threshold: u64) -> BatchOutcome {
        let mut records = Vec::new();
        for (ip, attempts) in counters.over_threshold(threshold) {
            records.push(self.dispatch(&ip, attempts, DetectionMode::Batch).await);
        }

        let mut saved_to = None;
        if let Some(store) = &self.store {
            if !records.is_empty() {
                match store.save(&records).await {
                    Ok(()) => saved_to = Some(store.path().to_path_buf()),
                    Err(e) => error!("Failed to save results: {}", e),
                }
            }
        }

        BatchOutcome { records, saved_to }
    }

    async fn block(&self, record: &AlertRecord) {
        let Some(blocker) = &self.blocker else {
            return;
        };
        match blocker.block(&record.ip).await {
            Ok(BlockOutcome::Blocked) | Ok(BlockOutcome::AlreadyBlocked) => {}
            Err(e) => error!("Failed to block {}: {}", record.ip, e),
        }
    }

    async fn notify(&self, record: &AlertRecord) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        match notifier
            .notify(&record.ip, record.attempts, &record.location)
            .await
        {
            Ok(NotifyOutcome::Sent) | Ok(NotifyOutcome::NotConfigured) => {}
            Err(e) => warn!("Failed to send alert for {}: {}", record.ip, e),
        }
    }
}

#[async_trait]
impl AlertSink for AlertDispatcher {
    async fn raise(&self, ip: &str, attempts: u64) -> AlertRecord {
        self.dispatch(ip, attempts, DetectionMode::Live).await
    }
}
