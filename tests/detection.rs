//! End-to-end detection scenarios against real files

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::broadcast;

use sn1tch::config::Config;
use sn1tch::dispatch::{AlertDispatcher, AlertSink, DispatchOptions};
use sn1tch::models::{AlertRecord, GEO_DISABLED};
use sn1tch::report::Reporter;
use sn1tch::scanner::BatchScanner;
use sn1tch::storage::ResultStore;
use sn1tch::tailer::LiveTailer;
use sn1tch::{ScanError, Sn1tch};

const POLL: Duration = Duration::from_millis(10);

fn failed(ip: &str, user: &str) -> String {
    format!(
        "Aug  5 10:00:01 server sshd[4242]: Failed password for {} from {} port 51515 ssh2\n",
        user, ip
    )
}

fn log_with(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        file.write_all(line.as_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
}

fn quiet_reporter() -> Arc<Reporter> {
    Arc::new(Reporter::new(Box::new(std::io::sink())))
}

#[derive(Default)]
struct CountingSink {
    raised: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl AlertSink for CountingSink {
    async fn raise(&self, ip: &str, attempts: u64) -> AlertRecord {
        self.raised.lock().push((ip.to_string(), attempts));
        AlertRecord::new(ip, attempts, GEO_DISABLED)
    }
}

#[tokio::test]
async fn six_failures_cross_threshold_of_five() {
    let lines: Vec<String> = ["root", "admin", "root", "git", "oracle", "invalid user x"]
        .iter()
        .map(|user| failed("1.2.3.4", user))
        .collect();
    let file = log_with(&lines);

    let sn1tch = Sn1tch::new(Config::default(), DispatchOptions::default(), quiet_reporter())
        .unwrap();
    let report = sn1tch.scan(file.path(), 5).await.unwrap();

    assert_eq!(report.snapshot, vec![("1.2.3.4".to_string(), 6)]);
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].ip, "1.2.3.4");
    assert_eq!(report.alerts[0].attempts, 6);
    assert_eq!(report.alerts[0].location, GEO_DISABLED);
}

#[tokio::test]
async fn four_failures_stay_below_threshold() {
    let lines: Vec<String> = (0..4).map(|_| failed("5.6.7.8", "root")).collect();
    let file = log_with(&lines);

    let sn1tch = Sn1tch::new(Config::default(), DispatchOptions::default(), quiet_reporter())
        .unwrap();
    let report = sn1tch.scan(file.path(), 5).await.unwrap();

    assert_eq!(report.snapshot, vec![("5.6.7.8".to_string(), 4)]);
    assert!(report.alerts.is_empty());
}

#[tokio::test]
async fn live_alert_fires_on_third_line_only() {
    let mut file = NamedTempFile::new().unwrap();
    let tailer = LiveTailer::open(file.path(), 3, POLL).await.unwrap();
    let sink = CountingSink::default();
    let (tx, rx) = broadcast::channel(1);

    let (summary, _) = tokio::join!(tailer.run(&sink, rx), async {
        for expected_before in 0..3 {
            assert!(sink.raised.lock().is_empty(), "alert before line {}", expected_before + 1);
            file.write_all(failed("9.9.9.9", "root").as_bytes()).unwrap();
            file.flush().unwrap();
            tokio::time::sleep(POLL * 5).await;
        }
        for _ in 0..500 {
            if !sink.raised.lock().is_empty() {
                break;
            }
            tokio::time::sleep(POLL).await;
        }

        // Further failures must not alert again
        file.write_all(failed("9.9.9.9", "root").repeat(4).as_bytes()).unwrap();
        file.flush().unwrap();
        tokio::time::sleep(POLL * 10).await;
        tx.send(()).unwrap();
    });

    let summary = summary.unwrap();
    assert_eq!(*sink.raised.lock(), vec![("9.9.9.9".to_string(), 3)]);
    assert_eq!(summary.alerts.len(), 1);
    assert_eq!(summary.counters.get("9.9.9.9"), Some(7));
}

#[tokio::test]
async fn missing_source_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("auth.log");

    let err = BatchScanner::new().scan(&missing).unwrap_err();
    assert!(matches!(err, ScanError::SourceUnavailable { ref path, .. } if *path == missing));

    let err = LiveTailer::open(&missing, 5, POLL).await.err().unwrap();
    assert!(err.is_source_unavailable());
}

#[tokio::test]
async fn live_session_appends_results() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(&log, failed("7.7.7.7", "root").repeat(3)).unwrap();

    let store = ResultStore::new(dir.path().join("output.json"));
    let dispatcher = AlertDispatcher::default().with_store(store.clone());
    let tailer = LiveTailer::open(&log, 2, POLL).await.unwrap();
    let (tx, rx) = broadcast::channel(1);

    let (summary, _) = tokio::join!(tailer.run(&dispatcher, rx), async {
        let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        let batch = format!(
            "{}{}{}",
            failed("7.7.7.7", "root"),
            failed("8.8.4.4", "admin"),
            failed("7.7.7.7", "git")
        );
        file.write_all(batch.as_bytes()).unwrap();
        file.write_all(failed("8.8.4.4", "root").as_bytes()).unwrap();

        for _ in 0..500 {
            if matches!(store.load().await, Ok(Some(f)) if f.entries.len() == 2) {
                break;
            }
            tokio::time::sleep(POLL).await;
        }
        tx.send(()).unwrap();
    });

    assert_eq!(summary.unwrap().alerts.len(), 2);
    let saved = store.load().await.unwrap().unwrap();
    let ips: Vec<(&str, u64)> = saved
        .entries
        .iter()
        .map(|e| (e.ip.as_str(), e.attempts))
        .collect();
    assert_eq!(ips, vec![("7.7.7.7", 2), ("8.8.4.4", 2)]);
}
