//! Operator-facing output
//!
//! Everything the tool prints for a human goes through a `Reporter`, which
//! is created once in `main` and handed to whoever needs it.

use colored::Colorize;
use parking_lot::Mutex;
use std::io::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{AlertRecord, ScanStats, UNKNOWN_LOCATION};

/// Table row for the suspicious-address report
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "IP Address")]
    ip: String,
    #[tabled(rename = "Failed Attempts")]
    attempts: u64,
    #[tabled(rename = "Location")]
    location: String,
}

impl From<&AlertRecord> for AlertRow {
    fn from(record: &AlertRecord) -> Self {
        Self {
            ip: record.ip.clone(),
            attempts: record.attempts,
            location: if record.location.is_empty() {
                UNKNOWN_LOCATION.to_string()
            } else {
                record.location.clone()
            },
        }
    }
}

pub struct Reporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        // Output is best effort; a closed stdout must not stop detection
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    pub fn banner(&self, geo_enabled: bool) {
        self.emit(&render_banner(geo_enabled));
    }

    pub fn suspicious(&self, records: &[AlertRecord], threshold: u64) {
        if records.is_empty() {
            self.emit(&format!(
                "No IPs with {}+ failed login attempts found.",
                threshold
            ));
        } else {
            self.emit(&render_alert_table(records, threshold));
        }
    }

    pub fn stats(&self, stats: &ScanStats) {
        self.emit(&render_stats(stats));
    }

    pub fn injected(&self, count: usize, path: &std::path::Path) {
        self.emit(
            &format!(
                "Injected {} randomized fake failed logins into {}",
                count,
                path.display()
            )
            .cyan()
            .bold()
            .to_string(),
        );
    }

    pub fn live_started(&self) {
        self.emit(
            &"Live tracking started... Press Ctrl+C to stop"
                .green()
                .bold()
                .to_string(),
        );
    }

    pub fn live_detection(&self, record: &AlertRecord) {
        self.emit(&render_live_detection(record));
    }

    pub fn live_stopped(&self) {
        self.emit(&"\nLive tracking stopped.".cyan().bold().to_string());
    }

    pub fn saved(&self, path: &std::path::Path) {
        self.emit(&format!("{} {}", "Results saved to".green(), path.display()));
    }
}

fn render_banner(geo_enabled: bool) -> String {
    let mut out = String::new();
    out.push_str(&"sN1TCH".red().bold().to_string());
    out.push('\n');
    out.push_str(&format!("v{} - SSH brute-force snitch\n", env!("CARGO_PKG_VERSION")));
    if geo_enabled {
        out.push_str(&"GEOIP LOOKUP ENABLED".green().bold().to_string());
    } else {
        out.push_str(&"GeoIP Lookup: Disabled".yellow().to_string());
    }
    out.push('\n');
    out
}

fn render_alert_table(records: &[AlertRecord], threshold: u64) -> String {
    let rows: Vec<AlertRow> = records.iter().map(AlertRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());

    format!(
        "{}\n{}",
        format!("Suspicious IPs: ({}+ Failed Logins)", threshold).red().bold(),
        table.to_string().red()
    )
}

fn render_stats(stats: &ScanStats) -> String {
    format!(
        "\n{}\nTotal Failed Attempts: {}\nUnique IPs: {}",
        "Stats:".bold(),
        stats.total_failed_attempts,
        stats.unique_ips
    )
}

fn render_live_detection(record: &AlertRecord) -> String {
    format!(
        "{} IP: {} | Attempts: {} | Location: {}",
        "LIVE DETECTED →".red().bold(),
        record.ip.yellow(),
        record.attempts,
        record.location
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_table_contents() {
        let records = vec![
            AlertRecord::new("1.2.3.4", 6, "Berlin, Germany"),
            AlertRecord::new("5.6.7.8", 5, ""),
        ];
        let table = render_alert_table(&records, 5);

        assert!(table.contains("5+ Failed Logins"));
        assert!(table.contains("IP Address"));
        assert!(table.contains("1.2.3.4"));
        assert!(table.contains("Berlin, Germany"));
        assert!(table.contains(UNKNOWN_LOCATION));
    }

    #[test]
    fn test_stats_rendering() {
        let text = render_stats(&ScanStats {
            total_failed_attempts: 42,
            unique_ips: 7,
        });
        assert!(text.contains("Total Failed Attempts: 42"));
        assert!(text.contains("Unique IPs: 7"));
    }

    #[test]
    fn test_live_detection_line() {
        let text = render_live_detection(&AlertRecord::new("9.9.9.9", 3, "GeoIP Disabled"));
        assert!(text.contains("9.9.9.9"));
        assert!(text.contains("Attempts: 3"));
        assert!(text.contains("Location: GeoIP Disabled"));
    }

    #[test]
    fn test_banner_mentions_geo_state() {
        assert!(render_banner(true).contains("GEOIP LOOKUP ENABLED"));
        assert!(render_banner(false).contains("GeoIP Lookup: Disabled"));
    }
}
