use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder location used when GeoIP lookups are turned off
pub const GEO_DISABLED: &str = "GeoIP Disabled";

/// Sentinel location for failed or empty lookups
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// One address that crossed the failure threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub ip: String,
    pub attempts: u64,
    pub location: String,
    pub detected_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(ip: impl Into<String>, attempts: u64, location: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            attempts,
            location: location.into(),
            detected_at: Utc::now(),
        }
    }

    /// Country part of the location ("City, Country" or "Country")
    pub fn country(&self) -> Option<&str> {
        match self.location.as_str() {
            GEO_DISABLED | UNKNOWN_LOCATION | "" => None,
            location => location.rsplit(", ").next().map(str::trim),
        }
    }
}

/// Totals printed by `--stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_failed_attempts: u64,
    pub unique_ips: usize,
}

/// On-disk layout of the results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<AlertRecord>,
}

impl ResultsFile {
    pub fn new(entries: Vec<AlertRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            entries,
        }
    }
}

/// Which session produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    Batch,
    Live,
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMode::Batch => write!(f, "batch"),
            DetectionMode::Live => write!(f, "live"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_from_location() {
        assert_eq!(
            AlertRecord::new("1.2.3.4", 6, "Berlin, Germany").country(),
            Some("Germany")
        );
        assert_eq!(AlertRecord::new("1.2.3.4", 6, "Germany").country(), Some("Germany"));
        assert_eq!(AlertRecord::new("1.2.3.4", 6, GEO_DISABLED).country(), None);
        assert_eq!(AlertRecord::new("1.2.3.4", 6, UNKNOWN_LOCATION).country(), None);
    }

    #[test]
    fn test_results_file_serialization() {
        let file = ResultsFile::new(vec![AlertRecord::new("1.2.3.4", 6, "Unknown")]);
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("\"generated_at\""));
        assert!(json.contains("\"ip\":\"1.2.3.4\""));
        assert!(json.contains("\"attempts\":6"));
    }
}
