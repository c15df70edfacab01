//! Address blocking through an external firewall command
//!
//! Successful blocks are appended to a flat record file. That file is read
//! once at startup into an in-memory set, so repeat offenders are skipped
//! without touching the firewall or rescanning the file.

use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::FirewallConfig;
use crate::error::{Result, ScanError};

/// Result of a block request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Blocked,
    AlreadyBlocked,
}

/// Firewall blocker with a remembered set of blocked addresses
pub struct Blocker {
    command: Vec<String>,
    record_path: PathBuf,
    blocked: Mutex<HashSet<String>>,
}

impl Blocker {
    /// Create a blocker, loading previously blocked addresses from `record_path`
    pub fn new(config: &FirewallConfig, record_path: impl Into<PathBuf>) -> Result<Self> {
        if config.command.is_empty() {
            return Err(ScanError::Config(
                "firewall.command must name a program".to_string(),
            ));
        }

        let record_path = record_path.into();
        let blocked = load_blocked(&record_path)?;
        debug!(
            "Loaded {} blocked addresses from {}",
            blocked.len(),
            record_path.display()
        );

        Ok(Self {
            command: config.command.clone(),
            record_path,
            blocked: Mutex::new(blocked),
        })
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked.lock().contains(ip)
    }

    /// Block `ip` unless it is already recorded as blocked
    pub async fn block(&self, ip: &str) -> Result<BlockOutcome> {
        if self.is_blocked(ip) {
            info!("IP {} already blocked, skipping", ip);
            return Ok(BlockOutcome::AlreadyBlocked);
        }

        let output = Command::new(&self.command[0])
            .args(&self.command[1..])
            .arg(ip)
            .output()
            .await
            .map_err(|e| {
                ScanError::collaborator("firewall", format!("could not run {}: {}", self.command[0], e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::collaborator(
                "firewall",
                format!("blocking {} exited with {}: {}", ip, output.status, stderr.trim()),
            ));
        }

        self.record(ip).await?;
        self.blocked.lock().insert(ip.to_string());
        info!("Blocked IP: {}", ip);
        Ok(BlockOutcome::Blocked)
    }

    async fn record(&self, ip: &str) -> Result<()> {
        if let Some(parent) = self.record_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.record_path)
            .await?;

        let line = format!(
            "{} - blocked at {}\n",
            ip,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

fn load_blocked(path: &Path) -> Result<HashSet<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    // "<ip> - blocked at <timestamp>"
    let blocked: HashSet<String> = content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect();
    Ok(blocked)
}
