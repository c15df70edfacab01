//! Fabricated failed-login traffic for demos and smoke tests
//!
//! Lines are appended to the log file in a single write each, so a tailer
//! reading the same file never sees half of one as complete.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

const FAKE_USERS: &[&str] = &[
    "root", "admin", "test", "user", "ubuntu", "oracle", "postgres", "mysql", "git", "dev",
];

const PRIVATE_PREFIXES: &[&str] = &["10.", "192.168.", "172.", "127."];

/// Random dotted-quad outside the common private and loopback ranges
pub fn random_public_ip<R: Rng>(rng: &mut R) -> String {
    loop {
        let ip = format!(
            "{}.{}.{}.{}",
            rng.random_range(1..=255u8),
            rng.random_range(1..=255u8),
            rng.random_range(1..=255u8),
            rng.random_range(1..=255u8)
        );
        if !PRIVATE_PREFIXES.iter().any(|prefix| ip.starts_with(prefix)) {
            return ip;
        }
    }
}

/// One sshd-style failed login line for an invalid user, newline included
pub fn fake_failed_login<R: Rng>(rng: &mut R) -> String {
    let ip = random_public_ip(rng);
    let user = FAKE_USERS.choose(rng).copied().unwrap_or("root");

    format!(
        "Aug 5 {:02}:{:02}:{:02} server sshd[{}]: Failed password for invalid user {} from {} port {} ssh2\n",
        rng.random_range(0..24u8),
        rng.random_range(0..60u8),
        rng.random_range(0..60u8),
        rng.random_range(1000..100_000u32),
        user,
        ip,
        rng.random_range(1024..=65535u16)
    )
}

/// Append `count` fabricated lines to `path`, creating it if needed
pub async fn inject<P: AsRef<Path>>(path: P, count: usize) -> Result<()> {
    let batch: String = {
        let mut rng = rand::rng();
        (0..count).map(|_| fake_failed_login(&mut rng)).collect()
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .await?;
    file.write_all(batch.as_bytes()).await?;
    file.flush().await?;

    debug!("Appended {} fake lines to {}", count, path.as_ref().display());
    Ok(())
}

/// Background task appending one fake line every `interval` until shutdown
pub fn spawn_simulator(
    path: PathBuf,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Simulating attack traffic into {} every {:?}",
            path.display(),
            interval
        );
        loop {
            if let Err(e) = inject(&path, 1).await {
                warn!("Simulator failed to write {}: {}", path.display(), e);
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("Simulator stopped");
    })
}
