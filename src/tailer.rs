//! Live log following
//!
//! The tailer starts at the current end of the file, so only attempts logged
//! after the session begins are counted. Each address alerts at most once
//! per session, on the line that first brings it to the threshold.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::counter::CounterStore;
use crate::dispatch::AlertSink;
use crate::error::{Result, ScanError};
use crate::matcher::LineMatcher;
use crate::models::AlertRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    SeekingEnd,
    Idle,
    Reading,
    Stopped,
}

/// What a finished session saw
#[derive(Debug, Clone)]
pub struct TailSummary {
    pub counters: CounterStore,
    pub alerts: Vec<AlertRecord>,
    pub lines_read: u64,
}

pub struct LiveTailer {
    path: PathBuf,
    threshold: u64,
    poll_interval: Duration,
    matcher: LineMatcher,
    reader: BufReader<File>,
    state: TailState,
    position: u64,
    /// Offset just past the last newline consumed, if known
    boundary: Option<u64>,
    pending: Vec<u8>,
    counters: CounterStore,
    alerted: HashSet<String>,
    alerts: Vec<AlertRecord>,
    lines_read: u64,
}

impl LiveTailer {
    /// Open `path` and position the cursor at its current end
    pub async fn open<P: AsRef<Path>>(
        path: P,
        threshold: u64,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = TailState::SeekingEnd;
        debug!("{:?}: opening {}", state, path.display());

        let mut file = File::open(&path)
            .await
            .map_err(|e| ScanError::source_unavailable(&path, e))?;
        let position = file.seek(SeekFrom::End(0)).await?;
        let boundary = if position > 0 {
            file.seek(SeekFrom::Start(position - 1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            (last[0] == b'\n').then_some(position)
        } else {
            None
        };
        state = TailState::Idle;

        info!(
            "Tailing {} from offset {} (threshold {})",
            path.display(),
            position,
            threshold
        );

        Ok(Self {
            path,
            threshold,
            poll_interval,
            matcher: LineMatcher::new(),
            reader: BufReader::new(file),
            state,
            position,
            boundary,
            pending: Vec::new(),
            counters: CounterStore::new(),
            alerted: HashSet::new(),
            alerts: Vec::new(),
            lines_read: 0,
        })
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    /// Follow the file until `shutdown` fires (or its sender is dropped)
    pub async fn run<S: AlertSink + ?Sized>(
        mut self,
        sink: &S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<TailSummary> {
        loop {
            if stop_requested(&mut shutdown) {
                break;
            }

            let read = self.reader.read_until(b'\n', &mut self.pending).await?;
            self.position += read as u64;

            if self.pending.last() == Some(&b'\n') {
                self.state = TailState::Reading;
                self.lines_read += 1;
                self.boundary = Some(self.position);
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();

                if let Some((ip, attempts)) = self.process_line(&line) {
                    let record = sink.raise(&ip, attempts).await;
                    self.alerts.push(record);
                }
                continue;
            }

            // Nothing new, or only part of a line so far
            self.state = TailState::Idle;
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            self.check_source().await?;
        }

        self.state = TailState::Stopped;
        info!(
            "Live tracking stopped after {} lines, {} alerts",
            self.lines_read,
            self.alerts.len()
        );

        Ok(TailSummary {
            counters: self.counters,
            alerts: self.alerts,
            lines_read: self.lines_read,
        })
    }

    /// Count one complete line; returns the alert to raise, if any
    pub fn process_line(&mut self, line: &str) -> Option<(String, u64)> {
        let ip = self.matcher.extract(line)?;
        let attempts = self.counters.increment(ip);

        if attempts >= self.threshold && self.alerted.insert(ip.to_string()) {
            debug!("{} reached {} failed attempts", ip, attempts);
            Some((ip.to_string(), attempts))
        } else {
            None
        }
    }

    /// Fail if the file is gone; start over if it was truncated, rewritten
    /// or rotated
    async fn check_source(&mut self) -> Result<()> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Log file {} disappeared", self.path.display());
                return Err(ScanError::source_unavailable(&self.path, e));
            }
        };
        let open_meta = self.reader.get_ref().metadata().await?;

        let restart = if !same_file(&meta, &open_meta) {
            Some("replaced")
        } else if meta.len() < self.position {
            Some("truncated")
        } else if !self.boundary_intact().await? {
            Some("rewritten")
        } else {
            None
        };

        if let Some(reason) = restart {
            info!(
                "Log file {} was {}, starting from beginning",
                self.path.display(),
                reason
            );
            let file = File::open(&self.path)
                .await
                .map_err(|e| ScanError::source_unavailable(&self.path, e))?;
            self.reader = BufReader::new(file);
            self.position = 0;
            self.boundary = None;
            self.pending.clear();
        }

        Ok(())
    }

    /// The byte before the last consumed line end must still be a newline
    async fn boundary_intact(&self) -> Result<bool> {
        let Some(offset) = self.boundary else {
            return Ok(true);
        };

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| ScanError::source_unavailable(&self.path, e))?;
        file.seek(SeekFrom::Start(offset - 1)).await?;

        let mut byte = [0u8; 1];
        match file.read_exact(&mut byte).await {
            Ok(_) => Ok(byte[0] == b'\n'),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_: &std::fs::Metadata, _: &std::fs::Metadata) -> bool {
    true
}

fn stop_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}
