use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::counter::CounterStore;
use crate::error::{Result, ScanError};
use crate::matcher::LineMatcher;

/// One-pass scanner over a finite log source
#[derive(Debug, Clone, Default)]
pub struct BatchScanner {
    matcher: LineMatcher,
}

impl BatchScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` to the end and tally failed logins per address
    pub fn scan<P: AsRef<Path>>(&self, path: P) -> Result<CounterStore> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| ScanError::source_unavailable(path, e))?;

        let counters = self.scan_reader(BufReader::new(file))?;
        info!(
            "Scanned {}: {} failed attempts from {} addresses",
            path.display(),
            counters.total(),
            counters.len()
        );
        Ok(counters)
    }

    /// Tally failed logins from any buffered reader, in read order
    pub fn scan_reader<R: BufRead>(&self, mut reader: R) -> Result<CounterStore> {
        let mut counters = CounterStore::new();
        let mut buf = Vec::new();
        let mut lines = 0u64;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            lines += 1;

            let line = String::from_utf8_lossy(&buf);
            if let Some(ip) = self.matcher.extract(&line) {
                counters.increment(ip);
            }
        }

        debug!("Read {} lines", lines);
        Ok(counters)
    }
}
