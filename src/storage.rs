use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{AlertRecord, ResultsFile};

/// JSON results file (`data/output.json` by default)
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with `entries`
    pub async fn save(&self, entries: &[AlertRecord]) -> Result<()> {
        self.write(&ResultsFile::new(entries.to_vec())).await?;
        info!("Results saved to {}", self.path.display());
        Ok(())
    }

    /// Add one record to whatever the file already holds
    pub async fn append(&self, record: &AlertRecord) -> Result<()> {
        let mut entries = match self.load().await {
            Ok(Some(file)) => file.entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                let backup = self.backup_path();
                tokio::fs::rename(&self.path, &backup).await?;
                warn!(
                    "Existing results in {} unreadable ({}), moved to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                Vec::new()
            }
        };
        entries.push(record.clone());

        self.write(&ResultsFile::new(entries)).await?;
        info!("Appended {} to {}", record.ip, self.path.display());
        Ok(())
    }

    /// Current file contents, `None` when nothing has been written yet
    pub async fn load(&self) -> Result<Option<ResultsFile>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file = serde_json::from_str(&content).map_err(std::io::Error::other)?;
        Ok(Some(file))
    }

    /// Where an unreadable results file is moved before starting over
    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    async fn write(&self, file: &ResultsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(file).map_err(std::io::Error::other)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
