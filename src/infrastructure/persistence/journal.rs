//! JSON-lines snapshot file backing [`super::MemoryStorage`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::entities::ShortLink;
use crate::domain::repositories::{StorageError, StorageResult};

/// A file holding one JSON-encoded [`ShortLink`] per line.
///
/// The file is never appended to. Every [`Journal::rewrite`] replaces it with a
/// full snapshot written to a sibling temp file and renamed into place, so a
/// reader never observes a half-written journal.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays the journal into a code → link map.
    ///
    /// A missing file is created empty. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] for the first line that is not a valid
    /// short link, and [`StorageError::Journal`] on I/O failures.
    pub async fn load(&self) -> StorageResult<HashMap<String, ShortLink>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.create_empty().await?;
                info!(path = %self.path.display(), "Created empty journal");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut links = HashMap::new();

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let link: ShortLink = serde_json::from_str(line).map_err(|source| {
                StorageError::Corrupt {
                    line: idx + 1,
                    source,
                }
            })?;

            links.insert(link.code.clone(), link);
        }

        debug!(path = %self.path.display(), count = links.len(), "Journal replayed");

        Ok(links)
    }

    /// Replaces the journal content with `links`.
    pub async fn rewrite(&self, links: &HashMap<String, ShortLink>) -> StorageResult<()> {
        // Sorted so that identical maps produce identical files.
        let mut ordered: Vec<&ShortLink> = links.values().collect();
        ordered.sort_by(|a, b| a.code.cmp(&b.code));

        let mut buffer = String::new();
        for link in ordered {
            buffer.push_str(&serde_json::to_string(link)?);
            buffer.push('\n');
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, buffer).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    async fn create_empty(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
