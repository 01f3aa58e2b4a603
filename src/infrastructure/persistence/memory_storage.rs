//! In-memory storage with an optional JSON-lines journal.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::journal::Journal;
use crate::domain::entities::{ShortLink, StoreStats};
use crate::domain::repositories::{Storage, StorageError, StorageResult, UniquenessPolicy};

type LinkMap = HashMap<String, ShortLink>;

/// Storage keeping every link in a code → link map.
///
/// When opened with a journal path the whole map is rewritten to disk after
/// each mutation. Mutations are staged on a copy of the map, persisted, and
/// only then swapped in while the write lock is held, so memory and the
/// journal never diverge, even when the write fails.
pub struct MemoryStorage {
    links: RwLock<LinkMap>,
    journal: Option<Journal>,
    policy: UniquenessPolicy,
}

impl MemoryStorage {
    /// Creates an empty store that is never persisted.
    pub fn new(policy: UniquenessPolicy) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            journal: None,
            policy,
        }
    }

    /// Opens a store backed by the journal at `path`, replaying its content.
    ///
    /// # Errors
    ///
    /// Fails if the journal cannot be read or contains a malformed line.
    pub async fn open(path: impl Into<PathBuf>, policy: UniquenessPolicy) -> StorageResult<Self> {
        let journal = Journal::new(path);
        let links = journal.load().await?;

        info!(
            path = %journal.path().display(),
            links = links.len(),
            "Memory storage loaded from journal"
        );

        Ok(Self {
            links: RwLock::new(links),
            journal: Some(journal),
            policy,
        })
    }

    /// Persists `staged` and makes it the current map.
    async fn commit(&self, current: &mut LinkMap, staged: LinkMap) -> StorageResult<()> {
        if let Some(journal) = &self.journal {
            journal.rewrite(&staged).await?;
        }
        *current = staged;
        Ok(())
    }

    /// Returns the link reserving `original_url`, ignoring the link with id `except`.
    fn reserving<'a>(
        &self,
        links: &'a LinkMap,
        original_url: &str,
        except: Option<Uuid>,
    ) -> Option<&'a ShortLink> {
        links.values().find(|link| {
            link.original_url == original_url
                && Some(link.id) != except
                && self.policy.reserves_url(link)
        })
    }

    /// Validates and adds a new link to `links`.
    fn stage_insert(&self, links: &mut LinkMap, mut link: ShortLink) -> StorageResult<()> {
        if links.contains_key(&link.code) {
            return Err(StorageError::DuplicateCode { code: link.code });
        }

        if links.values().any(|existing| existing.id == link.id) {
            return Err(StorageError::DuplicateId { id: link.id });
        }

        if self.reserving(links, &link.original_url, None).is_some() {
            return Err(StorageError::Conflict {
                original_url: link.original_url,
            });
        }

        link.deleted = false;
        links.insert(link.code.clone(), link);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_by_code(&self, code: &str) -> StorageResult<ShortLink> {
        self.links
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<ShortLink> {
        self.links
            .read()
            .await
            .values()
            .find(|link| link.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_by_original_url(&self, original_url: &str) -> StorageResult<ShortLink> {
        let links = self.links.read().await;
        self.reserving(&links, original_url, None)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_by_owner(&self, owner: &str, limit: usize) -> StorageResult<Vec<ShortLink>> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .filter(|link| link.is_owned_by(owner))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save(&self, link: ShortLink) -> StorageResult<()> {
        let mut links = self.links.write().await;
        let mut staged = links.clone();
        self.stage_insert(&mut staged, link)?;
        self.commit(&mut links, staged).await
    }

    async fn insert_batch(&self, batch: Vec<ShortLink>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut links = self.links.write().await;
        let mut staged = links.clone();
        for link in batch {
            self.stage_insert(&mut staged, link)?;
        }
        self.commit(&mut links, staged).await
    }

    async fn update_batch(&self, batch: Vec<ShortLink>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut links = self.links.write().await;
        let mut staged = links.clone();
        let codes_by_id: HashMap<Uuid, String> = staged
            .values()
            .map(|link| (link.id, link.code.clone()))
            .collect();

        for update in batch {
            let code = codes_by_id.get(&update.id).ok_or(StorageError::NotFound)?;

            if self
                .reserving(&staged, &update.original_url, Some(update.id))
                .is_some()
            {
                return Err(StorageError::Conflict {
                    original_url: update.original_url,
                });
            }

            if let Some(existing) = staged.get_mut(code) {
                existing.original_url = update.original_url;
                existing.deleted |= update.deleted;
            }
        }

        self.commit(&mut links, staged).await
    }

    async fn delete_flag_batch(&self, codes: &[String], owner: &str) -> StorageResult<()> {
        let mut links = self.links.write().await;
        let mut staged = links.clone();
        let mut flagged = 0usize;

        for code in codes {
            if let Some(link) = staged.get_mut(code)
                && link.is_owned_by(owner)
                && !link.deleted
            {
                link.deleted = true;
                flagged += 1;
            }
        }

        debug!(requested = codes.len(), flagged, owner, "Delete flags applied");

        if flagged == 0 {
            return Ok(());
        }
        self.commit(&mut links, staged).await
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        let links = self.links.read().await;
        let urls = links.values().filter(|link| !link.deleted).count();
        let users = links
            .values()
            .map(|link| link.owner.as_str())
            .collect::<HashSet<_>>()
            .len();

        Ok(StoreStats {
            urls: urls as i64,
            users: users as i64,
        })
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
