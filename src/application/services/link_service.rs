//! Link creation, resolution and deletion service.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::{ShortLink, StoreStats};
use crate::domain::repositories::{Storage, StorageError};
use crate::domain::{DeletionPipeline, DeletionTask};
use crate::error::AppError;
use crate::utils::code_generator::generate_code;

/// Attempts at drawing an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 10;

/// Result of [`LinkService::shorten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub link: ShortLink,
    /// False when the URL was already shortened and `link` is the existing record.
    pub created: bool,
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// Service in front of [`Storage`] used by the HTTP handlers.
///
/// Generates codes, resolves URL conflicts to the canonical record and hands
/// deletions to the [`DeletionPipeline`].
pub struct LinkService {
    storage: Arc<dyn Storage>,
    pipeline: DeletionPipeline,
    base_url: String,
}

impl LinkService {
    pub fn new(
        storage: Arc<dyn Storage>,
        pipeline: DeletionPipeline,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            pipeline,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shortens `original_url` for `owner`.
    ///
    /// If the URL is already shortened, the existing record is returned with
    /// `created == false` and no new record is written.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if no free code was found after
    /// [`MAX_CODE_ATTEMPTS`] draws, or on storage failure.
    pub async fn shorten(&self, original_url: &str, owner: &str) -> Result<Shortened, AppError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let link = ShortLink::new(owner, generate_code(), &self.base_url, original_url);

            match self.storage.save(link.clone()).await {
                Ok(()) => {
                    debug!(code = %link.code, owner, "Short link created");
                    return Ok(Shortened {
                        link,
                        created: true,
                    });
                }
                Err(StorageError::DuplicateCode { code }) => {
                    debug!(code = %code, attempt, "Generated code already taken");
                }
                Err(StorageError::Conflict { .. }) => {
                    let existing = self.canonical(original_url).await?;
                    return Ok(Shortened {
                        link: existing,
                        created: false,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(too_many_collisions())
    }

    /// Shortens several URLs at once.
    ///
    /// A correlation id that is a UUID of an existing record owned by `owner`
    /// updates that record's URL. Every other entry becomes a new record,
    /// keyed by the correlation id when it is a UUID. The result keeps the
    /// request order.
    ///
    /// New records are written with one all-or-nothing insert, which commits
    /// before the updates run as one all-or-nothing update. A failing update
    /// therefore leaves the inserted records in place.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty batch or a repeated
    /// correlation id, and
    /// [`AppError::Conflict`] if any URL is already shortened or a correlation
    /// id belongs to another user or was taken by a concurrent request.
    pub async fn shorten_batch(
        &self,
        items: Vec<BatchItem>,
        owner: &str,
    ) -> Result<Vec<(String, ShortLink)>, AppError> {
        if items.is_empty() {
            return Err(AppError::bad_request("Batch must not be empty", json!({})));
        }

        let mut seen = HashSet::with_capacity(items.len());
        if let Some(item) = items.iter().find(|item| !seen.insert(&item.correlation_id)) {
            return Err(AppError::bad_request(
                "Duplicate correlation id in batch",
                json!({ "correlation_id": item.correlation_id }),
            ));
        }

        let mut planned = Vec::with_capacity(items.len());
        for item in items {
            let id = Uuid::parse_str(&item.correlation_id).ok();
            let existing = match id {
                Some(id) => match self.storage.get_by_id(id).await {
                    Ok(link) => Some(link),
                    Err(StorageError::NotFound) => None,
                    Err(e) => return Err(e.into()),
                },
                None => None,
            };

            match existing {
                Some(link) if !link.is_owned_by(owner) => {
                    return Err(AppError::conflict(
                        "Correlation id belongs to another user",
                        json!({ "correlation_id": item.correlation_id }),
                    ));
                }
                Some(mut link) => {
                    link.original_url = item.original_url;
                    planned.push((item.correlation_id, Planned::Update(link)));
                }
                None => {
                    planned.push((
                        item.correlation_id,
                        Planned::Insert {
                            id: id.unwrap_or_else(Uuid::new_v4),
                            original_url: item.original_url,
                        },
                    ));
                }
            }
        }

        let inserted = self.insert_fresh(owner, &planned).await?;

        let updates: Vec<ShortLink> = planned
            .iter()
            .filter_map(|(_, plan)| match plan {
                Planned::Update(link) => Some(link.clone()),
                Planned::Insert { .. } => None,
            })
            .collect();
        let updated = updates.len();
        if !updates.is_empty() {
            self.storage.update_batch(updates).await?;
        }

        info!(
            owner,
            inserted = inserted.len(),
            updated,
            "Batch shortened"
        );

        let mut inserted = inserted.into_iter();
        let mut results = Vec::with_capacity(planned.len());
        for (correlation_id, plan) in planned {
            let link = match plan {
                Planned::Update(link) => link,
                Planned::Insert { .. } => inserted.next().ok_or_else(|| {
                    AppError::internal("Batch insert lost a record", json!({}))
                })?,
            };
            results.push((correlation_id, link));
        }

        Ok(results)
    }

    /// Looks up the record behind `code` for redirecting.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown code and
    /// [`AppError::Gone`] for a deleted one.
    pub async fn resolve(&self, code: &str) -> Result<ShortLink, AppError> {
        let link = self.storage.get_by_code(code).await.map_err(|e| match e {
            StorageError::NotFound => {
                AppError::not_found("Short link not found", json!({ "code": code }))
            }
            other => other.into(),
        })?;

        if link.is_deleted() {
            return Err(AppError::gone("Short link was deleted", json!({ "code": code })));
        }

        Ok(link)
    }

    /// Lists up to `limit` links owned by `owner`, deleted ones included.
    pub async fn user_links(&self, owner: &str, limit: usize) -> Result<Vec<ShortLink>, AppError> {
        Ok(self.storage.list_by_owner(owner, limit).await?)
    }

    /// Queues the deletion of `codes` on behalf of `owner`.
    pub fn delete_links(&self, codes: Vec<String>, owner: &str) -> DeletionTask {
        info!(owner, count = codes.len(), "Deletion requested");
        self.pipeline.submit(codes, owner)
    }

    pub async fn stats(&self) -> Result<StoreStats, AppError> {
        Ok(self.storage.stats().await?)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.storage.ping().await?)
    }

    async fn canonical(&self, original_url: &str) -> Result<ShortLink, AppError> {
        match self.storage.get_by_original_url(original_url).await {
            Ok(link) => Ok(link),
            // The conflicting record vanished from view between the two calls
            Err(StorageError::NotFound) => Err(AppError::internal(
                "Conflicting link could not be loaded",
                json!({ "original_url": original_url }),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Inserts every [`Planned::Insert`] in `planned`, redrawing all codes
    /// when one of them is taken.
    async fn insert_fresh(
        &self,
        owner: &str,
        planned: &[(String, Planned)],
    ) -> Result<Vec<ShortLink>, AppError> {
        let fresh: Vec<(Uuid, &str)> = planned
            .iter()
            .filter_map(|(_, plan)| match plan {
                Planned::Insert { id, original_url } => Some((*id, original_url.as_str())),
                Planned::Update(_) => None,
            })
            .collect();

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let links: Vec<ShortLink> = fresh
                .iter()
                .map(|(id, url)| {
                    let mut link = ShortLink::new(owner, generate_code(), &self.base_url, *url);
                    link.id = *id;
                    link
                })
                .collect();

            match self.storage.insert_batch(links.clone()).await {
                Ok(()) => return Ok(links),
                Err(StorageError::DuplicateCode { code }) => {
                    debug!(code = %code, attempt, "Batch hit a taken code, redrawing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(too_many_collisions())
    }
}

enum Planned {
    Insert { id: Uuid, original_url: String },
    Update(ShortLink),
}

fn too_many_collisions() -> AppError {
    AppError::internal(
        "Failed to generate unique code",
        json!({ "reason": "Too many collisions" }),
    )
}
