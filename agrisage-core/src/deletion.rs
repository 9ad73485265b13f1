//! Deletion Coordinator — removes records and, for diagnostics, their owned
//! blobs, across two stores that cannot share a transaction.
//!
//! Ordering discipline: a row lookup failure aborts before any blob is
//! touched; a blob-delete failure never blocks the row delete (a leaked blob
//! is tolerable, a row pointing at a missing blob is not guaranteed against
//! the other way — the row always goes). Store failures are fatal; blob
//! failures come back as non-fatal warnings in the report. Every path is
//! idempotent.

use crate::storage::{BlobError, BlobStore};
use crate::store::{RecordKind, RecordStore, StoreError};
use uuid::Uuid;

/// What a deletion accomplished. `failed_blob_keys` is a warning, not a
/// failure: the rows named by the request are gone regardless.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub rows_deleted: u64,
    pub failed_blob_keys: Vec<String>,
}

pub struct DeletionCoordinator<'a> {
    store: &'a dyn RecordStore,
    blobs: &'a dyn BlobStore,
}

impl<'a> DeletionCoordinator<'a> {
    pub fn new(store: &'a dyn RecordStore, blobs: &'a dyn BlobStore) -> Self {
        Self { store, blobs }
    }

    pub async fn delete_advisory(&self, id: Uuid) -> Result<DeletionReport, StoreError> {
        let rows_deleted = self.store.delete_by_id(RecordKind::Advisory, id).await?;
        Ok(DeletionReport {
            rows_deleted,
            failed_blob_keys: Vec::new(),
        })
    }

    pub async fn delete_all_advisories(&self, owner: Uuid) -> Result<DeletionReport, StoreError> {
        let rows_deleted = self
            .store
            .delete_all_by_owner(RecordKind::Advisory, owner)
            .await?;
        Ok(DeletionReport {
            rows_deleted,
            failed_blob_keys: Vec::new(),
        })
    }

    /// Single diagnostic: fetch (abort on lookup failure), blob first, then
    /// the row — which is deleted even when the blob removal fails.
    pub async fn delete_diagnostic(&self, id: Uuid) -> Result<DeletionReport, StoreError> {
        let Some(record) = self.store.fetch_diagnostic(id).await? else {
            // already gone: successful no-op
            return Ok(DeletionReport::default());
        };

        let keys: Vec<String> = self
            .blobs
            .key_for_url(&record.image_url)
            .into_iter()
            .collect();
        let failed_blob_keys = self.remove_blobs(&keys).await;

        let rows_deleted = self.store.delete_by_id(RecordKind::Diagnostic, id).await?;
        Ok(DeletionReport {
            rows_deleted,
            failed_blob_keys,
        })
    }

    /// Bulk: collect blob references, delete all rows in one operation, then
    /// best-effort bulk-delete the blobs. Partial blob failure does not roll
    /// anything back.
    pub async fn delete_all_diagnostics(&self, owner: Uuid) -> Result<DeletionReport, StoreError> {
        let urls = self.store.diagnostic_image_urls(owner).await?;
        let keys: Vec<String> = urls
            .iter()
            .filter_map(|url| self.blobs.key_for_url(url))
            .collect();

        let rows_deleted = self
            .store
            .delete_all_by_owner(RecordKind::Diagnostic, owner)
            .await?;

        let failed_blob_keys = self.remove_blobs(&keys).await;
        Ok(DeletionReport {
            rows_deleted,
            failed_blob_keys,
        })
    }

    async fn remove_blobs(&self, keys: &[String]) -> Vec<String> {
        match self.blobs.remove(keys).await {
            Ok(()) => Vec::new(),
            Err(BlobError::Delete { failed }) => failed,
            // transport-level failure: nothing confirmed removed
            Err(e) => {
                tracing::warn!(error = %e, "blob removal failed outright");
                keys.to_vec()
            }
        }
    }
}

// ============================================================================
// TESTS — in-memory fakes, no network or database
// ============================================================================
