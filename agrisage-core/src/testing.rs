//! In-memory fakes for the trait seams, shared by the pipeline and deletion
//! tests. Failure injection is deliberately coarse: a flipped flag fails the
//! next matching operation, which is all the dual-store tests need.

use crate::generation::{GenerationError, InlineImage, TextGenerator};
use crate::models::{AdvisoryRecord, DiagnosticRecord, NewAdvisory, NewDiagnostic};
use crate::storage::{BlobError, BlobStore};
use crate::store::{RecordKind, RecordStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// StubGenerator
// ============================================================================

pub enum StubReply {
    Text(String),
    ApiError(u16),
}

pub struct StubGenerator {
    reply: StubReply,
}

impl StubGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: StubReply::Text(text.into()),
        }
    }

    pub fn failing(code: u16) -> Self {
        Self {
            reply: StubReply::ApiError(code),
        }
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _image: Option<&InlineImage>,
    ) -> Result<String, GenerationError> {
        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            StubReply::ApiError(code) => Err(GenerationError::Api {
                code: *code,
                message: "stub failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

// ============================================================================
// MemoryRecordStore
// ============================================================================

#[derive(Default)]
pub struct MemoryRecordStore {
    pub advisories: Mutex<Vec<AdvisoryRecord>>,
    pub diagnostics: Mutex<Vec<DiagnosticRecord>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryRecordStore {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Write(sqlx::Error::PoolClosed))
        } else {
            Ok(())
        }
    }

    fn read_guard(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Read(sqlx::Error::PoolClosed))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_advisory(&self, new: NewAdvisory) -> Result<AdvisoryRecord, StoreError> {
        self.write_guard()?;
        let record = AdvisoryRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            diagnosis: new.diagnosis,
            advice: new.advice,
            created_at: Utc::now(),
        };
        self.advisories.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn insert_diagnostic(&self, new: NewDiagnostic) -> Result<DiagnosticRecord, StoreError> {
        self.write_guard()?;
        let record = DiagnosticRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            image_url: new.image_url,
            diagnosis: new.diagnosis,
            advice: new.advice,
            confidence: new.confidence,
            created_at: Utc::now(),
        };
        self.diagnostics.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_advisories(&self, owner: Uuid) -> Result<Vec<AdvisoryRecord>, StoreError> {
        self.read_guard()?;
        // newest first: reverse insertion order
        Ok(self
            .advisories
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect())
    }

    async fn list_diagnostics(&self, owner: Uuid) -> Result<Vec<DiagnosticRecord>, StoreError> {
        self.read_guard()?;
        Ok(self
            .diagnostics
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect())
    }

    async fn fetch_diagnostic(&self, id: Uuid) -> Result<Option<DiagnosticRecord>, StoreError> {
        self.read_guard()?;
        Ok(self
            .diagnostics
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn diagnostic_image_urls(&self, owner: Uuid) -> Result<Vec<String>, StoreError> {
        self.read_guard()?;
        Ok(self
            .diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == owner)
            .map(|r| r.image_url.clone())
            .collect())
    }

    async fn delete_by_id(&self, kind: RecordKind, id: Uuid) -> Result<u64, StoreError> {
        self.write_guard()?;
        let removed = match kind {
            RecordKind::Advisory => {
                let mut rows = self.advisories.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.id != id);
                before - rows.len()
            }
            RecordKind::Diagnostic => {
                let mut rows = self.diagnostics.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.id != id);
                before - rows.len()
            }
        };
        Ok(removed as u64)
    }

    async fn delete_all_by_owner(&self, kind: RecordKind, owner: Uuid) -> Result<u64, StoreError> {
        self.write_guard()?;
        let removed = match kind {
            RecordKind::Advisory => {
                let mut rows = self.advisories.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.user_id != owner);
                before - rows.len()
            }
            RecordKind::Diagnostic => {
                let mut rows = self.diagnostics.lock().unwrap();
                let before = rows.len();
                rows.retain(|r| r.user_id != owner);
                before - rows.len()
            }
        };
        Ok(removed as u64)
    }
}

// ============================================================================
// MemoryBlobStore
// ============================================================================

#[derive(Default)]
pub struct MemoryBlobStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
    undeletable: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Mark a key so bulk removal reports it as failed.
    pub fn make_undeletable(&self, key: impl Into<String>) {
        self.undeletable.lock().unwrap().insert(key.into());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Write {
                code: 500,
                message: "stub failure".to_string(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Err(BlobError::Write {
                code: 409,
                message: "key exists".to_string(),
            });
        }
        objects.insert(key.to_string(), bytes);
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://blobs.test/object/public/crop-images/{key}")
    }

    async fn remove(&self, keys: &[String]) -> Result<(), BlobError> {
        let undeletable = self.undeletable.lock().unwrap();
        let mut objects = self.objects.lock().unwrap();
        let mut failed = Vec::new();
        for key in keys {
            if undeletable.contains(key) {
                failed.push(key.clone());
            } else {
                objects.remove(key);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(BlobError::Delete { failed })
        }
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.split_once("/crop-images/")
            .map(|(_, key)| key.to_string())
    }
}
