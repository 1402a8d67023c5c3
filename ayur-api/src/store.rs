//! Local knowledge store
//!
//! Maps normalized scientific names to annotation records (common name,
//! medicinal uses, contraindications, taxonomy hints, provenance).
//!
//! The persisted form is a single JSON document that is read in full for
//! every operation and rewritten in full on every update. Writes go through a
//! temporary file in the same directory followed by a rename, so a reader
//! never observes a half-written document.

use async_trait::async_trait;
use ayur_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Full in-memory view of the store, keyed by normalized scientific name
pub type Store = BTreeMap<String, AnnotationRecord>;

/// Canonical store key: trimmed, lowercased; `None` for an empty name
pub fn normalize(name: &str) -> Option<String> {
    let key = name.trim().to_lowercase();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// One annotation record per species
///
/// Every field defaults when missing so hand-curated partial entries load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationRecord {
    pub common_name: String,
    /// Medicinal-use notes, in curation order
    pub uses: Vec<String>,
    #[serde(rename = "contra", alias = "contraindications")]
    pub contraindications: Vec<String>,
    pub family: String,
    pub genus: String,
    pub notes: String,
    /// Provenance tag, e.g. "local-db" or "plantnet+local"
    pub source: String,
    /// Epoch seconds of first creation; never overwritten by later merges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Field-level update; `None` leaves the stored value untouched
///
/// Sequences are replaced as a whole, never merged element-wise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    pub common_name: Option<String>,
    pub uses: Option<Vec<String>>,
    pub contraindications: Option<Vec<String>>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub notes: Option<String>,
    pub source: Option<String>,
}

impl PartialRecord {
    /// Overlay this partial onto `record`, stamping `updated_at` if absent
    pub fn apply_to(self, record: &mut AnnotationRecord, now: i64) {
        if let Some(common_name) = self.common_name {
            record.common_name = common_name;
        }
        if let Some(uses) = self.uses {
            record.uses = uses;
        }
        if let Some(contraindications) = self.contraindications {
            record.contraindications = contraindications;
        }
        if let Some(family) = self.family {
            record.family = family;
        }
        if let Some(genus) = self.genus {
            record.genus = genus;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
        if let Some(source) = self.source {
            record.source = source;
        }
        record.updated_at.get_or_insert(now);
    }
}

/// Merge `partial` into the entry for `key`, creating it if needed
fn merge_entry(store: &mut Store, key: String, partial: PartialRecord) {
    let entry = store.entry(key).or_default();
    partial.apply_to(entry, time::epoch_seconds());
}

/// Storage contract for annotation records
///
/// `lookup` and `upsert` normalize the name themselves; callers pass the raw
/// scientific name as returned by the identification provider.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Load the entire mapping
    async fn read(&self) -> Result<Store>;

    /// Replace the entire mapping
    async fn write(&self, store: &Store) -> Result<()>;

    /// Merge `partial` onto the stored record and persist the full store
    async fn upsert(&self, scientific_name: &str, partial: PartialRecord) -> Result<()>;

    /// Stored record for the name, or a default record when absent
    ///
    /// Never fails: an unreadable store is logged and treated as empty.
    async fn lookup(&self, scientific_name: &str) -> AnnotationRecord {
        let Some(key) = normalize(scientific_name) else {
            return AnnotationRecord::default();
        };

        match self.read().await {
            Ok(store) => store.get(&key).cloned().unwrap_or_default(),
            Err(e) => {
                warn!(key = %key, error = %e, "Knowledge store unreadable during lookup");
                AnnotationRecord::default()
            }
        }
    }
}

/// Knowledge store persisted as one pretty-printed JSON document
///
/// The read-merge-write cycle of `upsert` runs under an async mutex, so
/// concurrent upserts within this process never lose each other's updates.
/// Other processes writing the same file are not coordinated.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory and an empty `{}` document if missing
    ///
    /// Uses create-new semantics so an existing document is never clobbered.
    pub async fn ensure_initialized(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;

        match created {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(b"{}").await?;
                file.flush().await?;
                info!("Initialized empty knowledge store at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn load(&self) -> Result<Store> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.ensure_initialized().await?;
                return Ok(Store::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            Error::StorageCorrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, store: &Store) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(store)
            .map_err(|e| Error::Internal(format!("Serialize knowledge store failed: {}", e)))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| Error::Internal(format!("Store writer task failed: {}", e)))??;

        debug!(records = store.len(), path = %self.path.display(), "Knowledge store written");
        Ok(())
    }
}

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl KnowledgeStore for JsonFileStore {
    async fn read(&self) -> Result<Store> {
        self.load().await
    }

    async fn write(&self, store: &Store) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(store).await
    }

    async fn upsert(&self, scientific_name: &str, partial: PartialRecord) -> Result<()> {
        let Some(key) = normalize(scientific_name) else {
            warn!("Skipping knowledge store upsert: empty scientific name");
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let mut store = self.load().await?;
        merge_entry(&mut store, key.clone(), partial);
        self.save(&store).await?;

        debug!(key = %key, "Knowledge store entry upserted");
        Ok(())
    }
}

/// In-memory knowledge store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Store>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with records; names are normalized like any other write
    pub fn with_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, AnnotationRecord)>,
        S: AsRef<str>,
    {
        let store = records
            .into_iter()
            .filter_map(|(name, record)| normalize(name.as_ref()).map(|key| (key, record)))
            .collect();
        Self {
            records: Mutex::new(store),
        }
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn read(&self) -> Result<Store> {
        Ok(self.records.lock().await.clone())
    }

    async fn write(&self, store: &Store) -> Result<()> {
        *self.records.lock().await = store.clone();
        Ok(())
    }

    async fn upsert(&self, scientific_name: &str, partial: PartialRecord) -> Result<()> {
        let Some(key) = normalize(scientific_name) else {
            warn!("Skipping knowledge store upsert: empty scientific name");
            return Ok(());
        };

        let mut records = self.records.lock().await;
        merge_entry(&mut records, key, partial);
        Ok(())
    }
}
