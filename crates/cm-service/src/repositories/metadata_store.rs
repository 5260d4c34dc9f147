//! Metadata store accessor.
//!
//! One JSON object per change and location:
//!
//! ```text
//! customers/<code>/<change_id>.json   per-customer copy
//! archive/<change_id>.json            authoritative archive copy
//! ```
//!
//! Writes replace the whole object atomically: the new content is written to
//! a temporary sibling and renamed over the target, so readers see either
//! the previous object or the complete new one.

use crate::errors::CmError;
use crate::models::ChangeRecord;
use common::types::{ChangeId, CustomerCode};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

/// Prefix of per-customer objects.
pub const CUSTOMERS_PREFIX: &str = "customers";

/// Prefix of archive objects.
pub const ARCHIVE_PREFIX: &str = "archive";

/// Location of one change record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    Archive(ChangeId),
    Customer(CustomerCode, ChangeId),
}

impl StoreLocation {
    /// Relative object key.
    pub fn key(&self) -> String {
        match self {
            StoreLocation::Archive(change_id) => format!("{ARCHIVE_PREFIX}/{change_id}.json"),
            StoreLocation::Customer(code, change_id) => {
                format!("{CUSTOMERS_PREFIX}/{code}/{change_id}.json")
            }
        }
    }

    /// Change the location belongs to.
    pub fn change_id(&self) -> &ChangeId {
        match self {
            StoreLocation::Archive(change_id) | StoreLocation::Customer(_, change_id) => change_id,
        }
    }

    /// Classified write failure for this location.
    pub fn write_error(&self, reason: impl fmt::Display) -> CmError {
        CmError::StoreWrite {
            location: self.key(),
            change_id: self.change_id().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Read/replace access to change records.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Read a change record.
    ///
    /// # Errors
    ///
    /// - `CmError::NotFound` - no object at `location`
    /// - `CmError::Malformed` - object is not a valid change record
    async fn read(&self, location: &StoreLocation) -> Result<ChangeRecord, CmError>;

    /// Replace a change record.
    ///
    /// # Errors
    ///
    /// `CmError::StoreWrite` naming the location and change id. The previous
    /// object is left untouched.
    async fn write(&self, location: &StoreLocation, record: &ChangeRecord) -> Result<(), CmError>;
}

/// Parse and validate a stored object.
fn decode_record(location: &StoreLocation, bytes: &[u8]) -> Result<ChangeRecord, CmError> {
    let malformed = |reason: String| CmError::Malformed {
        location: location.key(),
        reason,
    };

    let record: ChangeRecord =
        serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;

    if &record.change_id != location.change_id() {
        return Err(malformed(format!(
            "object holds change {} instead of {}",
            record.change_id,
            location.change_id()
        )));
    }

    if !record.has_consistent_meeting_pair() {
        return Err(malformed(
            "meeting_id and join_url must be both present or both absent".to_string(),
        ));
    }

    Ok(record)
}

fn encode_record(location: &StoreLocation, record: &ChangeRecord) -> Result<Vec<u8>, CmError> {
    if &record.change_id != location.change_id() {
        return Err(location.write_error(format!(
            "record for change {} cannot be written here",
            record.change_id
        )));
    }
    if !record.has_consistent_meeting_pair() {
        return Err(location.write_error("refusing to write a partial meeting pair"));
    }
    serde_json::to_vec_pretty(record).map_err(|e| location.write_error(e))
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    root: PathBuf,
}

impl FileMetadataStore {
    /// Open a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `CmError::StoreInit` if `root` is missing, is not a directory,
    /// or cannot be written to.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CmError> {
        let root = root.into();

        let metadata = std::fs::metadata(&root).map_err(|e| {
            CmError::StoreInit(format!("store root {} is not accessible: {e}", root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(CmError::StoreInit(format!(
                "store root {} is not a directory",
                root.display()
            )));
        }

        let check_file = root.join(format!(".write-check-{}", uuid::Uuid::new_v4()));
        std::fs::write(&check_file, b"").map_err(|e| {
            CmError::StoreInit(format!("store root {} is not writable: {e}", root.display()))
        })?;
        if let Err(e) = std::fs::remove_file(&check_file) {
            debug!(target: "cm.repositories.metadata_store", error = %e, "Failed to remove write check file");
        }

        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, location: &StoreLocation) -> PathBuf {
        self.root.join(location.key())
    }

    async fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "object path has no parent")
        })?;
        tokio::fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = parent.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            // The target is untouched; only the temporary file needs cleanup.
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result
    }
}

#[async_trait::async_trait]
impl MetadataStore for FileMetadataStore {
    #[instrument(skip_all, fields(location = %location))]
    async fn read(&self, location: &StoreLocation) -> Result<ChangeRecord, CmError> {
        let path = self.path_for(location);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CmError::NotFound(location.key()));
            }
            Err(e) => {
                error!(target: "cm.repositories.metadata_store", location = %location, error = %e, "Failed to read metadata object");
                return Err(CmError::Internal(format!("failed to read {location}: {e}")));
            }
        };

        let record = decode_record(location, &bytes)?;
        debug!(target: "cm.repositories.metadata_store", location = %location, "Metadata object read");
        Ok(record)
    }

    #[instrument(skip_all, fields(location = %location))]
    async fn write(&self, location: &StoreLocation, record: &ChangeRecord) -> Result<(), CmError> {
        let bytes = encode_record(location, record)?;
        let path = self.path_for(location);

        Self::replace_file(&path, &bytes).await.map_err(|e| {
            error!(
                target: "cm.repositories.metadata_store",
                location = %location,
                change_id = %location.change_id(),
                error = %e,
                "Failed to write metadata object"
            );
            location.write_error(e)
        })?;

        debug!(target: "cm.repositories.metadata_store", location = %location, "Metadata object written");
        Ok(())
    }
}

/// In-memory store for tests.
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// In-memory metadata store with write-failure injection.
    ///
    /// Objects are kept as serialized JSON so reads go through the same
    /// validation as the file store.
    #[derive(Default)]
    pub struct InMemoryMetadataStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        failing_writes: Mutex<HashSet<String>>,
        fail_all_writes: std::sync::atomic::AtomicBool,
        write_count: AtomicUsize,
    }

    impl InMemoryMetadataStore {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a record without counting it as a write.
        pub async fn insert(&self, location: &StoreLocation, record: &ChangeRecord) {
            if let Ok(bytes) = serde_json::to_vec(record) {
                self.objects.lock().await.insert(location.key(), bytes);
            }
        }

        /// Seed raw bytes (e.g. malformed JSON).
        pub async fn insert_raw(&self, location: &StoreLocation, bytes: &[u8]) {
            self.objects
                .lock()
                .await
                .insert(location.key(), bytes.to_vec());
        }

        /// Current record at a location, if present and valid.
        pub async fn get(&self, location: &StoreLocation) -> Option<ChangeRecord> {
            let objects = self.objects.lock().await;
            objects
                .get(&location.key())
                .and_then(|bytes| decode_record(location, bytes).ok())
        }

        /// Make writes to one location fail.
        pub async fn fail_writes_to(&self, location: &StoreLocation) {
            self.failing_writes.lock().await.insert(location.key());
        }

        /// Make every write fail.
        pub fn fail_all_writes(&self) {
            self.fail_all_writes.store(true, Ordering::SeqCst);
        }

        /// Number of successful writes.
        pub fn write_count(&self) -> usize {
            self.write_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MetadataStore for InMemoryMetadataStore {
        async fn read(&self, location: &StoreLocation) -> Result<ChangeRecord, CmError> {
            let objects = self.objects.lock().await;
            let bytes = objects
                .get(&location.key())
                .ok_or_else(|| CmError::NotFound(location.key()))?;
            decode_record(location, bytes)
        }

        async fn write(
            &self,
            location: &StoreLocation,
            record: &ChangeRecord,
        ) -> Result<(), CmError> {
            let bytes = encode_record(location, record)?;

            if self.fail_all_writes.load(Ordering::SeqCst)
                || self.failing_writes.lock().await.contains(&location.key())
            {
                return Err(location.write_error("injected write failure"));
            }

            self.objects.lock().await.insert(location.key(), bytes);
            self.write_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
