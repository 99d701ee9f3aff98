//! File-per-record store on local disk.
//!
//! Layout: `<root>/<collection>/<blake3(collection|key)>.rkyv`. Writes go to a
//! `.rkyv.tmp` sibling which is then renamed into place.


use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::record::StoredRecord;
use super::{RecordStore, validate_collection};
use crate::hashing::hash_record_key;

const RKYV_EXTENSION: &str = "rkyv";

const TEMP_EXTENSION: &str = "rkyv.tmp";

/// Secondary index for one collection, built on first use by scanning its directory.
#[derive(Debug, Default)]
struct CollectionIndex {
    by_index: HashMap<String, BTreeSet<String>>,
    index_of: HashMap<String, Option<String>>,
}

impl CollectionIndex {
    fn insert(&mut self, key: &str, index_key: Option<&str>) {
        self.remove(key);
        if let Some(index_key) = index_key {
            self.by_index
                .entry(index_key.to_string())
                .or_default()
                .insert(key.to_string());
        }
        self.index_of
            .insert(key.to_string(), index_key.map(str::to_string));
    }

    fn remove(&mut self, key: &str) {
        if let Some(Some(previous)) = self.index_of.remove(key)
            && let Some(keys) = self.by_index.get_mut(&previous)
        {
            keys.remove(key);
            if keys.is_empty() {
                self.by_index.remove(&previous);
            }
        }
    }
}

#[derive(Debug, Clone)]
/// Stores records as rkyv files under a root directory.
pub struct DiskStore {
    root: PathBuf,
    indexes: Arc<RwLock<HashMap<String, CollectionIndex>>>,
}

impl DiskStore {
    /// Creates a store rooted at `root`; directories are created on first write.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            indexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the root storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if missing; fails if it exists as a file.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::Unavailable {
                path: self.root.clone(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn record_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_path(collection).join(format!(
            "{}.{}",
            hash_record_key(collection, key),
            RKYV_EXTENSION
        ))
    }

    fn temp_record_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_path(collection).join(format!(
            "{}.{}",
            hash_record_key(collection, key),
            TEMP_EXTENSION
        ))
    }

    async fn read_record(path: &Path) -> StorageResult<Option<StoredRecord>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        StoredRecord::decode(&bytes)
            .map(Some)
            .map_err(|reason| StorageError::Corrupted {
                path: path.to_path_buf(),
                reason,
            })
    }

    /// Lists record files of a collection (missing collection = empty).
    async fn record_files(&self, collection: &str) -> StorageResult<Vec<PathBuf>> {
        let dir = self.collection_path(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RKYV_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Reads every decodable record; corrupted files are skipped with a warning.
    async fn scan(&self, collection: &str) -> StorageResult<Vec<StoredRecord>> {
        let mut records = Vec::new();
        for path in self.record_files(collection).await? {
            match Self::read_record(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(records)
    }

    /// Builds the collection index if it is not loaded yet, then runs `f` on it.
    async fn with_index<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&CollectionIndex) -> T,
    ) -> StorageResult<T> {
        {
            let indexes = self.indexes.read().await;
            if let Some(index) = indexes.get(collection) {
                return Ok(f(index));
            }
        }

        let mut indexes = self.indexes.write().await;
        if !indexes.contains_key(collection) {
            let mut index = CollectionIndex::default();
            let records = self.scan(collection).await?;
            for record in &records {
                index.insert(&record.key, record.index_key.as_deref());
            }
            debug!(
                collection,
                records = records.len(),
                "Built secondary index"
            );
            indexes.insert(collection.to_string(), index);
        }

        let index = indexes.get(collection).ok_or_else(|| StorageError::Unavailable {
            path: self.collection_path(collection),
        })?;
        Ok(f(index))
    }

    async fn update_index(&self, collection: &str, f: impl FnOnce(&mut CollectionIndex)) {
        let mut indexes = self.indexes.write().await;
        if let Some(index) = indexes.get_mut(collection) {
            f(index);
        }
    }
}

impl RecordStore for DiskStore {
    async fn get(&self, collection: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_collection(collection)?;
        let path = self.record_path(collection, key);

        Ok(Self::read_record(&path)
            .await?
            .filter(|record| record.key == key)
            .map(|record| record.payload))
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        index_key: Option<&str>,
        payload: Vec<u8>,
    ) -> StorageResult<()> {
        validate_collection(collection)?;
        self.ensure_root().await?;
        fs::create_dir_all(self.collection_path(collection)).await?;

        let bytes = StoredRecord::new(key, index_key, payload).encode()?;

        let temp_path = self.temp_record_path(collection, key);
        let final_path = self.record_path(collection, key);

        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &final_path).await?;

        self.update_index(collection, |index| index.insert(key, index_key))
            .await;
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> StorageResult<bool> {
        validate_collection(collection)?;
        let path = self.record_path(collection, key);

        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        self.update_index(collection, |index| index.remove(key)).await;
        Ok(removed)
    }

    async fn clear(&self, collection: &str) -> StorageResult<usize> {
        validate_collection(collection)?;

        let mut removed = 0;
        for path in self.record_files(collection).await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.indexes
            .write()
            .await
            .insert(collection.to_string(), CollectionIndex::default());
        debug!(collection, removed, "Cleared collection");
        Ok(removed)
    }

    async fn keys(&self, collection: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.with_index(collection, |index| {
            let mut keys: Vec<String> = index.index_of.keys().cloned().collect();
            keys.sort();
            keys
        })
        .await
    }

    async fn keys_by_index(&self, collection: &str, index_key: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.with_index(collection, |index| {
            index
                .by_index
                .get(index_key)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default()
        })
        .await
    }

    async fn index_values(&self, collection: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.with_index(collection, |index| {
            let mut values: Vec<String> = index.by_index.keys().cloned().collect();
            values.sort();
            values
        })
        .await
    }
}
