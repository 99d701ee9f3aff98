use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
#[cfg(any(test, feature = "mock"))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::error::StorageResult;
#[cfg(any(test, feature = "mock"))]
use super::error::StorageError;
use super::{RecordStore, validate_collection};

#[derive(Debug, Default)]
struct Collection {
    records: BTreeMap<String, (Option<String>, Vec<u8>)>,
    by_index: HashMap<String, BTreeSet<String>>,
}

impl Collection {
    fn unlink(&mut self, key: &str, index_key: Option<&String>) {
        if let Some(index_key) = index_key
            && let Some(keys) = self.by_index.get_mut(index_key)
        {
            keys.remove(key);
            if keys.is_empty() {
                self.by_index.remove(index_key);
            }
        }
    }
}

/// In-process [`RecordStore`]. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    #[cfg(any(test, feature = "mock"))]
    fail_reads: Arc<AtomicBool>,
    #[cfg(any(test, feature = "mock"))]
    fail_writes: Arc<AtomicBool>,
    #[cfg(any(test, feature = "mock"))]
    puts_until_failure: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "mock"))]
impl MemoryStore {
    /// Makes subsequent reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the `n`-th `put` from now fail (1 is the next one); later puts succeed.
    pub fn fail_nth_put(&self, n: usize) {
        self.puts_until_failure.store(n, Ordering::SeqCst);
    }

    fn check_put(&self) -> StorageResult<()> {
        self.check_write()?;
        let remaining = self
            .puts_until_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or_else(|current| current);
        if remaining == 1 {
            return Err(StorageError::Injected {
                reason: "put failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Injected {
                reason: "read failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Injected {
                reason: "write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(not(any(test, feature = "mock")))]
impl MemoryStore {
    fn check_read(&self) -> StorageResult<()> {
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        Ok(())
    }

    fn check_put(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_collection(collection)?;
        self.check_read()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.records.get(key))
            .map(|(_, payload)| payload.clone()))
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        index_key: Option<&str>,
        payload: Vec<u8>,
    ) -> StorageResult<()> {
        validate_collection(collection)?;
        self.check_put()?;

        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some((previous, _)) = entry.records.remove(key) {
            entry.unlink(key, previous.as_ref());
        }
        if let Some(index_key) = index_key {
            entry
                .by_index
                .entry(index_key.to_string())
                .or_default()
                .insert(key.to_string());
        }
        entry
            .records
            .insert(key.to_string(), (index_key.map(str::to_string), payload));
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> StorageResult<bool> {
        validate_collection(collection)?;
        self.check_write()?;

        let mut collections = self.collections.write();
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match entry.records.remove(key) {
            Some((index_key, _)) => {
                entry.unlink(key, index_key.as_ref());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self, collection: &str) -> StorageResult<usize> {
        validate_collection(collection)?;
        self.check_write()?;
        Ok(self
            .collections
            .write()
            .remove(collection)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }

    async fn keys(&self, collection: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.check_read()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.records.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn keys_by_index(&self, collection: &str, index_key: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.check_read()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.by_index.get(index_key))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn index_values(&self, collection: &str) -> StorageResult<Vec<String>> {
        validate_collection(collection)?;
        self.check_read()?;
        let mut values: Vec<String> = self
            .collections
            .read()
            .get(collection)
            .map(|c| c.by_index.keys().cloned().collect())
            .unwrap_or_default();
        values.sort();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_upsert_and_index() {
        let store = MemoryStore::new();
        store.put("vectors", "a#0", Some("a"), vec![1]).await.unwrap();
        store.put("vectors", "a#1", Some("a"), vec![2]).await.unwrap();
        store.put("vectors", "a#1", Some("b"), vec![3]).await.unwrap();

        assert_eq!(store.keys_by_index("vectors", "a").await.unwrap(), vec!["a#0"]);
        assert_eq!(store.keys_by_index("vectors", "b").await.unwrap(), vec!["a#1"]);
        assert_eq!(store.get("vectors", "a#1").await.unwrap(), Some(vec![3]));
        assert_eq!(store.index_values("vectors").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_memory_store_delete_and_clear() {
        let store = MemoryStore::new();
        store.put("vectors", "k1", Some("d"), vec![1]).await.unwrap();
        store.put("vectors", "k2", Some("d"), vec![2]).await.unwrap();

        assert!(store.delete("vectors", "k1").await.unwrap());
        assert!(!store.delete("vectors", "k1").await.unwrap());
        assert!(!store.delete("missing", "k1").await.unwrap());
        assert_eq!(store.keys_by_index("vectors", "d").await.unwrap(), vec!["k2"]);

        assert_eq!(store.clear("vectors").await.unwrap(), 1);
        assert_eq!(store.count("vectors").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.put("c", "k", None, vec![1]).await.unwrap();

        store.set_fail_reads(true);
        assert!(store.get("c", "k").await.is_err());
        store.set_fail_reads(false);

        store.set_fail_writes(true);
        assert!(store.put("c", "k2", None, vec![]).await.is_err());
        store.set_fail_writes(false);

        assert_eq!(store.get("c", "k").await.unwrap(), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_memory_store_fails_only_the_nth_put() {
        let store = MemoryStore::new();
        store.fail_nth_put(2);

        assert!(store.put("c", "a", None, vec![1]).await.is_ok());
        assert!(store.put("c", "b", None, vec![2]).await.is_err());
        assert!(store.put("c", "c", None, vec![3]).await.is_ok());

        assert_eq!(store.keys("c").await.unwrap(), vec!["a", "c"]);
    }
}
