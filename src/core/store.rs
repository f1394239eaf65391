use crate::core::normalizer;
use crate::domain::model::{AddOutcome, ClearOutcome, Identifier, OwnerId};
use crate::domain::ports::{SavedSets, Storage};
use crate::utils::error::{CheckError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;

type SetMap = BTreeMap<OwnerId, Vec<Identifier>>;

/// Owner-keyed, size-capped saved identifier lists, persisted as one JSON
/// object after every mutation.
pub struct SavedStore<S: Storage> {
    storage: S,
    path: String,
    max_per_owner: usize,
    sets: RwLock<SetMap>,
    last_warning: Mutex<Option<String>>,
}

impl<S: Storage> SavedStore<S> {
    /// Reads the backing file once. A missing or unreadable file yields an empty store.
    pub async fn load(storage: S, path: impl Into<String>, max_per_owner: usize) -> Self {
        let path = path.into();
        let sets = match storage.read_file(&path).await {
            Ok(bytes) => match Self::decode(&bytes, max_per_owner) {
                Ok(sets) => {
                    tracing::info!("Loaded saved numbers for {} owners from {}", sets.len(), path);
                    sets
                }
                Err(e) => {
                    tracing::warn!("Saved numbers file {} is corrupt, starting empty: {}", path, e);
                    SetMap::new()
                }
            },
            Err(CheckError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No saved numbers file at {}, starting empty", path);
                SetMap::new()
            }
            Err(e) => {
                tracing::warn!("Could not read saved numbers from {}, starting empty: {}", path, e);
                SetMap::new()
            }
        };

        Self {
            storage,
            path,
            max_per_owner,
            sets: RwLock::new(sets),
            last_warning: Mutex::new(None),
        }
    }

    /// Re-canonicalizes on the way in so a hand-edited file cannot break the
    /// digit-only or size invariants.
    fn decode(bytes: &[u8], max_per_owner: usize) -> Result<SetMap> {
        let raw: BTreeMap<OwnerId, Vec<String>> = serde_json::from_slice(bytes)?;
        Ok(raw
            .into_iter()
            .map(|(owner, tokens)| {
                let mut ids = normalizer::identifiers(tokens.iter().map(String::as_str));
                ids.truncate(max_per_owner);
                (owner, ids)
            })
            .filter(|(_, ids)| !ids.is_empty())
            .collect())
    }

    pub fn max_per_owner(&self) -> usize {
        self.max_per_owner
    }

    pub async fn add<'a, I>(&self, owner: OwnerId, raw_tokens: I) -> AddOutcome
    where
        I: IntoIterator<Item = &'a str>,
    {
        let incoming = normalizer::identifiers(raw_tokens);
        let mut sets = self.sets.write().await;
        let list = sets.entry(owner).or_default();
        let present: HashSet<Identifier> = list.iter().cloned().collect();

        let mut added = 0;
        let mut overflow = 0;
        for id in incoming.into_iter().filter(|id| !present.contains(id)) {
            if list.len() < self.max_per_owner {
                list.push(id);
                added += 1;
            } else {
                overflow += 1;
            }
        }
        let total = list.len();
        if total == 0 {
            sets.remove(&owner);
        }

        if overflow > 0 {
            tracing::debug!(
                "Owner {} hit the {} number cap, ignored {} more",
                owner,
                self.max_per_owner,
                overflow
            );
        }

        // re-persist while an earlier write is outstanding so the file catches up
        let persisted = if added > 0 || self.persistence_warning().is_some() {
            self.persist(&sets).await
        } else {
            true
        };
        AddOutcome {
            added,
            total,
            overflow,
            persisted,
        }
    }

    pub async fn list(&self, owner: OwnerId) -> Vec<Identifier> {
        self.sets
            .read()
            .await
            .get(&owner)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear(&self, owner: OwnerId) -> ClearOutcome {
        let mut sets = self.sets.write().await;
        let removed = sets.remove(&owner).map(|ids| ids.len()).unwrap_or(0);
        let persisted = self.persist(&sets).await;
        ClearOutcome { removed, persisted }
    }

    /// Message of the most recent failed write, cleared by the next successful one.
    pub fn persistence_warning(&self) -> Option<String> {
        self.last_warning
            .lock()
            .ok()
            .and_then(|warning| warning.clone())
    }

    async fn persist(&self, sets: &SetMap) -> bool {
        let outcome = match serde_json::to_vec_pretty(sets) {
            Ok(data) => self.storage.write_file(&self.path, &data).await,
            Err(e) => Err(e.into()),
        };

        let warning = match outcome {
            Ok(()) => None,
            Err(e) => {
                let err = CheckError::PersistenceError {
                    path: self.path.clone(),
                    message: e.to_string(),
                };
                tracing::warn!("{} (keeping in-memory state)", err);
                Some(err.to_string())
            }
        };
        let persisted = warning.is_none();
        if let Ok(mut slot) = self.last_warning.lock() {
            *slot = warning;
        }
        persisted
    }
}

#[async_trait]
impl<S: Storage> SavedSets for SavedStore<S> {
    async fn saved(&self, owner: OwnerId) -> Result<Vec<Identifier>> {
        Ok(self.list(owner).await)
    }

    fn persistence_warning(&self) -> Option<String> {
        SavedStore::persistence_warning(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<tokio::sync::Mutex<HashMap<String, Vec<u8>>>>,
        fail_writes: Arc<AtomicBool>,
    }

    impl MockStorage {
        fn with_file(path: &str, data: &[u8]) -> Self {
            let storage = Self::default();
            storage
                .files
                .try_lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            storage
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                CheckError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(CheckError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn strs(ids: &[Identifier]) -> Vec<&str> {
        ids.iter().map(Identifier::as_str).collect()
    }

    #[tokio::test]
    async fn test_add_respects_cap_and_duplicates() {
        let store = SavedStore::load(MockStorage::default(), "saved.json", 2).await;

        let outcome = store.add(7, ["888111", "888111", "222"]).await;

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.total, 2);
        assert_eq!(strs(&store.list(7).await), vec!["888111", "222"]);
    }

    #[tokio::test]
    async fn test_overflow_beyond_cap_is_ignored() {
        let store = SavedStore::load(MockStorage::default(), "saved.json", 3).await;

        let outcome = store.add(1, ["1", "2", "3", "4", "5"]).await;
        assert_eq!((outcome.added, outcome.total, outcome.overflow), (3, 3, 2));

        let outcome = store.add(1, ["6"]).await;
        assert_eq!((outcome.added, outcome.total, outcome.overflow), (0, 3, 1));
        assert_eq!(strs(&store.list(1).await), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_readding_keeps_total() {
        let store = SavedStore::load(MockStorage::default(), "saved.json", 10).await;
        store.add(1, ["+888 111", "222"]).await;

        let outcome = store.add(1, ["888-111"]).await;

        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.total, 2);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let storage = MockStorage::default();
        let store = SavedStore::load(storage.clone(), "saved.json", 10).await;

        store.add(5, ["111", "222"]).await;
        let written = storage.get_file("saved.json").await.unwrap();
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed["5"], vec!["111", "222"]);

        let cleared = store.clear(5).await;
        assert_eq!(cleared.removed, 2);
        assert!(cleared.persisted);
        let written = storage.get_file("saved.json").await.unwrap();
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_slice(&written).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_load_tolerates_corrupt_file() {
        let storage = MockStorage::with_file("saved.json", b"{not json");
        let store = SavedStore::load(storage, "saved.json", 10).await;
        assert!(store.list(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_sanitizes_existing_entries() {
        let storage =
            MockStorage::with_file("saved.json", br#"{"9": ["+888 1", "8881", "x", "2", "3"]}"#);
        let store = SavedStore::load(storage, "saved.json", 2).await;
        assert_eq!(strs(&store.list(9).await), vec!["8881", "2"]);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let storage = MockStorage::default();
        storage.fail_writes.store(true, Ordering::SeqCst);
        let store = SavedStore::load(storage.clone(), "saved.json", 10).await;

        let outcome = store.add(3, ["123"]).await;

        assert!(!outcome.persisted);
        assert_eq!(outcome.added, 1);
        assert_eq!(strs(&store.list(3).await), vec!["123"]);
        assert!(store.persistence_warning().unwrap().contains("saved.json"));

        storage.fail_writes.store(false, Ordering::SeqCst);
        store.add(3, ["456"]).await;
        assert!(store.persistence_warning().is_none());
    }

    #[tokio::test]
    async fn test_noop_add_reports_outstanding_write_failure() {
        let storage = MockStorage::default();
        storage.fail_writes.store(true, Ordering::SeqCst);
        let store = SavedStore::load(storage.clone(), "saved.json", 10).await;
        store.add(3, ["123"]).await;

        let outcome = store.add(3, ["123"]).await;

        assert_eq!(outcome.added, 0);
        assert!(!outcome.persisted);
        assert!(store.persistence_warning().is_some());
        assert!(storage.get_file("saved.json").await.is_none());
    }

    #[tokio::test]
    async fn test_noop_add_flushes_once_storage_recovers() {
        let storage = MockStorage::default();
        storage.fail_writes.store(true, Ordering::SeqCst);
        let store = SavedStore::load(storage.clone(), "saved.json", 10).await;
        store.add(3, ["123"]).await;
        storage.fail_writes.store(false, Ordering::SeqCst);

        let outcome = store.add(3, ["123"]).await;

        assert_eq!(outcome.added, 0);
        assert!(outcome.persisted);
        assert!(store.persistence_warning().is_none());
        let written = storage.get_file("saved.json").await.unwrap();
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed["3"], vec!["123"]);
    }
}
