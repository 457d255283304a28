use crate::{cursor::ScanCursor, proposal::ProposalRecord};
use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt value under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// String-keyed persistence, the shape of a browser's local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys live in one JSON object on disk. Every `set` rewrites the file
/// through a sibling temp file and a rename, so readers never observe a
/// half-written document.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    key: path.display().to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }
}

/// Everything persisted for one governor. Cursor and proposals are written
/// together so they cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub cursor: ScanCursor,
    pub proposals: BTreeMap<String, ProposalRecord>,
    pub updated_at: DateTime<Utc>,
}

impl ScanState {
    pub fn new(cursor: ScanCursor) -> Self {
        Self {
            cursor,
            proposals: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Inserts records keyed by proposal id. Returns how many ids were new.
    pub fn merge_proposals(&mut self, records: impl IntoIterator<Item = ProposalRecord>) -> usize {
        let mut inserted = 0;
        for record in records {
            if self
                .proposals
                .insert(record.proposal_id.clone(), record)
                .is_none()
            {
                inserted += 1;
            }
        }
        inserted
    }
}

#[derive(Clone)]
pub struct ScanStateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl ScanStateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn key_for(governor: &Address) -> String {
        format!("scan:{}", governor.to_string().to_lowercase())
    }

    pub async fn load(&self, governor: &Address) -> Result<Option<ScanState>, StoreError> {
        let key = Self::key_for(governor);
        match self.inner.get(&key).await? {
            Some(raw) => {
                let state = serde_json::from_str(&raw)
                    .map_err(|source| StoreError::Corrupt { key, source })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    pub async fn save(&self, governor: &Address, state: &ScanState) -> Result<(), StoreError> {
        let key = Self::key_for(governor);
        let raw = serde_json::to_string(state).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.inner.set(&key, raw).await?;
        debug!(key = %key, proposals = state.proposals.len(), "Saved scan state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::proposal_event;
    use alloy::primitives::address;

    const GOVERNOR: Address = address!("0x5e4be8Bc9637f0EAA1A755019e06A68ce081D58F");

    fn record(id: u64, vote_start: u64) -> ProposalRecord {
        ProposalRecord::from(proposal_event(id, vote_start, vote_start + 10, "proposal"))
    }

    #[test]
    fn test_merge_is_keyed_by_proposal_id() {
        let mut state = ScanState::new(ScanCursor::starting_at(10));

        assert_eq!(state.merge_proposals(vec![record(1, 5), record(2, 6)]), 2);
        assert_eq!(state.merge_proposals(vec![record(1, 5), record(3, 7)]), 1);
        assert_eq!(state.proposals.len(), 3);
    }

    #[tokio::test]
    async fn test_state_roundtrip_through_memory_store() {
        let store = ScanStateStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load(&GOVERNOR).await.unwrap().is_none());

        let mut state = ScanState::new(ScanCursor::starting_at(1_000));
        state.merge_proposals(vec![record(9, 900)]);
        store.save(&GOVERNOR, &state).await.unwrap();

        assert_eq!(store.load(&GOVERNOR).await.unwrap(), Some(state));
    }

    #[test]
    fn test_key_is_lowercased_per_governor() {
        assert_eq!(
            ScanStateStore::key_for(&GOVERNOR),
            "scan:0x5e4be8bc9637f0eaa1a755019e06a68ce081d58f"
        );
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(&ScanStateStore::key_for(&GOVERNOR), "{not json".to_string())
            .await
            .unwrap();
        let store = ScanStateStore::new(kv);

        let err = store.load(&GOVERNOR).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("toBlock", "123".to_string()).await.unwrap();
        store.set("other", "x".to_string()).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("toBlock").await.unwrap().as_deref(), Some("123"));
        assert_eq!(reopened.get("missing").await.unwrap(), None);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(
            FileStore::open(&path).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
