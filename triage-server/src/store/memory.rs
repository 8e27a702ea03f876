//! In-memory content store with fault injection

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{ContentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Exists,
    Copy,
    Delete,
    List,
    Get,
}

#[derive(Debug)]
struct Fault {
    op: StoreOp,
    /// Only keys containing this substring fail
    path_filter: Option<String>,
    error: StoreError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
struct OpCounters {
    copies: u64,
    deletes: u64,
    lists: u64,
}

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    location: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    faults: Mutex<Vec<Fault>>,
    counters: Mutex<OpCounters>,
}

impl MemoryContentStore {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn put(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.write().insert(path.to_string(), bytes.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().contains_key(path)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Make `op` fail with `error` on keys containing `path_filter`,
    /// `times` times (or forever)
    pub fn fail(&self, op: StoreOp, path_filter: Option<&str>, error: StoreError, times: Option<u32>) {
        self.faults.lock().push(Fault {
            op,
            path_filter: path_filter.map(str::to_owned),
            error,
            remaining: times,
        });
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Successful copies so far
    pub fn copy_count(&self) -> u64 {
        self.counters.lock().copies
    }

    /// Successful deletes so far
    pub fn delete_count(&self) -> u64 {
        self.counters.lock().deletes
    }

    /// Successful listings so far
    pub fn list_count(&self) -> u64 {
        self.counters.lock().lists
    }

    fn check_fault(&self, op: StoreOp, path: &str) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        let hit = faults.iter_mut().position(|f| {
            f.op == op
                && f.remaining != Some(0)
                && f.path_filter.as_deref().is_none_or(|p| path.contains(p))
        });
        let Some(idx) = hit else {
            return Ok(());
        };
        let fault = &mut faults[idx];
        if let Some(n) = fault.remaining.as_mut() {
            *n -= 1;
        }
        Err(fault.error.clone())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn location(&self) -> &str {
        &self.location
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.check_fault(StoreOp::Exists, path)?;
        Ok(self.contains(path))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        self.check_fault(StoreOp::Copy, from)?;
        let mut objects = self.objects.write();
        let bytes = objects.get(from).cloned().ok_or_else(|| StoreError::NotFound {
            path: from.to_string(),
        })?;
        objects.insert(to.to_string(), bytes);
        self.counters.lock().copies += 1;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.check_fault(StoreOp::Delete, path)?;
        self.objects.write().remove(path);
        self.counters.lock().deletes += 1;
        Ok(())
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError> {
        self.check_fault(StoreOp::List, folder)?;
        let folder = folder.trim_end_matches('/');
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };
        let keys = self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
            .cloned()
            .collect();
        self.counters.lock().lists += 1;
        Ok(keys)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.check_fault(StoreOp::Get, path)?;
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_and_list() {
        let store = MemoryContentStore::new("bucket");
        store.put("new/a.jpg", b"a".to_vec());
        store.put("new/sub/b.jpg", b"b".to_vec());

        store.copy("new/a.jpg", "approved/a.jpg").await.unwrap();
        assert!(store.contains("approved/a.jpg"));
        assert_eq!(store.list("new").await.unwrap(), vec!["new/a.jpg"]);
        assert_eq!(store.copy_count(), 1);
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let store = MemoryContentStore::new("bucket");
        let err = store.copy("new/x.jpg", "approved/x.jpg").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fault_injection_counts_down() {
        let store = MemoryContentStore::new("bucket");
        store.put("new/a.jpg", b"a".to_vec());
        store.fail(
            StoreOp::Copy,
            Some("a.jpg"),
            StoreError::Throttled("slow down".into()),
            Some(1),
        );

        assert!(store.copy("new/a.jpg", "x/a.jpg").await.is_err());
        assert!(store.copy("new/a.jpg", "x/a.jpg").await.is_ok());
    }
}
