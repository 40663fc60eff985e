//! In-memory job status store

use crate::StoreError;
use scrivener_domain::{JobId, JobRecord, JobStore};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Job records held in memory
///
/// Records are keyed by their UUIDv7 id, so iteration order is submission
/// order.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<BTreeMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    type Error = StoreError;

    fn insert(&self, record: JobRecord) -> Result<(), Self::Error> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        records.insert(record.id, record);
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<JobRecord>, Self::Error> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&id).cloned())
    }

    fn update<F>(&self, id: JobId, update: F) -> Result<Option<JobRecord>, Self::Error>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get_mut(&id).map(|record| {
            update(record);
            record.clone()
        }))
    }

    fn list(&self) -> Result<Vec<JobRecord>, Self::Error> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::JobStatus;

    #[test]
    fn test_insert_and_get() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store.insert(JobRecord::queued(id)).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert!(store.get(JobId::new()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store.insert(JobRecord::queued(id)).unwrap();
        assert!(matches!(
            store.insert(JobRecord::queued(id)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn test_update_returns_new_copy() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store.insert(JobRecord::queued(id)).unwrap();

        let updated = store
            .update(id, |record| {
                record.status = JobStatus::Processing;
                record.progress = 12;
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(store.get(id).unwrap().unwrap().progress, 12);

        assert!(store.update(JobId::new(), |_| {}).unwrap().is_none());
    }

    #[test]
    fn test_list_in_submission_order() {
        let store = MemoryJobStore::new();
        let first = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = JobId::new();
        store.insert(JobRecord::queued(second)).unwrap();
        store.insert(JobRecord::queued(first)).unwrap();

        let ids: Vec<JobId> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
