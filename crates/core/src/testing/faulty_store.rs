//! Store wrapper that injects failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::store::{
    CreateTorrentRequest, RecordFilter, StoreError, TorrentRecord, TorrentStatus, TorrentStore,
};

/// Delegates to a real store, failing selected calls on demand.
pub struct FaultyStore {
    inner: Arc<dyn TorrentStore>,
    upsert_failures: AtomicUsize,
    fail_next_list: AtomicBool,
    hash_write_failures: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn TorrentStore>) -> Self {
        Self {
            inner,
            upsert_failures: AtomicUsize::new(0),
            fail_next_list: AtomicBool::new(false),
            hash_write_failures: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` upsert calls.
    pub fn fail_next_upserts(&self, n: usize) {
        self.upsert_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `list_active` call.
    pub fn fail_next_list(&self) {
        self.fail_next_list.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` set_content_hash calls.
    pub fn fail_next_hash_writes(&self, n: usize) {
        self.hash_write_failures.store(n, Ordering::SeqCst);
    }

    /// Number of upsert calls seen, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

impl TorrentStore for FaultyStore {
    fn create(&self, request: CreateTorrentRequest) -> Result<TorrentRecord, StoreError> {
        self.inner.create(request)
    }

    fn get(&self, torrent_id: i64) -> Result<Option<TorrentRecord>, StoreError> {
        self.inner.get(torrent_id)
    }

    fn list_active(&self) -> Result<Vec<TorrentRecord>, StoreError> {
        if self.fail_next_list.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("injected list failure".to_string()));
        }
        self.inner.list_active()
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<TorrentRecord>, StoreError> {
        self.inner.list(filter)
    }

    fn count_by_status(&self) -> Result<HashMap<TorrentStatus, i64>, StoreError> {
        self.inner.count_by_status()
    }

    fn find_active_by_content_key(
        &self,
        content_key: &str,
    ) -> Result<Vec<TorrentRecord>, StoreError> {
        self.inner.find_active_by_content_key(content_key)
    }

    fn find_by_content_hash(&self, hash: &str) -> Result<Option<TorrentRecord>, StoreError> {
        self.inner.find_by_content_hash(hash)
    }

    fn add_requester(&self, torrent_id: i64, requester: &str) -> Result<TorrentRecord, StoreError> {
        self.inner.add_requester(torrent_id, requester)
    }

    fn set_content_hash(&self, torrent_id: i64, hash: &str) -> Result<(), StoreError> {
        if take_failure(&self.hash_write_failures) {
            return Err(StoreError::Database("injected hash write failure".to_string()));
        }
        self.inner.set_content_hash(torrent_id, hash)
    }

    fn claim_notification(&self, torrent_id: i64) -> Result<bool, StoreError> {
        self.inner.claim_notification(torrent_id)
    }

    fn upsert(&self, records: &[TorrentRecord]) -> Result<usize, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.upsert_failures) {
            return Err(StoreError::Database("injected upsert failure".to_string()));
        }
        self.inner.upsert(records)
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
