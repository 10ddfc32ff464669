//! SQLite-backed torrent store implementation.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::DatabaseConfig;

use super::{
    CreateTorrentRequest, RecordFilter, StoreError, TorrentRecord, TorrentStatus, TorrentStore,
};

const SELECT_COLUMNS: &str = "SELECT torrent_id, content_hash, content_key, resolution, status, requested_by, title, download_url, seeding_since, completion_notified, created_at, updated_at FROM torrents";

/// SQLite-backed torrent store.
pub struct SqliteTorrentStore {
    conn: Mutex<Connection>,
}

impl SqliteTorrentStore {
    /// Open (or create) the database file with the default busy timeout.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        Self::open(&DatabaseConfig {
            path: path.to_path_buf(),
            ..Default::default()
        })
    }

    /// Open (or create) the database described by the config.
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS torrents (
                torrent_id INTEGER PRIMARY KEY,
                content_hash TEXT,
                content_key TEXT NOT NULL,
                resolution INTEGER NOT NULL,
                status TEXT NOT NULL,
                requested_by TEXT NOT NULL,
                title TEXT,
                download_url TEXT NOT NULL,
                seeding_since TEXT,
                completion_notified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_torrents_content_key ON torrents(content_key);
            CREATE INDEX IF NOT EXISTS idx_torrents_content_hash ON torrents(content_hash);
            CREATE INDEX IF NOT EXISTS idx_torrents_status ON torrents(status);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TorrentRecord> {
        let status_str: String = row.get(4)?;
        let status = status_str
            .parse::<TorrentStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;

        let requested_json: String = row.get(5)?;
        let requested_by: BTreeSet<String> = serde_json::from_str(&requested_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        let seeding_since: Option<String> = row.get(8)?;
        let seeding_since = seeding_since
            .map(|s| parse_timestamp(&s, 8))
            .transpose()?;

        Ok(TorrentRecord {
            torrent_id: row.get(0)?,
            content_hash: row.get(1)?,
            content_key: row.get(2)?,
            resolution: row.get(3)?,
            status,
            requested_by,
            title: row.get(6)?,
            download_url: row.get(7)?,
            seeding_since,
            completion_notified: row.get(9)?,
            created_at: parse_timestamp(&row.get::<_, String>(10)?, 10)?,
            updated_at: parse_timestamp(&row.get::<_, String>(11)?, 11)?,
        })
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TorrentRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn get_with(conn: &Connection, torrent_id: i64) -> Result<Option<TorrentRecord>, StoreError> {
        let sql = format!("{} WHERE torrent_id = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![torrent_id], Self::row_to_record)
            .optional()?)
    }

    fn insert_with(conn: &Connection, record: &TorrentRecord) -> Result<(), StoreError> {
        let requested_json = serde_json::to_string(&record.requested_by)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO torrents (torrent_id, content_hash, content_key, resolution, status, requested_by, title, download_url, seeding_since, completion_notified, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.torrent_id,
                record.content_hash,
                record.content_key,
                record.resolution,
                record.status.as_str(),
                requested_json,
                record.title,
                record.download_url,
                record.seeding_since.map(|t| t.to_rfc3339()),
                record.completion_notified,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_with(conn: &Connection, record: &TorrentRecord) -> Result<(), StoreError> {
        let requested_json = serde_json::to_string(&record.requested_by)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let changed = conn.execute(
            "UPDATE torrents SET content_hash = ?, content_key = ?, resolution = ?, status = ?, requested_by = ?, title = ?, download_url = ?, seeding_since = ?, completion_notified = ?, updated_at = ? WHERE torrent_id = ?",
            params![
                record.content_hash,
                record.content_key,
                record.resolution,
                record.status.as_str(),
                requested_json,
                record.title,
                record.download_url,
                record.seeding_since.map(|t| t.to_rfc3339()),
                record.completion_notified,
                record.updated_at.to_rfc3339(),
                record.torrent_id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(record.torrent_id));
        }
        Ok(())
    }
}

fn parse_timestamp(s: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fold an incoming record into the stored one without losing concurrent writes.
///
/// Returns `None` when the merge would not change anything.
fn merge_record(existing: &TorrentRecord, incoming: &TorrentRecord) -> Option<TorrentRecord> {
    let status = if existing.status.can_transition_to(incoming.status) {
        incoming.status
    } else {
        existing.status
    };

    let mut requested_by = existing.requested_by.clone();
    requested_by.extend(incoming.requested_by.iter().cloned());

    let merged = TorrentRecord {
        torrent_id: existing.torrent_id,
        content_hash: incoming
            .content_hash
            .clone()
            .or_else(|| existing.content_hash.clone()),
        content_key: incoming.content_key.clone(),
        resolution: incoming.resolution,
        status,
        requested_by,
        title: incoming.title.clone().or_else(|| existing.title.clone()),
        download_url: incoming.download_url.clone(),
        seeding_since: existing.seeding_since.or(incoming.seeding_since),
        completion_notified: existing.completion_notified || incoming.completion_notified,
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };

    if merged == *existing {
        None
    } else {
        Some(TorrentRecord {
            updated_at: Utc::now(),
            ..merged
        })
    }
}

impl TorrentStore for SqliteTorrentStore {
    fn create(&self, request: CreateTorrentRequest) -> Result<TorrentRecord, StoreError> {
        let conn = self.lock()?;

        if Self::get_with(&conn, request.torrent_id)?.is_some() {
            return Err(StoreError::AlreadyExists(request.torrent_id));
        }

        let now = Utc::now();
        let record = TorrentRecord {
            torrent_id: request.torrent_id,
            content_hash: None,
            content_key: request.content_key,
            resolution: request.resolution,
            status: TorrentStatus::Requested,
            requested_by: BTreeSet::from([request.requested_by]),
            title: request.title,
            download_url: request.download_url,
            seeding_since: None,
            completion_notified: false,
            created_at: now,
            updated_at: now,
        };

        Self::insert_with(&conn, &record)?;
        Ok(record)
    }

    fn get(&self, torrent_id: i64) -> Result<Option<TorrentRecord>, StoreError> {
        let conn = self.lock()?;
        Self::get_with(&conn, torrent_id)
    }

    fn list_active(&self) -> Result<Vec<TorrentRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE status != ? ORDER BY torrent_id ASC", SELECT_COLUMNS);
        Self::query_records(&conn, &sql, &[&TorrentStatus::Removed.as_str()])
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<TorrentRecord>, StoreError> {
        let conn = self.lock()?;

        match filter.status {
            Some(status) => {
                let sql = format!(
                    "{} WHERE status = ? ORDER BY created_at DESC, torrent_id DESC LIMIT ? OFFSET ?",
                    SELECT_COLUMNS
                );
                Self::query_records(
                    &conn,
                    &sql,
                    &[&status.as_str(), &filter.limit, &filter.offset],
                )
            }
            None => {
                let sql = format!(
                    "{} ORDER BY created_at DESC, torrent_id DESC LIMIT ? OFFSET ?",
                    SELECT_COLUMNS
                );
                Self::query_records(&conn, &sql, &[&filter.limit, &filter.offset])
            }
        }
    }

    fn count_by_status(&self) -> Result<HashMap<TorrentStatus, i64>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM torrents GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            let status = status.parse::<TorrentStatus>().map_err(StoreError::Database)?;
            counts.insert(status, count);
        }
        Ok(counts)
    }

    fn find_active_by_content_key(
        &self,
        content_key: &str,
    ) -> Result<Vec<TorrentRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "{} WHERE content_key = ? AND status != ? ORDER BY torrent_id ASC",
            SELECT_COLUMNS
        );
        Self::query_records(
            &conn,
            &sql,
            &[&content_key, &TorrentStatus::Removed.as_str()],
        )
    }

    fn find_by_content_hash(&self, hash: &str) -> Result<Option<TorrentRecord>, StoreError> {
        let conn = self.lock()?;
        // Prefer the live record if the same payload was ever tracked twice.
        let sql = format!(
            "{} WHERE content_hash = ? ORDER BY (status = 'removed') ASC, torrent_id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![hash.to_lowercase()], Self::row_to_record)
            .optional()?)
    }

    fn add_requester(&self, torrent_id: i64, requester: &str) -> Result<TorrentRecord, StoreError> {
        let conn = self.lock()?;
        let mut record =
            Self::get_with(&conn, torrent_id)?.ok_or(StoreError::NotFound(torrent_id))?;

        if record.requested_by.insert(requester.to_string()) {
            record.updated_at = Utc::now();
            Self::update_with(&conn, &record)?;
        }
        Ok(record)
    }

    fn set_content_hash(&self, torrent_id: i64, hash: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE torrents SET content_hash = ?, updated_at = ? WHERE torrent_id = ?",
            params![hash.to_lowercase(), Utc::now().to_rfc3339(), torrent_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(torrent_id));
        }
        Ok(())
    }

    fn claim_notification(&self, torrent_id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE torrents SET completion_notified = 1, updated_at = ? WHERE torrent_id = ? AND completion_notified = 0",
            params![Utc::now().to_rfc3339(), torrent_id],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        if Self::get_with(&conn, torrent_id)?.is_none() {
            return Err(StoreError::NotFound(torrent_id));
        }
        Ok(false)
    }

    fn upsert(&self, records: &[TorrentRecord]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut written = 0;
        for record in records {
            match Self::get_with(&tx, record.torrent_id)? {
                Some(existing) => {
                    if let Some(merged) = merge_record(&existing, record) {
                        Self::update_with(&tx, &merged)?;
                        written += 1;
                    }
                }
                None => {
                    Self::insert_with(&tx, record)?;
                    written += 1;
                }
            }
        }

        // Dropping the transaction on any error above rolls the batch back.
        tx.commit()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTorrentStore {
        SqliteTorrentStore::in_memory().unwrap()
    }

    fn create_request(torrent_id: i64, content_key: &str, resolution: u32) -> CreateTorrentRequest {
        CreateTorrentRequest {
            torrent_id,
            content_key: content_key.to_string(),
            resolution,
            download_url: format!("magnet:?xt=urn:btih:{:040x}", torrent_id),
            title: Some(format!("Pulp Fiction {}p", resolution)),
            requested_by: "telegram:42".to_string(),
        }
    }

    #[test]
    fn test_create_record() {
        let store = create_test_store();
        let record = store.create(create_request(1, "tt0110912", 1080)).unwrap();

        assert_eq!(record.torrent_id, 1);
        assert_eq!(record.status, TorrentStatus::Requested);
        assert!(record.content_hash.is_none());
        assert!(record.requested_by.contains("telegram:42"));
        assert!(!record.completion_notified);
    }

    #[test]
    fn test_create_duplicate_id_fails() {
        let store = create_test_store();
        store.create(create_request(1, "tt0110912", 1080)).unwrap();
        let result = store.create(create_request(1, "tt0110912", 1080));
        assert!(matches!(result, Err(StoreError::AlreadyExists(1))));
    }

    #[test]
    fn test_get_round_trip() {
        let store = create_test_store();
        let created = store.create(create_request(7, "tt0113277", 720)).unwrap();
        let fetched = store.get(7).unwrap().unwrap();

        assert_eq!(fetched.torrent_id, created.torrent_id);
        assert_eq!(fetched.content_key, "tt0113277");
        assert_eq!(fetched.resolution, 720);
        assert_eq!(fetched.requested_by, created.requested_by);
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn test_list_active_excludes_removed() {
        let store = create_test_store();
        store.create(create_request(1, "tt1", 1080)).unwrap();
        let mut gone = store.create(create_request(2, "tt2", 1080)).unwrap();
        gone.status = TorrentStatus::Removed;
        store.upsert(&[gone]).unwrap();

        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].torrent_id, 1);
    }

    #[test]
    fn test_find_active_by_content_key() {
        let store = create_test_store();
        store.create(create_request(1, "tt0110912", 720)).unwrap();
        store.create(create_request(2, "tt0110912", 1080)).unwrap();
        store.create(create_request(3, "tt0113277", 1080)).unwrap();

        let mut removed = store.get(1).unwrap().unwrap();
        removed.status = TorrentStatus::Removed;
        store.upsert(&[removed]).unwrap();

        let found = store.find_active_by_content_key("tt0110912").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].torrent_id, 2);
    }

    #[test]
    fn test_find_by_content_hash_is_case_insensitive() {
        let store = create_test_store();
        store.create(create_request(1, "tt1", 1080)).unwrap();
        store.set_content_hash(1, "ABCDEF").unwrap();

        let found = store.find_by_content_hash("abcdef").unwrap().unwrap();
        assert_eq!(found.torrent_id, 1);
        assert_eq!(found.content_hash.as_deref(), Some("abcdef"));
        assert!(store.find_by_content_hash("0000").unwrap().is_none());
    }

    #[test]
    fn test_add_requester() {
        let store = create_test_store();
        store.create(create_request(1, "tt1", 1080)).unwrap();

        let record = store.add_requester(1, "telegram:7").unwrap();
        assert_eq!(record.requested_by.len(), 2);

        // Adding the same requester again is a no-op.
        let record = store.add_requester(1, "telegram:7").unwrap();
        assert_eq!(record.requested_by.len(), 2);

        assert!(matches!(
            store.add_requester(99, "telegram:7"),
            Err(StoreError::NotFound(99))
        ));
    }

    #[test]
    fn test_upsert_inserts_new_record() {
        let store = create_test_store();
        let now = Utc::now();
        let record = TorrentRecord {
            torrent_id: 5,
            content_hash: Some("aa".to_string()),
            content_key: "tt5".to_string(),
            resolution: 2160,
            status: TorrentStatus::Downloading,
            requested_by: BTreeSet::from(["telegram:1".to_string()]),
            title: None,
            download_url: "magnet:?xt=urn:btih:aa".to_string(),
            seeding_since: None,
            completion_notified: false,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(store.upsert(&[record]).unwrap(), 1);
        assert_eq!(
            store.get(5).unwrap().unwrap().status,
            TorrentStatus::Downloading
        );
    }

    #[test]
    fn test_upsert_never_moves_status_backward() {
        let store = create_test_store();
        let mut record = store.create(create_request(1, "tt1", 1080)).unwrap();
        record.status = TorrentStatus::Removed;
        store.upsert(&[record.clone()]).unwrap();

        record.status = TorrentStatus::Seeding;
        assert_eq!(store.upsert(&[record]).unwrap(), 0);
        assert_eq!(store.get(1).unwrap().unwrap().status, TorrentStatus::Removed);
    }

    #[test]
    fn test_upsert_keeps_concurrently_added_requesters() {
        let store = create_test_store();
        let mut stale = store.create(create_request(1, "tt1", 1080)).unwrap();

        // A user joins the request after the stale copy was read.
        store.add_requester(1, "telegram:99").unwrap();

        stale.status = TorrentStatus::Downloading;
        store.upsert(&[stale]).unwrap();

        let stored = store.get(1).unwrap().unwrap();
        assert_eq!(stored.status, TorrentStatus::Downloading);
        assert!(stored.requested_by.contains("telegram:99"));
        assert!(stored.requested_by.contains("telegram:42"));
    }

    #[test]
    fn test_upsert_keeps_notified_flag_and_hash() {
        let store = create_test_store();
        let stale = store.create(create_request(1, "tt1", 1080)).unwrap();
        store.set_content_hash(1, "beef").unwrap();
        assert!(store.claim_notification(1).unwrap());

        store.upsert(&[stale]).unwrap();

        let stored = store.get(1).unwrap().unwrap();
        assert!(stored.completion_notified);
        assert_eq!(stored.content_hash.as_deref(), Some("beef"));
    }

    #[test]
    fn test_upsert_unchanged_record_writes_nothing() {
        let store = create_test_store();
        let record = store.create(create_request(1, "tt1", 1080)).unwrap();
        let before = store.get(1).unwrap().unwrap();

        assert_eq!(store.upsert(&[record]).unwrap(), 0);
        assert_eq!(store.get(1).unwrap().unwrap().updated_at, before.updated_at);
    }

    #[test]
    fn test_upsert_batch_is_atomic() {
        let store = create_test_store();
        let mut good = store.create(create_request(1, "tt1", 1080)).unwrap();
        good.status = TorrentStatus::Downloading;

        // A row with an unparseable status makes the second write fail.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO torrents (torrent_id, content_key, resolution, status, requested_by, download_url, created_at, updated_at) VALUES (2, 'tt2', 720, 'bogus', '[]', 'x', ?, ?)",
                params![Utc::now().to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .unwrap();
        }
        let mut bad = good.clone();
        bad.torrent_id = 2;

        let result = store.upsert(&[good, bad]);
        assert!(result.is_err());
        // The first record's update was rolled back with the batch.
        assert_eq!(
            store.get(1).unwrap().unwrap().status,
            TorrentStatus::Requested
        );
    }

    #[test]
    fn test_claim_notification_only_once() {
        let store = create_test_store();
        store.create(create_request(1, "tt1", 1080)).unwrap();

        assert!(store.claim_notification(1).unwrap());
        assert!(!store.claim_notification(1).unwrap());
        assert!(store.get(1).unwrap().unwrap().completion_notified);
        assert!(matches!(
            store.claim_notification(2),
            Err(StoreError::NotFound(2))
        ));
    }

    #[test]
    fn test_list_with_status_filter() {
        let store = create_test_store();
        store.create(create_request(1, "tt1", 1080)).unwrap();
        let mut seeding = store.create(create_request(2, "tt2", 1080)).unwrap();
        seeding.status = TorrentStatus::Seeding;
        store.upsert(&[seeding]).unwrap();

        let all = store.list(&RecordFilter::new()).unwrap();
        assert_eq!(all.len(), 2);

        let only_seeding = store
            .list(&RecordFilter::new().with_status(TorrentStatus::Seeding))
            .unwrap();
        assert_eq!(only_seeding.len(), 1);
        assert_eq!(only_seeding[0].torrent_id, 2);

        let paged = store.list(&RecordFilter::new().with_limit(1)).unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[test]
    fn test_count_by_status() {
        let store = create_test_store();
        assert!(store.count_by_status().unwrap().is_empty());

        store.create(create_request(1, "tt1", 1080)).unwrap();
        store.create(create_request(2, "tt2", 720)).unwrap();
        let mut seeding = store.create(create_request(3, "tt3", 1080)).unwrap();
        seeding.status = TorrentStatus::Seeding;
        store.upsert(&[seeding]).unwrap();

        let counts = store.count_by_status().unwrap();
        assert_eq!(counts.get(&TorrentStatus::Requested), Some(&2));
        assert_eq!(counts.get(&TorrentStatus::Seeding), Some(&1));
        assert_eq!(counts.get(&TorrentStatus::Removed), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seedkeeper.db");

        {
            let store = SqliteTorrentStore::new(&path).unwrap();
            store.create(create_request(1, "tt1", 1080)).unwrap();
        }

        let store = SqliteTorrentStore::new(&path).unwrap();
        assert!(store.get(1).unwrap().is_some());
    }
}
