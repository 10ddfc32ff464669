//! One reconciliation cycle: snapshot, dedup, re-snapshot, advance, notify.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::metrics;
use crate::notifier::{deliver, Notification, Notifier};
use crate::store::{TorrentRecord, TorrentStatus, TorrentStore};
use crate::torrent_client::{TorrentClient, TorrentInfo};

use super::plan::{self, Action, DedupGroup};
use super::{CycleReport, RefreshError, RefresherConfig, RefresherStatus, Transition};

/// Reconciles the torrent table with the client's live state.
///
/// At most one cycle runs at a time; a second caller gets
/// [`RefreshError::AlreadyRunning`] instead of waiting.
pub struct Refresher {
    config: RefresherConfig,
    store: Arc<dyn TorrentStore>,
    client: Arc<dyn TorrentClient>,
    notifier: Arc<dyn Notifier>,
    run_lock: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
    last_error: RwLock<Option<String>>,
    last_run_at: RwLock<Option<chrono::DateTime<Utc>>>,
}

/// Messages queued during a cycle, sent once their writes landed.
struct PendingNotification {
    torrent_id: i64,
    requesters: Vec<String>,
    notification: Notification,
    /// Completion messages are guarded by the record's notified flag.
    claim: bool,
}

impl Refresher {
    pub fn new(
        config: RefresherConfig,
        store: Arc<dyn TorrentStore>,
        client: Arc<dyn TorrentClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            client,
            notifier,
            run_lock: Mutex::new(()),
            last_report: RwLock::new(None),
            last_error: RwLock::new(None),
            last_run_at: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RefresherConfig {
        &self.config
    }

    /// Run one cycle bounded by the configured timeout, recording its outcome.
    pub async fn run_once(&self) -> Result<CycleReport, RefreshError> {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.cycle_timeout_secs);

        let result = match tokio::time::timeout(timeout, self.run_cycle()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    timeout_secs = self.config.cycle_timeout_secs,
                    "Refresh cycle overran its timeout and was abandoned"
                );
                Err(RefreshError::TimedOut(self.config.cycle_timeout_secs))
            }
        };

        let label = match &result {
            Ok(_) => "completed",
            Err(e) => e.result_label(),
        };
        metrics::REFRESH_CYCLES.with_label_values(&[label]).inc();

        if matches!(result, Err(RefreshError::AlreadyRunning)) {
            return result;
        }

        metrics::REFRESH_CYCLE_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        *self.last_run_at.write().await = Some(Utc::now());

        match &result {
            Ok(report) => {
                *self.last_report.write().await = Some(report.clone());
                *self.last_error.write().await = None;
            }
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
            }
        }

        result
    }

    /// Current state for the API.
    pub async fn status(&self) -> RefresherStatus {
        RefresherStatus {
            scheduled: false,
            interval_secs: self.config.interval_secs,
            cycle_in_progress: self.run_lock.try_lock().is_err(),
            last_report: self.last_report.read().await.clone(),
            last_error: self.last_error.read().await.clone(),
            last_run_at: *self.last_run_at.read().await,
        }
    }

    /// Run one cycle without a timeout.
    pub async fn run_cycle(&self) -> Result<CycleReport, RefreshError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| RefreshError::AlreadyRunning)?;

        let cycle_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("refresh_cycle", cycle_id = %cycle_id);

        self.cycle(cycle_id).instrument(span).await
    }

    async fn cycle(&self, cycle_id: String) -> Result<CycleReport, RefreshError> {
        let started = Instant::now();
        let mut report = CycleReport {
            cycle_id,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        // 1. Snapshot both sides. Either failing ends the cycle before any mutation.
        let mut records = self.store.list_active().map_err(|e| {
            error!(error = %e, "Failed to read active records, aborting cycle");
            e
        })?;
        let torrents = self.client.list_torrents().await.map_err(|e| {
            error!(client = self.client.name(), error = %e, "Failed to list torrents, aborting cycle");
            e
        })?;
        report.records_seen = records.len();
        report.client_torrents = torrents.len();
        debug!(
            records = records.len(),
            torrents = torrents.len(),
            "Snapshot taken"
        );

        // 2-3. Join and remove lower-resolution duplicates.
        let mut pending = Vec::new();
        let losers = {
            let live = plan::index_by_hash(&torrents);
            let groups = plan::plan_dedup(&records, &live);
            self.apply_dedup(&groups, &mut records, &mut report, &mut pending)
                .await?
        };

        // 4. Re-snapshot the client; the working set is the first store
        //    snapshot minus the records retired above.
        let torrents = self.client.list_torrents().await.map_err(|e| {
            error!(client = self.client.name(), error = %e, "Failed to re-list torrents, aborting cycle");
            e
        })?;
        let live = plan::index_by_hash(&torrents);
        records.retain(|r| !losers.contains(&r.torrent_id));

        // 5-6. Advance, expire and retire vanished records.
        self.apply_advance(&records, &live, &mut report, &mut pending)
            .await?;

        // 7. Notify for writes that landed.
        self.send_notifications(pending, &mut report).await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            duplicates_removed = report.duplicates_removed,
            transitions = report.transitions.len(),
            expired = report.expired,
            vanished = report.vanished,
            notifications_sent = report.notifications_sent,
            notifications_failed = report.notifications_failed,
            failed_batches = report.failed_batches,
            duration_ms = report.duration_ms,
            "Refresh cycle completed"
        );

        Ok(report)
    }

    /// Remove every loser from the client, then retire it in the store.
    ///
    /// Returns the ids of retired records. A client failure aborts the cycle.
    async fn apply_dedup(
        &self,
        groups: &[DedupGroup],
        records: &mut [TorrentRecord],
        report: &mut CycleReport,
        pending: &mut Vec<PendingNotification>,
    ) -> Result<HashSet<i64>, RefreshError> {
        let mut retired = HashSet::new();

        for group in groups {
            let mut batch = Vec::with_capacity(group.losers.len() + 1);
            let mut survivor = group.survivor.clone();

            for loser in &group.losers {
                // Two records can point at the same client torrent; never delete the survivor's.
                let shares_payload = loser.content_hash == survivor.content_hash;
                if let Some(hash) = loser.content_hash.as_deref().filter(|_| !shares_payload) {
                    self.client.remove_torrent(hash, true).await.map_err(|e| {
                        error!(
                            torrent_id = loser.torrent_id,
                            hash = %hash,
                            error = %e,
                            "Failed to remove duplicate, aborting cycle"
                        );
                        e
                    })?;
                }

                info!(
                    content_key = %group.content_key,
                    removed = loser.torrent_id,
                    removed_resolution = loser.resolution,
                    kept = survivor.torrent_id,
                    kept_resolution = survivor.resolution,
                    "Removed duplicate torrent"
                );

                survivor
                    .requested_by
                    .extend(loser.requested_by.iter().cloned());
                batch.push(TorrentRecord {
                    status: TorrentStatus::Removed,
                    updated_at: Utc::now(),
                    ..loser.clone()
                });
            }

            if survivor.requested_by != group.survivor.requested_by {
                batch.push(survivor.clone());
            }

            let Some(written) = self.upsert_with_retry(&batch, report) else {
                continue;
            };
            report.records_written += written;

            for loser in &group.losers {
                retired.insert(loser.torrent_id);
                report.duplicates_removed += 1;
                metrics::DUPLICATES_REMOVED.inc();
                record_transition(report, loser.torrent_id, loser.status, TorrentStatus::Removed);
                pending.push(PendingNotification {
                    torrent_id: loser.torrent_id,
                    requesters: loser.requested_by.iter().cloned().collect(),
                    notification: Notification::DuplicateReplaced {
                        title: loser.display_name(),
                        kept_resolution: survivor.resolution,
                    },
                    claim: false,
                });
            }

            // Later steps must see the inherited requesters.
            if let Some(working) = records
                .iter_mut()
                .find(|r| r.torrent_id == survivor.torrent_id)
            {
                working.requested_by = survivor.requested_by.clone();
            }
        }

        Ok(retired)
    }

    async fn apply_advance(
        &self,
        records: &[TorrentRecord],
        live: &HashMap<String, &TorrentInfo>,
        report: &mut CycleReport,
        pending: &mut Vec<PendingNotification>,
    ) -> Result<(), RefreshError> {
        let now = Utc::now();
        // One store batch per title, so a bad row only holds back its own title.
        let mut groups: BTreeMap<&str, AdvanceBatch<'_>> = BTreeMap::new();

        for (record, torrent) in plan::join(records, live) {
            let action = plan::plan_advance(record, torrent, now, &self.config);
            let next = match action {
                Action::Keep => continue,
                Action::StartDownloading => TorrentStatus::Downloading,
                Action::StartSeeding { .. } => TorrentStatus::Seeding,
                Action::Expire | Action::Vanish => TorrentStatus::Removed,
            };

            if let (Action::Expire, Some(hash)) = (&action, record.content_hash.as_deref()) {
                self.client.remove_torrent(hash, true).await.map_err(|e| {
                    error!(
                        torrent_id = record.torrent_id,
                        hash = %hash,
                        error = %e,
                        "Failed to remove expired torrent, aborting cycle"
                    );
                    e
                })?;
                info!(torrent_id = record.torrent_id, "Retention elapsed, torrent removed");
            }
            if action == Action::Vanish {
                warn!(
                    torrent_id = record.torrent_id,
                    status = %record.status,
                    "Torrent no longer in client, retiring record"
                );
            }

            let mut updated = TorrentRecord {
                status: next,
                updated_at: now,
                ..record.clone()
            };
            let group = groups.entry(record.content_key.as_str()).or_default();
            if let Action::StartSeeding { seeding_since } = action {
                updated.seeding_since = Some(seeding_since);
                if !record.completion_notified {
                    group.completions.push(record);
                }
            }

            group.batch.push(updated);
            group.changes.push((record.torrent_id, record.status, next, action));
        }

        for (_, group) in groups {
            let Some(written) = self.upsert_with_retry(&group.batch, report) else {
                continue;
            };
            report.records_written += written;

            for (torrent_id, from, to, action) in group.changes {
                record_transition(report, torrent_id, from, to);
                match action {
                    Action::Expire => report.expired += 1,
                    Action::Vanish => report.vanished += 1,
                    _ => {}
                }
            }

            for record in group.completions {
                pending.push(PendingNotification {
                    torrent_id: record.torrent_id,
                    requesters: record.requested_by.iter().cloned().collect(),
                    notification: Notification::DownloadFinished {
                        title: record.display_name(),
                    },
                    claim: true,
                });
            }
        }

        Ok(())
    }

    async fn send_notifications(&self, pending: Vec<PendingNotification>, report: &mut CycleReport) {
        for item in pending {
            if item.claim {
                match self.store.claim_notification(item.torrent_id) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(torrent_id = item.torrent_id, "Requesters already notified");
                        continue;
                    }
                    Err(e) => {
                        warn!(
                            torrent_id = item.torrent_id,
                            error = %e,
                            "Could not flag record as notified, skipping notification"
                        );
                        continue;
                    }
                }
            }

            for requester in &item.requesters {
                if deliver(self.notifier.as_ref(), requester, &item.notification).await {
                    report.notifications_sent += 1;
                } else {
                    report.notifications_failed += 1;
                }
            }
        }
    }

    /// Upsert a batch, retrying once. `None` means the batch was dropped.
    fn upsert_with_retry(&self, batch: &[TorrentRecord], report: &mut CycleReport) -> Option<usize> {
        match self.store.upsert(batch) {
            Ok(written) => return Some(written),
            Err(e) => warn!(records = batch.len(), error = %e, "Batch upsert failed, retrying"),
        }

        match self.store.upsert(batch) {
            Ok(written) => Some(written),
            Err(e) => {
                error!(
                    records = batch.len(),
                    ids = ?batch.iter().map(|r| r.torrent_id).collect::<Vec<_>>(),
                    error = %e,
                    "Batch upsert failed after retry, skipping batch"
                );
                report.failed_batches += 1;
                metrics::UPSERT_FAILURES.inc();
                None
            }
        }
    }
}

/// Advance writes for one title.
#[derive(Default)]
struct AdvanceBatch<'a> {
    batch: Vec<TorrentRecord>,
    changes: Vec<(i64, TorrentStatus, TorrentStatus, Action)>,
    completions: Vec<&'a TorrentRecord>,
}

fn record_transition(report: &mut CycleReport, torrent_id: i64, from: TorrentStatus, to: TorrentStatus) {
    metrics::STATUS_TRANSITIONS
        .with_label_values(&[to.as_str()])
        .inc();
    report.transitions.push(Transition {
        torrent_id,
        from,
        to,
    });
}
