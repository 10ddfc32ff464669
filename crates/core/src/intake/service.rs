//! Download requests and completion callbacks.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::metrics;
use crate::notifier::{deliver, Notification, Notifier};
use crate::store::{CreateTorrentRequest, StoreError, TorrentRecord, TorrentStatus, TorrentStore};
use crate::torrent_client::{AddTorrentResult, TorrentClient};

use super::{parse_resolution, DownloadRequest, FinishedTorrent, RequestError, RequestOutcome};

/// Entry point for new downloads and push-style completion signals.
pub struct IntakeService {
    store: Arc<dyn TorrentStore>,
    client: Arc<dyn TorrentClient>,
    notifier: Arc<dyn Notifier>,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn TorrentStore>,
        client: Arc<dyn TorrentClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            client,
            notifier,
        }
    }

    /// Start tracking a torrent for a user, or add the user to an existing one.
    ///
    /// The client is asked to add a torrent at most once per id.
    pub async fn request_download(
        &self,
        request: DownloadRequest,
    ) -> Result<RequestOutcome, RequestError> {
        let result = self.handle_request(request).await;

        let outcome = match &result {
            Ok(RequestOutcome::Created(_)) => "created",
            Ok(RequestOutcome::AlreadyTracked(_)) => "already_tracked",
            Err(RequestError::InvalidRequest(_)) | Err(RequestError::Retired(_)) => "rejected",
            Err(_) => "failed",
        };
        metrics::DOWNLOAD_REQUESTS
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn handle_request(
        &self,
        request: DownloadRequest,
    ) -> Result<RequestOutcome, RequestError> {
        validate(&request)?;

        let resolution = request
            .resolution
            .or_else(|| request.title.as_deref().and_then(parse_resolution))
            .ok_or_else(|| {
                RequestError::InvalidRequest(
                    "resolution missing and not found in title".to_string(),
                )
            })?;

        if let Some(existing) = self.store.get(request.torrent_id)? {
            return self.join_existing(existing, &request.requester_id).await;
        }

        let created = self.store.create(CreateTorrentRequest {
            torrent_id: request.torrent_id,
            content_key: request.content_key.clone(),
            resolution,
            download_url: request.download_url.clone(),
            title: request.title.clone(),
            requested_by: request.requester_id.clone(),
        });
        let mut record = match created {
            Ok(record) => record,
            // Lost a race with a concurrent request for the same id.
            Err(StoreError::AlreadyExists(id)) => {
                let existing = self.store.get(id)?.ok_or(StoreError::NotFound(id))?;
                return self.join_existing(existing, &request.requester_id).await;
            }
            Err(e) => return Err(e.into()),
        };

        match self.client.add_torrent(&record.download_url).await {
            Ok(added) => {
                if let Err(e) = self.store_hash(record.torrent_id, &added.hash) {
                    self.undo_add(record, &added).await;
                    return Err(e.into());
                }
                record.content_hash = Some(added.hash.to_lowercase());
                info!(
                    torrent_id = record.torrent_id,
                    hash = %added.hash,
                    content_key = %record.content_key,
                    resolution = record.resolution,
                    duplicate = added.duplicate,
                    "Torrent handed to client"
                );

                let notification = Notification::DownloadQueued {
                    title: record.display_name(),
                };
                deliver(self.notifier.as_ref(), &request.requester_id, &notification).await;

                Ok(RequestOutcome::Created(record))
            }
            Err(e) => {
                error!(
                    torrent_id = record.torrent_id,
                    client = self.client.name(),
                    error = %e,
                    "Client refused torrent, retiring record"
                );
                let retired = TorrentRecord {
                    status: TorrentStatus::Removed,
                    updated_at: chrono::Utc::now(),
                    ..record
                };
                if let Err(store_err) = self.store.upsert(&[retired]) {
                    error!(error = %store_err, "Failed to retire record after client error");
                }
                Err(e.into())
            }
        }
    }

    /// Write the client hash, retrying once. Without it the record can never
    /// be matched against the client again.
    fn store_hash(&self, torrent_id: i64, hash: &str) -> Result<(), StoreError> {
        match self.store.set_content_hash(torrent_id, hash) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(torrent_id, error = %e, "Failed to store content hash, retrying");
                self.store.set_content_hash(torrent_id, hash)
            }
        }
    }

    /// Take back a torrent the store could not link, then retire the record.
    async fn undo_add(&self, record: TorrentRecord, added: &AddTorrentResult) {
        error!(
            torrent_id = record.torrent_id,
            hash = %added.hash,
            "Content hash not stored, withdrawing torrent from client"
        );
        // A duplicate add handed back a payload someone else already owns.
        if !added.duplicate {
            if let Err(e) = self.client.remove_torrent(&added.hash, true).await {
                error!(hash = %added.hash, error = %e, "Failed to withdraw unlinked torrent");
            }
        }
        let retired = TorrentRecord {
            status: TorrentStatus::Removed,
            updated_at: chrono::Utc::now(),
            ..record
        };
        if let Err(e) = self.store.upsert(&[retired]) {
            error!(error = %e, "Failed to retire unlinked record");
        }
    }

    async fn join_existing(
        &self,
        existing: TorrentRecord,
        requester: &str,
    ) -> Result<RequestOutcome, RequestError> {
        if existing.status == TorrentStatus::Removed {
            return Err(RequestError::Retired(existing.torrent_id));
        }

        let newly_added = !existing.requested_by.contains(requester);
        let record = self.store.add_requester(existing.torrent_id, requester)?;

        if newly_added {
            info!(
                torrent_id = record.torrent_id,
                requester = %requester,
                "Requester joined tracked torrent"
            );
            // Someone joining after completion would otherwise never hear about it.
            let notification = if record.status == TorrentStatus::Seeding && record.completion_notified {
                Notification::DownloadFinished {
                    title: record.display_name(),
                }
            } else {
                Notification::DownloadQueued {
                    title: record.display_name(),
                }
            };
            deliver(self.notifier.as_ref(), requester, &notification).await;
        }

        Ok(RequestOutcome::AlreadyTracked(record))
    }

    /// Tell every requester that a torrent finished.
    ///
    /// Returns the number of notifications delivered. Unknown hashes and
    /// already notified records are not errors.
    pub async fn handle_finished(&self, finished: FinishedTorrent) -> Result<usize, RequestError> {
        if finished.content_hash.trim().is_empty() {
            return Err(RequestError::InvalidRequest(
                "content_hash is required".to_string(),
            ));
        }

        let Some(record) = self.store.find_by_content_hash(&finished.content_hash)? else {
            warn!(hash = %finished.content_hash, "Finished callback for unknown torrent");
            return Ok(0);
        };

        if record.status == TorrentStatus::Removed {
            warn!(
                torrent_id = record.torrent_id,
                "Finished callback for a retired torrent, ignoring"
            );
            return Ok(0);
        }

        if !self.store.claim_notification(record.torrent_id)? {
            info!(torrent_id = record.torrent_id, "Requesters already notified");
            return Ok(0);
        }

        let title = finished
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| record.display_name());
        let notification = Notification::DownloadFinished { title };

        let mut sent = 0;
        for requester in &record.requested_by {
            if deliver(self.notifier.as_ref(), requester, &notification).await {
                sent += 1;
            }
        }

        info!(
            torrent_id = record.torrent_id,
            requesters = record.requested_by.len(),
            sent,
            "Completion notifications sent"
        );
        Ok(sent)
    }
}

fn validate(request: &DownloadRequest) -> Result<(), RequestError> {
    if request.torrent_id <= 0 {
        return Err(RequestError::InvalidRequest(
            "torrent_id must be positive".to_string(),
        ));
    }
    if request.download_url.trim().is_empty() {
        return Err(RequestError::InvalidRequest(
            "download_url is required".to_string(),
        ));
    }
    if request.content_key.trim().is_empty() {
        return Err(RequestError::InvalidRequest(
            "content_key is required".to_string(),
        ));
    }
    if request.requester_id.trim().is_empty() {
        return Err(RequestError::InvalidRequest(
            "requester_id is required".to_string(),
        ));
    }
    Ok(())
}
