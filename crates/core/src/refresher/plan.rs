//! Pure decision logic of a refresh cycle.
//!
//! Nothing here talks to the store or the client; the runner feeds snapshots
//! in and carries the resulting actions out.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::store::{TorrentRecord, TorrentStatus};
use crate::torrent_client::TorrentInfo;

use super::RefresherConfig;

/// Index a client snapshot by (lowercase) info hash.
pub fn index_by_hash(torrents: &[TorrentInfo]) -> HashMap<String, &TorrentInfo> {
    torrents
        .iter()
        .map(|t| (t.hash.to_lowercase(), t))
        .collect()
}

/// The live torrent a record maps to, if the client still has it.
pub fn live_for<'a>(
    record: &TorrentRecord,
    live: &HashMap<String, &'a TorrentInfo>,
) -> Option<&'a TorrentInfo> {
    record
        .content_hash
        .as_ref()
        .and_then(|hash| live.get(&hash.to_lowercase()).copied())
}

/// Records paired with their live torrent.
pub fn join<'a>(
    records: &'a [TorrentRecord],
    live: &HashMap<String, &'a TorrentInfo>,
) -> Vec<(&'a TorrentRecord, Option<&'a TorrentInfo>)> {
    records.iter().map(|r| (r, live_for(r, live))).collect()
}

/// Copies of one title that must be reduced to a single survivor.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupGroup {
    pub content_key: String,
    pub survivor: TorrentRecord,
    pub losers: Vec<TorrentRecord>,
}

/// Group live, matched records by title and pick the survivor of each group.
///
/// Only records whose torrent the client reports as downloading or finished
/// take part. The survivor has the highest resolution; on a tie the lowest
/// `torrent_id` wins.
pub fn plan_dedup(
    records: &[TorrentRecord],
    live: &HashMap<String, &TorrentInfo>,
) -> Vec<DedupGroup> {
    let mut groups: BTreeMap<&str, Vec<&TorrentRecord>> = BTreeMap::new();

    for record in records.iter().filter(|r| r.status.is_active()) {
        let eligible = live_for(record, live)
            .map(|t| t.is_downloading() || t.is_finished())
            .unwrap_or(false);
        if eligible {
            groups.entry(&record.content_key).or_default().push(record);
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|(content_key, members)| {
            let survivor = *members.iter().max_by(|a, b| {
                a.resolution
                    .cmp(&b.resolution)
                    .then_with(|| b.torrent_id.cmp(&a.torrent_id))
            })?;

            let mut losers: Vec<TorrentRecord> = members
                .iter()
                .filter(|r| r.torrent_id != survivor.torrent_id)
                .map(|r| (*r).clone())
                .collect();
            losers.sort_by_key(|r| r.torrent_id);

            Some(DedupGroup {
                content_key: content_key.to_string(),
                survivor: survivor.clone(),
                losers,
            })
        })
        .collect()
}

/// What to do with one record after dedup.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Nothing changed; no write.
    Keep,
    /// The client is fetching it.
    StartDownloading,
    /// The payload is complete.
    StartSeeding { seeding_since: DateTime<Utc> },
    /// Retention elapsed: remove from the client, then retire.
    Expire,
    /// The client no longer knows this torrent.
    Vanish,
}

/// Decide the next step for a record given its live torrent.
pub fn plan_advance(
    record: &TorrentRecord,
    live: Option<&TorrentInfo>,
    now: DateTime<Utc>,
    config: &RefresherConfig,
) -> Action {
    if !record.status.is_active() {
        return Action::Keep;
    }

    let Some(torrent) = live else {
        let waiting_on_add = record.content_hash.is_none()
            && record.status == TorrentStatus::Requested
            && now - record.created_at < config.request_grace();
        return if waiting_on_add {
            Action::Keep
        } else {
            Action::Vanish
        };
    };

    let finished = torrent.is_finished();
    if finished || record.status == TorrentStatus::Seeding {
        // Client completion time first; records that lost it keep their own.
        let anchor = torrent.completed_at.or(record.seeding_since);
        if anchor.is_some_and(|at| now - at >= config.retention()) {
            return Action::Expire;
        }
        if finished && record.status < TorrentStatus::Seeding {
            return Action::StartSeeding {
                seeding_since: torrent.completed_at.unwrap_or(now),
            };
        }
        return Action::Keep;
    }

    if record.status == TorrentStatus::Requested && torrent.is_downloading() {
        Action::StartDownloading
    } else {
        Action::Keep
    }
}
