//! Persistent table of requested torrents.

mod sqlite_store;
mod traits;
mod types;

pub use sqlite_store::SqliteTorrentStore;
pub use traits::{StoreError, TorrentStore};
pub use types::{CreateTorrentRequest, RecordFilter, TorrentRecord, TorrentStatus};
