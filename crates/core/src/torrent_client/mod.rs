//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait covering the three operations
//! the refresher and the download intake need: list, add, remove.

mod transmission;
mod types;

pub use transmission::TransmissionClient;
pub use types::*;
