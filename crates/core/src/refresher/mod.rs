//! Torrent lifecycle refresher.
//!
//! Each cycle reconciles the torrent table with the client:
//! - **Snapshot**: active records and the client's torrent list
//! - **Dedup**: one surviving copy per title, highest resolution first
//! - **Advance**: requested → downloading → seeding → removed
//! - **Notify**: requesters hear about completed downloads

mod config;
pub mod plan;
mod runner;
mod scheduler;
mod types;

pub use config::RefresherConfig;
pub use runner::Refresher;
pub use scheduler::RefreshScheduler;
pub use types::{CycleReport, RefreshError, RefresherStatus, Transition};
