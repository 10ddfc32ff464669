//! Download intake: user requests in, completion callbacks out.

mod resolution;
mod service;
mod types;

pub use resolution::parse_resolution;
pub use service::IntakeService;
pub use types::{DownloadRequest, FinishedTorrent, RequestError, RequestOutcome};
