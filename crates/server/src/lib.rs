//! HTTP relay in front of the seedkeeper core: download intake, completion
//! callbacks, record inspection and on-demand refresh cycles.

pub mod api;
pub mod metrics;
pub mod state;
