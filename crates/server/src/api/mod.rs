pub mod downloads;
pub mod handlers;
pub mod middleware;
pub mod refresh;
pub mod routes;
pub mod torrents;

pub use routes::create_router;
