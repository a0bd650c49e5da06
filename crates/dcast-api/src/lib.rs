//! Thin HTTP surface over the DiffCast pipeline: enqueue a commit, read a
//! job, list a repository's videos.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
