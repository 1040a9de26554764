//! urlmeta HTTP server.
//!
//! Exposes create/read endpoints over the record lifecycle and runs the
//! deferred collection workers.

pub mod error;
pub mod handlers;
pub mod queue;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use queue::CollectionQueue;
pub use routes::create_router;
pub use state::AppState;
