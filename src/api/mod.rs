//! API layer for shard-session.
//!
//! A small REST surface over the caller's own session. Every `/api/v1`
//! route runs behind the session middleware, so state persists across
//! requests through the session cookie.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check (no session)
//! - `GET /api/v1` - API information
//!
//! ### Session
//! - `GET /api/v1/session` - Show session id and values
//! - `DELETE /api/v1/session` - Destroy the session
//! - `POST /api/v1/session/regenerate` - Move the session to a new id
//! - `PUT /api/v1/session/values/{key}` - Store a JSON value
//! - `DELETE /api/v1/session/values/{key}` - Remove a value
//!
//! ### Flash
//! - `POST /api/v1/flash` - Queue a flash message
//! - `GET /api/v1/flash/{kind}` - Read and consume flash messages
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shard_session::api::{serve, ServerConfig};
//! use shard_session::middleware::SessionManager;
//! use shard_session::session::SessionConfig;
//!
//! #[tokio::main]
//! async fn main() -> shard_session::Result<()> {
//!     let manager = Arc::new(SessionManager::install(SessionConfig::default())?);
//!     serve(ServerConfig::new("127.0.0.1", 3000), manager).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router, create_router_with_state, serve, ServerConfig};
pub use types::{ErrorResponse, FlashRequest, FlashResponse, SessionResponse};
