//! # shard-session
//!
//! File-backed HTTP session storage for axum.
//!
//! Session state is stored per visitor as one file, in directories sharded
//! by the first two characters of the session identifier:
//!
//! ```text
//! <root>/<id[0]>/<id[1]>/sess_<id>
//! ```
//!
//! ## Features
//!
//! - **Sharded file store**: bounded directory fan-out, lazy shard creation,
//!   whole-record replacement, no index to maintain
//! - **Pluggable backends**: anything implementing [`SessionHandler`]
//! - **Explicit session context**: handlers receive a [`Session`] value, no
//!   global state
//! - **Middleware**: cookie handling, expiry and garbage collection
//!
//! ## Quick Start
//!
//! ```no_run
//! use shard_session::{SessionHandler, ShardedFileSessionStore};
//!
//! fn main() -> shard_session::Result<()> {
//!     let store = ShardedFileSessionStore::new("/tmp/sessions");
//!
//!     store.write("ab12-xy", b"{\"user\":42}")?;
//!     assert_eq!(store.read("ab12-xy")?, b"{\"user\":42}");
//!
//!     // Never-written identifiers read as empty.
//!     assert!(store.read("cd34")?.is_empty());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod session;

// Re-export commonly used types
pub use error::{Result, ShardSessionError};
pub use middleware::{session_middleware, SessionManager};
pub use session::{
    Flash, MemorySessionStore, SameSite, Session, SessionConfig, SessionData, SessionHandler,
    SessionId, ShardedFileSessionStore, StartFailurePolicy,
};
