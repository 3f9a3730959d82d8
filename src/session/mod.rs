//! Session management module.
//!
//! This module provides the storage contract, the directory-sharded file
//! store, an in-memory store, identifier rules, configuration and the
//! per-request session context.

mod config;
mod context;
mod file;
mod flash;
mod handler;
mod id;
mod memory;

pub(crate) use context::Outcome;
pub(crate) use file::create_root;

pub use config::{
    SameSite, SessionConfig, StartFailurePolicy, DEFAULT_COOKIE_NAME, DEFAULT_GC_INTERVAL_SECS,
    DEFAULT_LIFETIME_SECS,
};
pub use context::{Session, SessionData};
pub use file::{ShardedFileSessionStore, FILE_PREFIX};
pub use flash::{Flash, FLASH_KEY};
pub use handler::SessionHandler;
pub use id::{is_valid_id, SessionId, MIN_ID_LEN};
pub use memory::MemorySessionStore;
