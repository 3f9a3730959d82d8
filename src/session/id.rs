//! Session identifier type.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ShardSessionError;

/// Minimum identifier length. The first two characters name the shard
/// directories, so anything shorter cannot be placed on disk.
pub const MIN_ID_LEN: usize = 2;

/// Check whether `id` is an acceptable session identifier.
///
/// Accepts strings of at least [`MIN_ID_LEN`] characters drawn from
/// `[A-Za-z0-9,-]`. Pure; performs no I/O.
pub fn is_valid_id(id: &str) -> bool {
    id.len() >= MIN_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b',' || b == b'-')
}

/// Validated session identifier.
///
/// Identifiers are opaque tokens supplied by the client cookie or generated
/// here. Construction always validates, so any `SessionId` can be mapped to a
/// shard path without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate and wrap an identifier.
    pub fn parse(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if is_valid_id(&id) {
            Ok(Self(id))
        } else {
            Err(ShardSessionError::InvalidIdentifier(id))
        }
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two shard path components: first and second character.
    pub fn shard_prefix(&self) -> (&str, &str) {
        // ASCII-only by construction, so byte offsets are char boundaries.
        (&self.0[0..1], &self.0[1..2])
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = ShardSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
