//! Per-request session context.
//!
//! A [`Session`] is created by the middleware for every request and handed to
//! handlers through request extensions. There is no process-wide "current
//! session": whatever a handler touches is the value it was given.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::id::SessionId;

/// Key/value state of one session.
///
/// Encoded as a JSON object; the storage layer only sees the bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData(BTreeMap<String, Value>);

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored payload.
    ///
    /// An empty payload is an empty session. A payload that is not a JSON
    /// object is discarded with a warning rather than failing the request.
    pub fn decode(payload: &[u8]) -> Self {
        if payload.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice(payload) {
            Ok(map) => Self(map),
            Err(e) => {
                tracing::warn!(error = %e, bytes = payload.len(), "discarding undecodable session payload");
                Self::default()
            }
        }
    }

    /// Encode for storage.
    pub fn encode(&self) -> Vec<u8> {
        // A map of `Value`s with string keys always serializes.
        serde_json::to_vec(&self.0).unwrap_or_else(|_| b"{}".to_vec())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// View as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[derive(Debug)]
struct Inner {
    id: SessionId,
    previous_id: Option<SessionId>,
    data: SessionData,
    is_new: bool,
    modified: bool,
    destroyed: bool,
}

/// What the middleware must persist once the handler is done.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outcome {
    pub id: SessionId,
    pub previous_id: Option<SessionId>,
    pub payload: Vec<u8>,
    pub is_new: bool,
    pub modified: bool,
    pub destroyed: bool,
}

/// Handle to the current request's session.
///
/// Clones share the same state, so a handler and the middleware observe each
/// other's changes.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    /// Start a brand-new session.
    pub fn new(id: SessionId) -> Self {
        Self::build(id, SessionData::default(), true)
    }

    /// Resume a session loaded from storage.
    pub fn resume(id: SessionId, data: SessionData) -> Self {
        Self::build(id, data, false)
    }

    fn build(id: SessionId, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id,
                previous_id: None,
                data,
                is_new,
                modified: false,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> SessionId {
        self.lock().id.clone()
    }

    /// Get a typed value. Returns `None` if absent or of a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.lock();
        inner
            .data
            .get_value(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().data.get_value(key).cloned()
    }

    /// Store a value under `key`.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        inner.data.insert_value(key, value);
        inner.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().data.contains(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().data.keys().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Remove every value but keep the session alive.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if !inner.data.is_empty() {
            inner.data.clear();
            inner.modified = true;
        }
    }

    /// Snapshot of all values as a JSON object.
    pub fn to_json(&self) -> Value {
        self.lock().data.to_json()
    }

    /// Mutate the data in place. The session is marked modified.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut inner = self.lock();
        inner.modified = true;
        f(&mut inner.data)
    }

    /// End the session: its record is removed and the cookie expired.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.data.clear();
        inner.destroyed = true;
    }

    /// Move the session to a fresh identifier, keeping its data.
    ///
    /// The record under the old identifier is removed when the response is
    /// flushed. Returns the new identifier.
    pub fn regenerate(&self) -> SessionId {
        let mut inner = self.lock();
        let new_id = SessionId::generate();
        let old_id = std::mem::replace(&mut inner.id, new_id.clone());
        // Regenerating twice still removes the record that was loaded.
        if inner.previous_id.is_none() && !inner.is_new {
            inner.previous_id = Some(old_id);
        }
        inner.modified = true;
        new_id
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub(crate) fn outcome(&self) -> Outcome {
        let inner = self.lock();
        Outcome {
            id: inner.id.clone(),
            previous_id: inner.previous_id.clone(),
            payload: inner.data.encode(),
            is_new: inner.is_new,
            modified: inner.modified,
            destroyed: inner.destroyed,
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session middleware is not installed",
        ))
    }
}
