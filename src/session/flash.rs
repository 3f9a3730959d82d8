//! Flash messages: values that survive exactly until they are read.

use std::collections::BTreeMap;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use super::context::Session;

/// Session key holding pending flash messages.
pub const FLASH_KEY: &str = "_flash";

type Messages = BTreeMap<String, Vec<String>>;

/// Flash message view over a [`Session`].
#[derive(Debug, Clone)]
pub struct Flash {
    session: Session,
}

impl Flash {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn messages(&self) -> Messages {
        self.session.get::<Messages>(FLASH_KEY).unwrap_or_default()
    }

    fn store(&self, messages: &Messages) {
        if messages.is_empty() {
            self.session.remove(FLASH_KEY);
        } else if let Err(e) = self.session.insert(FLASH_KEY, messages) {
            tracing::warn!(error = %e, "failed to store flash messages");
        }
    }

    /// Queue a message under `kind` (e.g. `"success"`, `"error"`).
    pub fn set(&self, kind: impl Into<String>, message: impl Into<String>) {
        let mut messages = self.messages();
        messages.entry(kind.into()).or_default().push(message.into());
        self.store(&messages);
    }

    /// Read and consume the messages queued under `kind`.
    pub fn take(&self, kind: &str) -> Vec<String> {
        let mut messages = self.messages();
        match messages.remove(kind) {
            Some(taken) => {
                self.store(&messages);
                taken
            }
            None => Vec::new(),
        }
    }

    /// Read the messages under `kind` without consuming them.
    pub fn peek(&self, kind: &str) -> Vec<String> {
        self.messages().remove(kind).unwrap_or_default()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.messages().get(kind).is_some_and(|m| !m.is_empty())
    }

    /// Kinds that currently hold messages.
    pub fn kinds(&self) -> Vec<String> {
        self.messages().into_keys().collect()
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Session::from_request_parts(parts, state).await.map(Flash::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionData, SessionId};

    fn flash() -> (Session, Flash) {
        let session = Session::resume(SessionId::parse("fl-1").unwrap(), SessionData::new());
        (session.clone(), Flash::new(session))
    }

    #[test]
    fn test_take_consumes() {
        let (session, flash) = flash();
        flash.set("success", "saved");
        flash.set("success", "and published");

        assert!(flash.has("success"));
        assert_eq!(flash.take("success"), vec!["saved", "and published"]);
        assert!(!flash.has("success"));
        assert!(flash.take("success").is_empty());
        // The reserved key disappears once empty.
        assert!(!session.contains(FLASH_KEY));
    }

    #[test]
    fn test_peek_keeps() {
        let (_session, flash) = flash();
        flash.set("error", "bad input");
        assert_eq!(flash.peek("error"), vec!["bad input"]);
        assert_eq!(flash.peek("error"), vec!["bad input"]);
        assert_eq!(flash.kinds(), vec!["error"]);
    }

    #[test]
    fn test_take_missing_does_not_modify() {
        let (session, flash) = flash();
        assert!(flash.take("nothing").is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_kinds_are_independent() {
        let (_session, flash) = flash();
        flash.set("info", "a");
        flash.set("error", "b");
        assert_eq!(flash.take("info"), vec!["a"]);
        assert!(flash.has("error"));
    }
}
