//! Session middleware for axum.
//!
//! [`SessionManager`] owns the storage backend and the cookie settings.
//! [`session_middleware`] loads the session before the inner service runs,
//! exposes it as a [`Session`] request extension, and flushes it afterwards.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{middleware, routing::get, Router};
//! use shard_session::middleware::{session_middleware, SessionManager};
//! use shard_session::session::{Session, SessionConfig};
//!
//! async fn visits(session: Session) -> String {
//!     let n = session.get::<u64>("visits").unwrap_or(0) + 1;
//!     session.insert("visits", n).ok();
//!     n.to_string()
//! }
//!
//! # fn main() -> shard_session::Result<()> {
//! let manager = Arc::new(SessionManager::install(SessionConfig::default())?);
//! let app: Router = Router::new()
//!     .route("/", get(visits))
//!     .layer(middleware::from_fn_with_state(manager, session_middleware));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::Cookie;

use crate::error::ShardSessionError;
use crate::session::{
    create_root, is_valid_id, Session, SessionConfig, SessionData, SessionHandler, SessionId,
    ShardedFileSessionStore, StartFailurePolicy,
};
use crate::Result;

/// Owns the session backend and applies the session lifecycle to requests.
pub struct SessionManager {
    handler: Arc<dyn SessionHandler>,
    config: SessionConfig,
    last_gc: RwLock<Instant>,
}

impl SessionManager {
    /// Build a manager backed by a [`ShardedFileSessionStore`].
    ///
    /// The configuration is validated first. The configured path is made
    /// absolute when possible and created if missing.
    pub fn install(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let root = resolve_root(config.path());
        create_root(&root)?;

        let store = ShardedFileSessionStore::new(&root);
        tracing::info!(root = %store.root().display(), "file session store installed");

        Self::with_handler(config, Arc::new(store))
    }

    /// Build a manager around any storage backend.
    ///
    /// Fails if the configuration does not validate.
    pub fn with_handler(config: SessionConfig, handler: Arc<dyn SessionHandler>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handler,
            config,
            last_gc: RwLock::new(Instant::now()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// Run a storage call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn SessionHandler) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handler = Arc::clone(&self.handler);
        tokio::task::spawn_blocking(move || f(handler.as_ref()))
            .await
            .map_err(|e| ShardSessionError::Task(e.to_string()))?
    }

    /// Load the session named by the request cookie, or start a new one.
    ///
    /// Unknown or malformed identifiers never get adopted: the client receives
    /// a freshly generated identifier instead.
    pub async fn start(&self, cookie_value: Option<&str>) -> Result<Session> {
        let id = match cookie_value {
            Some(value) if is_valid_id(value) => SessionId::parse(value)?,
            Some(value) => {
                tracing::debug!(len = value.len(), "ignoring malformed session cookie");
                return Ok(Session::new(SessionId::generate()));
            }
            None => return Ok(Session::new(SessionId::generate())),
        };

        let key = id.clone();
        let payload = self.blocking(move |h| h.read(key.as_str())).await?;

        if payload.is_empty() {
            tracing::debug!(session_id = %id, "no stored session, starting fresh");
            return Ok(Session::new(SessionId::generate()));
        }

        Ok(Session::resume(id, SessionData::decode(&payload)))
    }

    /// Persist the session after the handler ran.
    ///
    /// Returns the cookie to send back, if the client's cookie must change.
    pub async fn finish(&self, session: &Session) -> Result<Option<Cookie<'static>>> {
        let outcome = session.outcome();

        if outcome.destroyed {
            let ids: Vec<SessionId> = std::iter::once(outcome.id)
                .chain(outcome.previous_id)
                .collect();
            self.blocking(move |h| ids.iter().try_for_each(|id| h.destroy(id.as_str())))
                .await?;
            tracing::debug!("session destroyed");
            return Ok((!outcome.is_new).then(|| self.removal_cookie()));
        }

        // Untouched new sessions are not persisted, so anonymous traffic does
        // not create files. Resumed sessions are always written back, which
        // also refreshes their age for garbage collection.
        if outcome.is_new && !outcome.modified {
            return Ok(None);
        }

        let id = outcome.id.clone();
        let previous = outcome.previous_id.clone();
        let payload = outcome.payload;
        self.blocking(move |h| {
            h.write(id.as_str(), &payload)?;
            match previous {
                Some(previous) => h.destroy(previous.as_str()),
                None => Ok(()),
            }
        })
        .await?;

        if outcome.is_new || outcome.previous_id.is_some() {
            Ok(Some(self.session_cookie(&outcome.id)))
        } else {
            Ok(None)
        }
    }

    /// Cookie carrying `id` with the configured attributes.
    pub fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        let max_age = i64::try_from(self.config.lifetime_secs()).unwrap_or(i64::MAX);
        let mut builder = Cookie::build((self.config.cookie_name().to_owned(), id.to_string()))
            .path("/")
            .max_age(cookie::time::Duration::seconds(max_age))
            .secure(self.config.is_secure())
            .http_only(self.config.is_http_only())
            .same_site(self.config.same_site().into());

        if !self.config.domain().is_empty() {
            builder = builder.domain(self.config.domain().to_owned());
        }
        builder.build()
    }

    /// Cookie instructing the client to drop its session cookie.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.session_cookie(&SessionId::generate());
        cookie.make_removal();
        cookie
    }

    /// Sweep expired sessions in the background if the interval elapsed.
    fn maybe_gc(&self) {
        let Some(interval) = self.config.gc_interval() else {
            return;
        };

        let due = self
            .last_gc
            .read()
            .map(|t| t.elapsed() >= interval)
            .unwrap_or(false);
        if !due {
            return;
        }

        let Ok(mut last) = self.last_gc.write() else {
            return;
        };
        // Double-check after acquiring the lock.
        if last.elapsed() < interval {
            return;
        }
        *last = Instant::now();
        drop(last);

        let handler = Arc::clone(&self.handler);
        let max_lifetime = self.config.lifetime();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = handler.gc(max_lifetime) {
                tracing::warn!(error = %e, "session garbage collection failed");
            }
        });
    }
}

/// Make `path` absolute: canonical if it exists, otherwise joined onto the
/// current directory.
fn resolve_root(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path);
        }
    }
    path.to_path_buf()
}

/// Extract the value of cookie `name` from the request headers.
pub fn session_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|c| c.ok())
        .find(|c| c.name() == name)
        .map(|c| c.value().to_owned())
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
    }
}

/// Session middleware for axum.
///
/// Install with `axum::middleware::from_fn_with_state(manager, session_middleware)`.
pub async fn session_middleware(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    manager.maybe_gc();

    let policy = manager.config().start_failure_policy();
    let cookie_value = session_cookie_value(request.headers(), manager.config().cookie_name());

    let session = match manager.start(cookie_value.as_deref()).await {
        Ok(session) => session,
        Err(e) => match policy {
            StartFailurePolicy::Degrade => {
                tracing::error!(error = %e, "failed to start session, continuing with a fresh one");
                Session::new(SessionId::generate())
            }
            StartFailurePolicy::Abort => {
                tracing::error!(error = %e, "failed to start session");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    match manager.finish(&session).await {
        Ok(Some(cookie)) => append_cookie(&mut response, &cookie),
        Ok(None) => {}
        Err(e) => {
            // The update is lost; never pretend otherwise.
            tracing::error!(error = %e, session_id = %session.id(), "failed to save session");
            if policy == StartFailurePolicy::Abort {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    response
}
