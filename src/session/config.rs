//! Session configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigError;

/// Default session lifetime: 30 days.
pub const DEFAULT_LIFETIME_SECS: u64 = 2_592_000;

/// Default interval between garbage collection sweeps: 1 hour.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 3_600;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "sessid";

/// `SameSite` cookie attribute. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::Invalid(format!("unknown samesite value: {s}"))),
        }
    }
}

impl<'de> Deserialize<'de> for SameSite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

/// What the middleware does when the storage backend fails.
///
/// Applies both to loading the session before the handler runs and to
/// saving it afterwards. Failures are logged either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFailurePolicy {
    /// Continue with a fresh, empty session when loading fails. A failed save
    /// leaves the response untouched and sends no session cookie.
    #[default]
    Degrade,
    /// Answer `500 Internal Server Error` when loading or saving fails.
    Abort,
}

/// Session configuration.
///
/// Option names follow the familiar flat layout (`path`, `lifetime`,
/// `domain`, `secure`, `httponly`, `samesite`) so the struct can be built
/// straight from a loosely typed option map. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Storage root for session files.
    path: PathBuf,
    /// Session lifetime in seconds (cookie `Max-Age` and GC threshold).
    lifetime: u64,
    /// Cookie domain. `None` produces a host-only cookie.
    domain: Option<String>,
    /// Only send the cookie over HTTPS.
    secure: bool,
    /// Hide the cookie from scripts.
    #[serde(rename = "httponly", alias = "http_only")]
    http_only: bool,
    /// `SameSite` attribute.
    #[serde(rename = "samesite", alias = "same_site")]
    same_site: SameSite,
    /// Name of the session cookie.
    cookie_name: String,
    /// Seconds between GC sweeps; 0 disables collection.
    gc_interval: u64,
    /// Behaviour when loading or saving the session fails.
    on_start_failure: StartFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            lifetime: DEFAULT_LIFETIME_SECS,
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            gc_interval: DEFAULT_GC_INTERVAL_SECS,
            on_start_failure: StartFailurePolicy::Degrade,
        }
    }
}

fn default_path() -> PathBuf {
    std::env::temp_dir().join("sessions")
}

impl SessionConfig {
    /// Build a configuration from an option map merged over the defaults.
    ///
    /// ```
    /// use serde_json::json;
    /// use shard_session::session::SessionConfig;
    ///
    /// let config = SessionConfig::from_options(
    ///     json!({ "lifetime": 3600, "samesite": "Strict", "unknown": 1 })
    ///         .as_object()
    ///         .unwrap()
    ///         .clone(),
    /// )
    /// .unwrap();
    /// assert_eq!(config.lifetime_secs(), 3600);
    /// assert!(config.is_http_only());
    /// ```
    pub fn from_options<I, K>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map: Map<String, Value> = options.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let config: Self = serde_json::from_value(Value::Object(map)).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("session path must not be empty".into()));
        }
        if self.lifetime == 0 {
            return Err(ConfigError::Invalid(
                "session lifetime must be positive".into(),
            ));
        }
        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
        {
            return Err(ConfigError::Invalid(format!(
                "invalid cookie name: {:?}",
                self.cookie_name
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime)
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime
    }

    /// Cookie domain; empty when the cookie is host-only.
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or("")
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Interval between GC sweeps, or `None` when collection is disabled.
    pub fn gc_interval(&self) -> Option<Duration> {
        (self.gc_interval > 0).then(|| Duration::from_secs(self.gc_interval))
    }

    pub fn start_failure_policy(&self) -> StartFailurePolicy {
        self.on_start_failure
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_lifetime(mut self, secs: u64) -> Self {
        self.lifetime = secs;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.domain = (!domain.is_empty()).then_some(domain);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_gc_interval(mut self, secs: u64) -> Self {
        self.gc_interval = secs;
        self
    }

    pub fn with_start_failure_policy(mut self, policy: StartFailurePolicy) -> Self {
        self.on_start_failure = policy;
        self
    }
}
