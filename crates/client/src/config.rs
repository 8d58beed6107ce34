use std::path::PathBuf;
use std::time::Duration;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a service running locally.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL including the API path segment
    /// (default: `http://127.0.0.1:8000/api`).
    pub api_base: String,
    /// Deadline for ordinary requests (default: 30s).
    pub request_timeout: Duration,
    /// Deadline for establishing a connection (default: 10s).
    pub connect_timeout: Duration,
    /// Deadline for uploads and regenerating toggles, which render media
    /// before responding (default: 600s).
    pub upload_timeout: Duration,
    /// File holding the persisted video session
    /// (default: `video-detect-cache.json`).
    pub session_file: PathBuf,
    /// First delay between status polls (default: 1000ms).
    pub poll_interval: Duration,
    /// Give up tracking a video after this long (default: 3600s).
    pub track_deadline: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8000/api".into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(600),
            session_file: PathBuf::from("video-detect-cache.json"),
            poll_interval: Duration::from_millis(1000),
            track_deadline: Duration::from_secs(3600),
        }
    }
}

/// A configuration variable was set to something unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                     |
    /// |----------------------------------|-----------------------------|
    /// | `TRACKLENS_API_BASE`             | `http://127.0.0.1:8000/api` |
    /// | `TRACKLENS_REQUEST_TIMEOUT_SECS` | `30`                        |
    /// | `TRACKLENS_CONNECT_TIMEOUT_SECS` | `10`                        |
    /// | `TRACKLENS_UPLOAD_TIMEOUT_SECS`  | `600`                       |
    /// | `TRACKLENS_SESSION_FILE`         | `video-detect-cache.json`   |
    /// | `TRACKLENS_POLL_INTERVAL_MS`     | `1000`                      |
    /// | `TRACKLENS_TRACK_DEADLINE_SECS`  | `3600`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base = lookup("TRACKLENS_API_BASE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_base);

        let session_file = lookup("TRACKLENS_SESSION_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        Ok(Self {
            api_base,
            request_timeout: secs(&lookup, "TRACKLENS_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout),
            connect_timeout: secs(&lookup, "TRACKLENS_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(defaults.connect_timeout),
            upload_timeout: secs(&lookup, "TRACKLENS_UPLOAD_TIMEOUT_SECS")?
                .unwrap_or(defaults.upload_timeout),
            session_file,
            poll_interval: parse_u64(&lookup, "TRACKLENS_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            track_deadline: secs(&lookup, "TRACKLENS_TRACK_DEADLINE_SECS")?
                .unwrap_or(defaults.track_deadline),
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or(ConfigError::Invalid {
                var,
                value: raw,
                expected: "a positive integer",
            }),
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_u64(lookup, var)?.map(Duration::from_secs))
}
