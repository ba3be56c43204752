//! Client configuration parsed from environment variables.
//!
//! Reading goes through a lookup closure so tests can feed a map instead of
//! mutating the process environment.

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
/// Directory name under the per-user data directory.
pub const STATE_DIR_NAME: &str = "tutordesk";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHAT_HISTORY_WINDOW: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TUTOR_API_BASE_URL '{0}' (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBaseUrl(_) => "E_CONFIG_BASE_URL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub state_dir: PathBuf,
    pub timeouts: Timeouts,
    /// Number of prior messages sent along with each chat turn.
    pub chat_history_window: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            state_dir: default_state_dir(),
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            chat_history_window: DEFAULT_CHAT_HISTORY_WINDOW,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TUTOR_API_BASE_URL`: backend origin, default `http://localhost:3000`
    /// - `TUTOR_STATE_DIR`: durable client state directory, default
    ///   `<data dir>/tutordesk` (see [`default_state_dir`])
    /// - `TUTOR_REQUEST_TIMEOUT_SECS`: default 60
    /// - `TUTOR_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TUTOR_CHAT_HISTORY_WINDOW`: default 6
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] when the base URL has no
    /// http(s) scheme.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(
            &lookup("TUTOR_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()),
        )?;
        let state_dir = lookup("TUTOR_STATE_DIR").map_or_else(default_state_dir, PathBuf::from);
        let timeouts = Timeouts {
            request_secs: parse_or(&lookup, "TUTOR_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(&lookup, "TUTOR_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let chat_history_window = parse_or(&lookup, "TUTOR_CHAT_HISTORY_WINDOW", DEFAULT_CHAT_HISTORY_WINDOW);

        Ok(Self { api_base_url, state_dir, timeouts, chat_history_window })
    }
}

/// Per-user state directory, independent of the working directory.
///
/// `$XDG_DATA_HOME/tutordesk` on Linux, `~/Library/Application Support/tutordesk`
/// on macOS, `%APPDATA%\tutordesk` on Windows. Falls back to `~/.tutordesk`,
/// and to a relative `.tutordesk` only when no home directory is known.
#[must_use]
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(STATE_DIR_NAME))
        .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{STATE_DIR_NAME}"))))
        .unwrap_or_else(|| PathBuf::from(format!(".{STATE_DIR_NAME}")))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Validate the scheme and strip trailing slashes.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for anything that is not http(s).
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
