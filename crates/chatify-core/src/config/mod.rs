//! Runtime configuration for chat clients.
//!
//! Values come from the process environment (or any lookup function, which
//! keeps parsing testable without touching the real environment).

use std::env;
use std::time::Duration;

use crate::db::SyncConfig;
use crate::models::Author;
use crate::storage::R2Config;
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_USER_ID: &str = "CHATIFY_USER_ID";
const ENV_USER_NAME: &str = "CHATIFY_USER_NAME";
const ENV_TURSO_URL: &str = "TURSO_DATABASE_URL";
const ENV_TURSO_TOKEN: &str = "TURSO_AUTH_TOKEN";
const ENV_PROBE_URL: &str = "CHATIFY_PROBE_URL";
const ENV_POLL_INTERVAL_MS: &str = "CHATIFY_POLL_INTERVAL_MS";

/// Default interval between remote log polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Everything a client needs to join the conversation.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Local user sending messages.
    pub author: Author,
    /// Turso replica of the remote log; local-only when `None`.
    pub sync: Option<SyncConfig>,
    /// URL probed for reachability; connectivity follows the replica when `None`.
    pub probe_url: Option<String>,
    /// Interval between remote log polls.
    pub poll_interval: Duration,
    /// Object storage for attachments; a filesystem store is used when `None`.
    pub r2: Option<R2Config>,
}

impl ChatConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        let user_id = read(ENV_USER_ID).ok_or_else(|| {
            Error::InvalidInput(format!("{ENV_USER_ID} must be set to identify the sender"))
        })?;
        let user_name = read(ENV_USER_NAME).unwrap_or_else(|| user_id.clone());
        let author = Author::new(user_id, user_name)?;

        let sync = match (read(ENV_TURSO_URL), read(ENV_TURSO_TOKEN)) {
            (Some(url), Some(token)) => Some(SyncConfig::new(url, token)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_TURSO_TOKEN} is required when {ENV_TURSO_URL} is set"
                )));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_TURSO_URL} is required when {ENV_TURSO_TOKEN} is set"
                )));
            }
        };

        let probe_url = match read(ENV_PROBE_URL) {
            Some(url) if is_http_url(&url) => Some(url),
            Some(_) => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_PROBE_URL} must start with http:// or https://"
                )));
            }
            None => None,
        };

        let poll_interval = match read(ENV_POLL_INTERVAL_MS) {
            Some(raw) => parse_poll_interval(&raw)?,
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            author,
            sync,
            probe_url,
            poll_interval,
            r2: R2Config::from_lookup(&lookup)?,
        })
    }
}

fn parse_poll_interval(raw: &str) -> Result<Duration> {
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(Error::InvalidInput(format!(
            "{ENV_POLL_INTERVAL_MS} must be a positive number of milliseconds, got '{}'",
            compact_text(raw)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(vars: &[(&str, &str)]) -> Result<ChatConfig> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        ChatConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse(&[(ENV_USER_ID, "u1")]).unwrap();
        assert_eq!(config.author.id, "u1");
        assert_eq!(config.author.display_name, "u1");
        assert!(config.sync.is_none());
        assert!(config.probe_url.is_none());
        assert!(config.r2.is_none());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn user_id_is_required() {
        let error = parse(&[(ENV_USER_NAME, "Ada")]).unwrap_err();
        match error {
            Error::InvalidInput(message) => assert!(message.contains(ENV_USER_ID)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn turso_needs_url_and_token_together() {
        let error = parse(&[(ENV_USER_ID, "u1"), (ENV_TURSO_URL, "libsql://db.turso.io")])
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(message) if message.contains(ENV_TURSO_TOKEN)));

        let config = parse(&[
            (ENV_USER_ID, "u1"),
            (ENV_TURSO_URL, "libsql://db.turso.io"),
            (ENV_TURSO_TOKEN, "token"),
        ])
        .unwrap();
        assert!(config.sync.is_some_and(|sync| sync.is_configured()));
    }

    #[test]
    fn probe_url_must_be_http() {
        assert!(parse(&[(ENV_USER_ID, "u1"), (ENV_PROBE_URL, "example.com")]).is_err());
        let config = parse(&[(ENV_USER_ID, "u1"), (ENV_PROBE_URL, "https://example.com")]).unwrap();
        assert_eq!(config.probe_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn poll_interval_must_be_positive() {
        assert!(parse(&[(ENV_USER_ID, "u1"), (ENV_POLL_INTERVAL_MS, "0")]).is_err());
        assert!(parse(&[(ENV_USER_ID, "u1"), (ENV_POLL_INTERVAL_MS, "soon")]).is_err());
        let config = parse(&[(ENV_USER_ID, "u1"), (ENV_POLL_INTERVAL_MS, "250")]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn partial_r2_config_is_rejected() {
        let error = parse(&[(ENV_USER_ID, "u1"), ("R2_BUCKET", "media")]).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(message) if message.contains("R2_ACCOUNT_ID")));
    }
}
