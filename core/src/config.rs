//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HatError;

pub const DEFAULT_BULLETIN_URL: &str = "https://notables.hubofallthings.com/api/bulletin/tickle";
pub const DEFAULT_DEX_URL: &str = "https://dex.hubofallthings.com";

/// Which renewed token wins when the body and a header both carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    #[default]
    PreferBody,
    PreferHeader,
}

/// Settings shared by every call made through a `HatClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme used for `{scheme}://{userDomain}` URLs.
    pub scheme: String,
    pub timeout_secs: u64,
    pub bulletin_url: String,
    pub dex_url: String,
    /// Response header that may carry a renewed token.
    pub token_header: String,
    /// Top-level body field that may carry a renewed token.
    pub token_field: String,
    pub token_policy: TokenPolicy,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            timeout_secs: 30,
            bulletin_url: DEFAULT_BULLETIN_URL.to_string(),
            dex_url: DEFAULT_DEX_URL.to_string(),
            token_header: crate::http::AUTH_TOKEN_HEADER.to_string(),
            token_field: "token".to_string(),
            token_policy: TokenPolicy::PreferBody,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `HAT_SCHEME`, `HAT_TIMEOUT_SECS`,
    /// `HAT_BULLETIN_URL` and `HAT_DEX_URL` when set.
    pub fn from_env() -> Result<Self, HatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HatError> {
        let mut config = Self::default();
        if let Some(scheme) = lookup("HAT_SCHEME") {
            config.scheme = scheme;
        }
        if let Some(timeout) = lookup("HAT_TIMEOUT_SECS") {
            config.timeout_secs = timeout.trim().parse().map_err(|_| {
                HatError::general(format!("HAT_TIMEOUT_SECS is not a number: {timeout}"), None)
            })?;
        }
        if let Some(url) = lookup("HAT_BULLETIN_URL") {
            config.bulletin_url = url;
        }
        if let Some(url) = lookup("HAT_DEX_URL") {
            config.dex_url = url;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `{scheme}://{user_domain}` without a trailing slash.
    pub fn base_url(&self, user_domain: &str) -> String {
        format!(
            "{}://{}",
            self.scheme,
            user_domain.trim_end_matches('/')
        )
    }

    pub fn dex_base(&self) -> &str {
        self.dex_url.trim_end_matches('/')
    }
}
