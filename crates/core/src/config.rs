use std::time::Duration;

use url::Url;

use crate::error::{PodcastError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Synthesis is slow; generation calls get their own, longer timeout.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

pub const BASE_URL_ENV: &str = "INSIGHTCAST_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "INSIGHTCAST_API_TIMEOUT_MS";
pub const AUTH_TOKEN_ENV: &str = "INSIGHTCAST_AUTH_TOKEN";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub generation_timeout: Duration,
    pub auth_token: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            generation_timeout: GENERATION_TIMEOUT,
            auth_token: None,
        })
    }

    /// Read the configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty());
        let mut config = Self::new(base.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| PodcastError::Config(format!("{TIMEOUT_ENV}={raw} is not a number")))?;
            config.timeout = Duration::from_millis(ms);
        }

        config.auth_token = lookup(AUTH_TOKEN_ENV).filter(|t| !t.trim().is_empty());
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| PodcastError::InvalidUrl(format!("{path}: {e}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    // keep a trailing slash so joins append instead of replacing the last segment
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|e| PodcastError::InvalidUrl(format!("{trimmed}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn environment_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, "  https://api.example.com/v2  "),
            (TIMEOUT_ENV, "1500"),
            (AUTH_TOKEN_ENV, "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config.endpoint("/api/podcast/generate-audio").unwrap().as_str(),
            "https://api.example.com/v2/api/podcast/generate-audio"
        );
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = ApiConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, PodcastError::Config(_)));
    }
}
