//! Client configuration, read once from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Auth endpoints, relative to the API base URL.
pub mod endpoints {
    pub const LOGIN: &str = "/auth/login";
    pub const SIGNUP: &str = "/auth/signup";
    pub const REFRESH: &str = "/auth/refresh";
    pub const ME: &str = "/auth/me";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Platform API base URL, e.g. `http://localhost:8000/api/v1`.
    pub api_base_url: String,

    /// JSON store location; `None` resolves to the OS data directory.
    pub storage_path: Option<PathBuf>,

    /// Delay before the single retry of the post-login profile fetch.
    pub profile_retry_delay: Duration,

    /// Per-request timeout enforced by the transport.
    pub request_timeout: Duration,

    /// Unauthenticated entry point.
    pub login_path: String,

    /// Application home.
    pub home_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            storage_path: None,
            profile_retry_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}

impl ClientConfig {
    /// Build from `FINDESK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("FINDESK_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::info!("FINDESK_API_URL not set; using {}", defaults.api_base_url);
                defaults.api_base_url.clone()
            });

        let storage_path = lookup("FINDESK_STORAGE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let profile_retry_delay = parse_or(
            &lookup,
            "FINDESK_PROFILE_RETRY_MS",
            defaults.profile_retry_delay.as_millis() as u64,
        );
        let request_timeout = parse_or(
            &lookup,
            "FINDESK_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        );

        Self {
            api_base_url,
            storage_path,
            profile_retry_delay: Duration::from_millis(profile_retry_delay),
            request_timeout: Duration::from_secs(request_timeout),
            login_path: lookup("FINDESK_LOGIN_PATH").unwrap_or(defaults.login_path),
            home_path: lookup("FINDESK_HOME_PATH").unwrap_or(defaults.home_path),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + core::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{name}={raw:?} is not valid; using default {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(ClientConfig::from_lookup(|_| None), ClientConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FINDESK_API_URL", "https://fin.example.com/api/v1"),
            ("FINDESK_STORAGE_PATH", "/tmp/findesk.json"),
            ("FINDESK_PROFILE_RETRY_MS", "50"),
            ("FINDESK_REQUEST_TIMEOUT_SECS", "5"),
            ("FINDESK_LOGIN_PATH", "/signin"),
        ]));
        assert_eq!(config.api_base_url, "https://fin.example.com/api/v1");
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/findesk.json")));
        assert_eq!(config.profile_retry_delay, Duration::from_millis(50));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.login_path, "/signin");
        assert_eq!(config.home_path, "/");
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FINDESK_PROFILE_RETRY_MS", "soon"),
            ("FINDESK_REQUEST_TIMEOUT_SECS", "-3"),
        ]));
        assert_eq!(config.profile_retry_delay, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
