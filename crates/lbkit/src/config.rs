//! API configuration.
//!
//! [`ApiConfig`] is built once, usually from the environment, and passed by
//! reference to [`ClcBackend::new`](crate::backend::clc::ClcBackend::new).
//! Nothing in this crate reads credentials from global state.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Bearer token issued by the API.
pub const ENV_TOKEN: &str = "CLC_V2_API_TOKEN";
/// Username for the login exchange.
pub const ENV_USERNAME: &str = "CLC_V2_API_USERNAME";
/// Password for the login exchange.
pub const ENV_PASSWORD: &str = "CLC_V2_API_PASSWD";
/// Override for the API base URL.
pub const ENV_ENDPOINT: &str = "CLC_V2_API_URL";
/// Per-request timeout in seconds.
pub const ENV_TIMEOUT: &str = "CLC_LB_TIMEOUT_SECS";

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.ctl.io";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bearer token used as-is.
    Token(String),
    /// Username and password exchanged for a token at startup.
    Login {
        /// API username.
        username: String,
        /// API password.
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Everything needed to reach the API.
///
/// # Example
///
/// ```
/// use lbkit::{ApiConfig, Credentials};
/// use std::time::Duration;
///
/// let config = ApiConfig::new(Credentials::Token("abc".into()))
///     .endpoint("https://api.example.com")
///     .timeout(Duration::from_secs(10));
/// assert_eq!(config.endpoint, "https://api.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API base URL.
    pub endpoint: String,
    /// Authentication.
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create a config with the default endpoint and timeout.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API base URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the config from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the config through a variable lookup function.
    ///
    /// A token wins over username/password. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let credentials = match (get(ENV_TOKEN), get(ENV_USERNAME), get(ENV_PASSWORD)) {
            (Some(token), _, _) => Credentials::Token(token),
            (None, Some(username), Some(password)) => Credentials::Login { username, password },
            _ => {
                return Err(Error::config(format!(
                    "You must set the {ENV_USERNAME} and {ENV_PASSWORD} environment variables (or {ENV_TOKEN})"
                )));
            }
        };

        let mut config = Self::new(credentials);
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(secs) = get(ENV_TIMEOUT) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| Error::invalid("timeout", secs.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_token_wins_over_login() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_TOKEN, "tok"),
            (ENV_USERNAME, "jdoe"),
            (ENV_PASSWORD, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.credentials, Credentials::Token("tok".to_string()));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_username_and_password() {
        let config =
            ApiConfig::from_lookup(lookup(&[(ENV_USERNAME, "jdoe"), (ENV_PASSWORD, "secret")])).unwrap();
        assert_eq!(
            config.credentials,
            Credentials::Login {
                username: "jdoe".to_string(),
                password: "secret".to_string()
            }
        );
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_USERNAME, "jdoe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(ENV_PASSWORD));
    }

    #[test]
    fn test_empty_token_counts_as_unset() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_TOKEN, "")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_endpoint_and_timeout_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_TOKEN, "tok"),
            (ENV_ENDPOINT, "https://api.example.com"),
            (ENV_TIMEOUT, "5"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_TOKEN, "tok"), (ENV_TIMEOUT, "soon")])).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { field: "timeout", .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = format!("{:?}", Credentials::Token("supersecret".into()));
        assert!(!token.contains("supersecret"));

        let login = format!(
            "{:?}",
            Credentials::Login {
                username: "jdoe".into(),
                password: "hunter2".into()
            }
        );
        assert!(login.contains("jdoe"));
        assert!(!login.contains("hunter2"));
    }
}
