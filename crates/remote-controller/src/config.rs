//! Remote controller configuration.
//!
//! Configuration is loaded from environment variables. Each of the two
//! parties names a frame whose node API is reached at `<NAME>_FRAME_API`.
//! Access client secrets are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default name of the first party.
pub const DEFAULT_PARTY_A: &str = "adam";

/// Default name of the second party.
pub const DEFAULT_PARTY_B: &str = "steve";

/// Default timeout for read-only node requests.
pub const DEFAULT_NODE_READ_TIMEOUT_SECONDS: u64 = 5;

/// Default timeout for state-changing node requests.
pub const DEFAULT_NODE_WRITE_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for either node timeout.
pub const MAX_NODE_TIMEOUT_SECONDS: u64 = 120;

/// Slack added to the longest node leg chain when bounding a request.
pub const REQUEST_TIMEOUT_MARGIN_SECONDS: u64 = 5;

/// Credentials sent to an access proxy in front of a node.
#[derive(Clone)]
pub struct AccessCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// One side of the call.
#[derive(Debug, Clone)]
pub struct PartyConfig {
    /// Lower-case party name used in URLs, e.g. `adam`.
    pub name: String,

    /// Base URL of the party's node API, including `/api`.
    pub frame_api: String,

    /// Present only when both the client id and secret are configured.
    pub access: Option<AccessCredentials>,
}

/// Remote controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8090").
    pub bind_address: String,

    pub party_a: PartyConfig,

    pub party_b: PartyConfig,

    /// Timeout for `GET` requests to nodes (default: 5s).
    pub node_read_timeout: Duration,

    /// Timeout for state-changing requests to nodes (default: 10s).
    pub node_write_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid party configuration: {0}")]
    InvalidParty(String),

    #[error("Invalid node timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let name_a = party_name(vars, "PARTY_A", DEFAULT_PARTY_A)?;
        let name_b = party_name(vars, "PARTY_B", DEFAULT_PARTY_B)?;
        if name_a == name_b {
            return Err(ConfigError::InvalidParty(format!(
                "PARTY_A and PARTY_B must differ, both are '{}'",
                name_a
            )));
        }

        let party_a = party_config(vars, name_a)?;
        let party_b = party_config(vars, name_b)?;

        let node_read_timeout = timeout_seconds(
            vars,
            "NODE_READ_TIMEOUT_SECONDS",
            DEFAULT_NODE_READ_TIMEOUT_SECONDS,
        )?;
        let node_write_timeout = timeout_seconds(
            vars,
            "NODE_WRITE_TIMEOUT_SECONDS",
            DEFAULT_NODE_WRITE_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            bind_address,
            party_a,
            party_b,
            node_read_timeout,
            node_write_timeout,
        })
    }

    /// Both parties, in configuration order.
    pub fn parties(&self) -> [&PartyConfig; 2] {
        [&self.party_a, &self.party_b]
    }

    /// Upper bound for one API request.
    ///
    /// Covers the longest sequential leg chain: `decline` is a write followed
    /// by a write, `end` is two state reads followed by concurrent writes.
    pub fn request_timeout(&self) -> Duration {
        let read = self.node_read_timeout;
        let write = self.node_write_timeout;
        read + write + read.max(write) + Duration::from_secs(REQUEST_TIMEOUT_MARGIN_SECONDS)
    }

    /// Whether every party has access credentials.
    pub fn access_tokens_configured(&self) -> bool {
        self.parties().iter().all(|party| party.access.is_some())
    }
}

fn party_name(
    vars: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let name = vars
        .get(key)
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| default.to_string());

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ConfigError::InvalidParty(format!(
            "{} must be a non-empty name of letters, digits, '-' or '_', got '{}'",
            key, name
        )));
    }

    Ok(name)
}

fn party_config(vars: &HashMap<String, String>, name: String) -> Result<PartyConfig, ConfigError> {
    let prefix = name.to_ascii_uppercase().replace('-', "_");

    let api_key = format!("{}_FRAME_API", prefix);
    let frame_api = vars
        .get(&api_key)
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingEnvVar(api_key))?;

    let client_id = vars
        .get(&format!("{}_ACCESS_CLIENT_ID", prefix))
        .filter(|value| !value.is_empty());
    let client_secret = vars
        .get(&format!("{}_ACCESS_CLIENT_SECRET", prefix))
        .filter(|value| !value.is_empty());

    let access = match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Some(AccessCredentials {
            client_id: client_id.clone(),
            client_secret: SecretString::from(client_secret.clone()),
        }),
        _ => None,
    };

    Ok(PartyConfig {
        name,
        frame_api,
        access,
    })
}

fn timeout_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a positive integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == 0 || value > MAX_NODE_TIMEOUT_SECONDS {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be in 1..={}, got {}",
            key, MAX_NODE_TIMEOUT_SECONDS, value
        )));
    }

    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "ADAM_FRAME_API".to_string(),
                "https://adam.example.com/api/".to_string(),
            ),
            (
                "STEVE_FRAME_API".to_string(),
                "https://steve.example.com/api".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).expect("config should load");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.party_a.name, "adam");
        assert_eq!(config.party_b.name, "steve");
        // Trailing slash is trimmed.
        assert_eq!(config.party_a.frame_api, "https://adam.example.com/api");
        assert_eq!(config.node_read_timeout, Duration::from_secs(5));
        assert_eq!(config.node_write_timeout, Duration::from_secs(10));
        assert!(config.party_a.access.is_none());
        assert!(!config.access_tokens_configured());
    }

    #[test]
    fn test_missing_frame_api() {
        let mut vars = base_vars();
        vars.remove("STEVE_FRAME_API");

        match Config::from_vars(&vars) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "STEVE_FRAME_API"),
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_party_names() {
        let vars = HashMap::from([
            ("PARTY_A".to_string(), "Grandma".to_string()),
            ("PARTY_B".to_string(), "kid-1".to_string()),
            (
                "GRANDMA_FRAME_API".to_string(),
                "http://10.0.0.2:8000/api".to_string(),
            ),
            (
                "KID_1_FRAME_API".to_string(),
                "http://10.0.0.3:8000/api".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).expect("config should load");
        assert_eq!(config.party_a.name, "grandma");
        assert_eq!(config.party_b.name, "kid-1");
        assert_eq!(config.party_b.frame_api, "http://10.0.0.3:8000/api");
    }

    #[test]
    fn test_identical_party_names_rejected() {
        let mut vars = base_vars();
        vars.insert("PARTY_B".to_string(), "adam".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidParty(_))));
    }

    #[test]
    fn test_invalid_party_name_rejected() {
        let mut vars = base_vars();
        vars.insert("PARTY_A".to_string(), "a/b".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidParty(_))));
    }

    #[test]
    fn test_access_requires_both_values() {
        let mut vars = base_vars();
        vars.insert("ADAM_ACCESS_CLIENT_ID".to_string(), "id-a".to_string());
        vars.insert("STEVE_ACCESS_CLIENT_ID".to_string(), "id-s".to_string());
        vars.insert(
            "STEVE_ACCESS_CLIENT_SECRET".to_string(),
            "secret-s".to_string(),
        );

        let config = Config::from_vars(&vars).expect("config should load");
        assert!(config.party_a.access.is_none());

        let access = config.party_b.access.as_ref().expect("steve has access");
        assert_eq!(access.client_id, "id-s");
        assert_eq!(access.client_secret.expose_secret(), "secret-s");
        assert!(!config.access_tokens_configured());
    }

    #[test]
    fn test_debug_redacts_access_secret() {
        let mut vars = base_vars();
        vars.insert("ADAM_ACCESS_CLIENT_ID".to_string(), "id-a".to_string());
        vars.insert(
            "ADAM_ACCESS_CLIENT_SECRET".to_string(),
            "super-secret-value".to_string(),
        );

        let config = Config::from_vars(&vars).expect("config should load");
        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("id-a"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-value"));
    }

    #[test]
    fn test_request_timeout_covers_leg_chains() {
        let config = Config::from_vars(&base_vars()).expect("config should load");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));

        let mut vars = base_vars();
        vars.insert("NODE_READ_TIMEOUT_SECONDS".to_string(), "20".to_string());
        vars.insert("NODE_WRITE_TIMEOUT_SECONDS".to_string(), "60".to_string());
        let config = Config::from_vars(&vars).expect("config should load");

        let read = config.node_read_timeout;
        let write = config.node_write_timeout;
        assert!(config.request_timeout() > read + write * 2);
        assert!(config.request_timeout() > read * 2 + write);
        assert_eq!(config.request_timeout(), Duration::from_secs(145));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut vars = base_vars();
        vars.insert("NODE_READ_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidTimeout(_))
        ));

        vars.insert("NODE_READ_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("NODE_WRITE_TIMEOUT_SECONDS".to_string(), "soon".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
