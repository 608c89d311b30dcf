// Client configuration
// Loaded from the environment with sensible defaults, validated up front

use crate::error::{ClientError, Result};
use crate::models::Credentials;

/// Default token endpoint path on the server
const DEFAULT_AUTH_PATH: &str = "oauth2/token";

/// Default API path prefix for ordinary data operations
const DEFAULT_API_PATH: &str = "api";

/// Default bulk-create endpoint under the API path
const DEFAULT_CREATE_PATH: &str = "createRec";

/// Configuration for a client session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL
    pub base_url: String,

    /// Token endpoint path, relative to the base URL
    pub auth_path: String,

    /// API path prefix for ordinary data operations
    pub api_path: String,

    /// Bulk-create endpoint, relative to the API path
    pub create_path: String,

    /// Client and resource-owner credentials
    pub credentials: Credentials,

    /// Login re-attempts after the first failure
    pub auth_retries: u32,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
}

impl ClientConfig {
    /// Build a configuration with default endpoint paths and timeouts.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            create_path: DEFAULT_CREATE_PATH.to_string(),
            credentials,
            auth_retries: 2,
            http_max_connections: 20,
            http_connect_timeout: 30,
            http_request_timeout: 300,
        }
    }

    /// Load configuration from the environment.
    ///
    /// Reads a `.env` file when present, then `SKYTAG_*` variables with
    /// defaults for everything but the base URL and credentials.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let credentials = Credentials {
            client_id: require_env("SKYTAG_CLIENT_ID")?,
            client_secret: require_env("SKYTAG_CLIENT_SECRET")?,
            username: require_env("SKYTAG_USERNAME")?,
            password: require_env("SKYTAG_PASSWORD")?,
        };

        let mut config = ClientConfig::new(require_env("SKYTAG_BASE_URL")?, credentials);
        config.auth_path = env_or("SKYTAG_AUTH_PATH", DEFAULT_AUTH_PATH);
        config.api_path = env_or("SKYTAG_API_PATH", DEFAULT_API_PATH);
        config.create_path = env_or("SKYTAG_CREATE_PATH", DEFAULT_CREATE_PATH);
        config.auth_retries = env_parsed("SKYTAG_AUTH_RETRIES", 2);
        config.http_max_connections = env_parsed("SKYTAG_HTTP_MAX_CONNECTIONS", 20);
        config.http_connect_timeout = env_parsed("SKYTAG_HTTP_CONNECT_TIMEOUT", 30);
        config.http_request_timeout = env_parsed("SKYTAG_HTTP_REQUEST_TIMEOUT", 300);

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base URL must not be empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "base URL must be http(s), got: {}",
                self.base_url
            )));
        }
        if self.credentials.client_id.is_empty() || self.credentials.client_secret.is_empty() {
            return Err(ClientError::Config(
                "client id and secret must not be empty".to_string(),
            ));
        }
        if self.credentials.username.is_empty() {
            return Err(ClientError::Config("username must not be empty".to_string()));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ClientError::Config(format!("{} is required", name)))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://example.com", credentials());
        assert_eq!(config.auth_path, "oauth2/token");
        assert_eq!(config.api_path, "api");
        assert_eq!(config.create_path, "createRec");
        assert_eq!(config.auth_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = ClientConfig::new("", credentials());
        assert!(config.validate().is_err());

        let config = ClientConfig::new("ftp://example.com", credentials());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_credentials() {
        let mut creds = credentials();
        creds.client_secret = String::new();
        let config = ClientConfig::new("https://example.com", creds);
        assert!(config.validate().is_err());
    }
}
