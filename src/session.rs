// HTTP session
// reqwest-backed session: implements the transport contract the operations
// are written against and keeps the token state for the login's lifetime

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::ClientConfig;
use crate::content_type::decode_json_reply;
use crate::error::{AsyncError, ClientError, OpResult, Result};
use crate::models::TokenGrant;
use crate::ops::{AuthenticateOperation, CreateEntityOperation, Operation};
use crate::transport::{PostOptions, RawResponse, SessionTransport};

/// Token state held between login and expiry
#[derive(Debug, Clone)]
struct SessionToken {
    grant: TokenGrant,
    expires_at: DateTime<Utc>,
}

/// A client session against one server.
///
/// Cheap to clone; all clones share one connection pool and one token
/// state. Credentials and connection configuration are read-only for the
/// session's lifetime; operations never mutate them.
#[derive(Clone)]
pub struct HttpSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: Client,
    config: ClientConfig,
    token: RwLock<Option<SessionToken>>,
}

impl HttpSession {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .pool_max_idle_per_host(config.http_max_connections)
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpSession {
            inner: Arc::new(SessionInner {
                client,
                config,
                token: RwLock::new(None),
            }),
        })
    }

    /// Log in against the token endpoint and store the grant.
    pub async fn authenticate(&self) -> Result<()> {
        let transport: Arc<dyn SessionTransport> = self.inner.clone();
        let mut op = AuthenticateOperation::new(
            transport,
            &self.inner.config.credentials,
            self.inner.config.auth_path.clone(),
            self.inner.config.auth_retries,
        )?;

        let grant = op.go().wait().await.map_err(AsyncError::reraise)?;
        let expires_at = grant.expires_at(Utc::now());
        tracing::info!(expires_at = %expires_at.to_rfc3339(), "Session authenticated");

        *self.inner.token.write().await = Some(SessionToken { grant, expires_at });
        Ok(())
    }

    pub async fn is_logged_in(&self) -> bool {
        match self.inner.token.read().await.as_ref() {
            Some(token) => token.expires_at > Utc::now(),
            None => false,
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.bearer().await
    }

    /// Create a single entity; the created representation is delivered as
    /// the row itself.
    pub async fn create_entity(&self, entity: Value) -> Result<Value> {
        self.run_create(vec![entity], true).await
    }

    /// Create a batch of entities.
    pub async fn create_entities(&self, entities: Vec<Value>) -> Result<Value> {
        self.run_create(entities, false).await
    }

    async fn run_create(&self, entities: Vec<Value>, single: bool) -> Result<Value> {
        let transport: Arc<dyn SessionTransport> = self.inner.clone();
        let mut op = CreateEntityOperation::new(transport, entities, single);
        op.go().wait().await.map_err(AsyncError::reraise)
    }
}

impl SessionInner {
    /// Resolve a request path against the base URL, routing through the
    /// API prefix unless the request stands outside the API surface.
    fn endpoint(&self, path: &str, api: bool) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if api {
            let api_path = self.config.api_path.trim_matches('/');
            format!("{}/{}/{}", base, api_path, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    async fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.grant.access_token.clone())
    }

    async fn dispatch(
        &self,
        path: &str,
        body: String,
        headers: HeaderMap,
        opts: PostOptions,
    ) -> Result<RawResponse> {
        let url = self.endpoint(path, opts.api);
        tracing::debug!(url = %url, api = opts.api, "Sending HTTP request");

        let mut request = self.client.post(&url).headers(headers).body(body);
        if !opts.exclude_headers {
            if let Some(token) = self.bearer().await {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, url = %url, "Received error response");
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        tracing::debug!(status = %status, "Received HTTP response");
        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl SessionTransport for SessionInner {
    async fn post(
        &self,
        path: &str,
        body: String,
        headers: HeaderMap,
        opts: PostOptions,
    ) -> OpResult<RawResponse> {
        self.dispatch(path, body, headers, opts)
            .await
            .map_err(AsyncError::capture)
    }

    async fn create(&self, rows: Vec<Value>) -> OpResult<Value> {
        let body = serde_json::to_string(&rows)
            .map_err(|e| AsyncError::capture(ClientError::Json(e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .post(&self.config.create_path, body, headers, PostOptions::default())
            .await?;

        decode_json_reply(&response).map_err(AsyncError::capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;

    fn session() -> HttpSession {
        let credentials = Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        HttpSession::new(ClientConfig::new("https://example.com/", credentials)).unwrap()
    }

    #[test]
    fn test_endpoint_outside_api_surface() {
        assert_eq!(
            session().inner.endpoint("oauth2/token", false),
            "https://example.com/oauth2/token"
        );
    }

    #[test]
    fn test_endpoint_through_api_prefix() {
        assert_eq!(
            session().inner.endpoint("createRec", true),
            "https://example.com/api/createRec"
        );
    }

    #[test]
    fn test_endpoint_normalizes_slashes() {
        assert_eq!(
            session().inner.endpoint("/createRec", true),
            "https://example.com/api/createRec"
        );
    }

    #[test]
    fn test_fresh_session_is_not_logged_in() {
        let session = session();
        tokio_test::block_on(async {
            assert!(!session.is_logged_in().await);
            assert_eq!(session.access_token().await, None);
        });
    }
}
