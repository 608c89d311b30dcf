// Transport collaborator interface
// The narrow session surface the asynchronous operations are written against

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::Value;

use crate::error::OpResult;

/// An HTTP reply before any negotiation or decoding
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// The Content-Type header, if present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// Per-request dispatch options
#[derive(Debug, Clone, Copy)]
pub struct PostOptions {
    /// Do not merge session-default headers into this request
    pub exclude_headers: bool,
    /// Route the request through the standard API path
    pub api: bool,
}

impl Default for PostOptions {
    fn default() -> Self {
        PostOptions {
            exclude_headers: false,
            api: true,
        }
    }
}

impl PostOptions {
    /// Options for requests that stand entirely outside the API surface,
    /// such as the login handshake: exclusive headers, no API routing.
    pub fn raw() -> Self {
        PostOptions {
            exclude_headers: true,
            api: false,
        }
    }
}

/// What an operation needs from the owning session.
///
/// Every failure crosses this boundary already captured as an
/// [`AsyncError`](crate::error::AsyncError), so callers route the error
/// variant instead of catching.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// POST `body` to `path` with exactly the given headers plus, unless
    /// excluded, the session defaults. Resolves once the full reply body
    /// has arrived.
    async fn post(
        &self,
        path: &str,
        body: String,
        headers: HeaderMap,
        opts: PostOptions,
    ) -> OpResult<RawResponse>;

    /// Submit a normalized entity batch to the bulk-create endpoint and
    /// return the decoded created-entity representation.
    async fn create(&self, rows: Vec<Value>) -> OpResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_content_type_accessor() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let response = RawResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(
            response.content_type(),
            Some("application/json; charset=utf-8")
        );

        let response = RawResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert_eq!(response.content_type(), None);
    }

    #[test]
    fn test_post_options_defaults() {
        let opts = PostOptions::default();
        assert!(!opts.exclude_headers);
        assert!(opts.api);

        let raw = PostOptions::raw();
        assert!(raw.exclude_headers);
        assert!(!raw.api);
    }
}
