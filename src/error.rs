// Error handling module
// Defines the client error taxonomy and the cross-task error capture

use thiserror::Error;

/// Errors that can occur while talking to the server
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network-level failure (connect, timeout, body transfer)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server replied with a non-success HTTP status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Reply carried no Content-Type header
    #[error("No content-type given in reply")]
    MissingContentType,

    /// Reply carried a Content-Type other than application/json
    #[error("Invalid content type received: {0}")]
    UnexpectedContentType(String),

    /// Content-Type parameter block could not be tokenized
    #[error("Malformed content-type parameter: {0}")]
    MalformedParameter(String),

    /// Reply declared a charset this client cannot decode
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// Reply body bytes are not valid in the declared charset
    #[error("Reply body is not valid {charset}")]
    BodyDecode { charset: String },

    /// Reply body is not well-formed JSON
    #[error("Malformed JSON in reply: {0}")]
    Json(#[from] serde_json::Error),

    /// Auth reply is missing a mandatory field
    #[error("Missing {field} in reply: {payload}")]
    MissingField { field: &'static str, payload: String },

    /// Server reply contained no rows where one was required
    #[error("Server reply contained no rows")]
    EmptyReply,

    /// Entity input rejected before submission
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation lifecycle contract violated
    #[error("Operation protocol violation: {0}")]
    Protocol(String),

    /// A failure captured on another task, re-raised here
    #[error(transparent)]
    Captured(#[from] AsyncError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // Categorize the error for better debugging
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection_failed"
        } else if err.is_request() {
            "request_error"
        } else if err.is_body() {
            "body_error"
        } else if err.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };
        ClientError::Transport(format!("{} (kind: {})", err, kind))
    }
}

/// Coarse classification of a captured failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure
    Transport,
    /// Non-success HTTP status
    Status,
    /// Protocol validation failure (content type, charset, JSON, fields)
    Validation,
    /// Caller-supplied input rejected
    Input,
    /// Configuration problem
    Config,
    /// Operation lifecycle misuse
    Protocol,
    /// Anything else
    Internal,
}

/// An immutable capture of a failure raised on one task, transportable to
/// and re-raisable on another.
///
/// The kind, rendered message and source chain are snapshotted at capture
/// time, so the capture stays `Clone + Send` even when the original error
/// is neither.
#[derive(Debug, Clone)]
pub struct AsyncError {
    kind: ErrorKind,
    message: String,
    chain: Vec<String>,
}

impl AsyncError {
    /// Capture a failure for delivery to another task.
    pub fn capture(err: ClientError) -> Self {
        // Re-capturing an already-captured failure must not stack wrappers.
        if let ClientError::Captured(inner) = err {
            return inner;
        }

        let kind = match &err {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Status { .. } => ErrorKind::Status,
            ClientError::MissingContentType
            | ClientError::UnexpectedContentType(_)
            | ClientError::MalformedParameter(_)
            | ClientError::UnsupportedCharset(_)
            | ClientError::BodyDecode { .. }
            | ClientError::Json(_)
            | ClientError::MissingField { .. }
            | ClientError::EmptyReply => ErrorKind::Validation,
            ClientError::InvalidEntity(_) => ErrorKind::Input,
            ClientError::Config(_) => ErrorKind::Config,
            ClientError::Protocol(_) => ErrorKind::Protocol,
            ClientError::Captured(_) | ClientError::Internal(_) => ErrorKind::Internal,
        };

        let message = err.to_string();
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        AsyncError {
            kind,
            message,
            chain,
        }
    }

    /// Surface the captured failure in the calling context.
    pub fn reraise(self) -> ClientError {
        ClientError::Captured(self)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rendered source chain, outermost first.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

impl std::fmt::Display for AsyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.chain {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AsyncError {}

impl From<ClientError> for AsyncError {
    fn from(err: ClientError) -> Self {
        AsyncError::capture(err)
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Result type delivered across an operation's completion boundary
pub type OpResult<T> = std::result::Result<T, AsyncError>;
