// skytag - Async client for tag-based building data servers
// Library root

pub mod config;
pub mod content_type;
pub mod error;
pub mod models;
pub mod ops;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{AsyncError, ClientError, ErrorKind, OpResult, Result};
pub use models::{Credentials, Ref, TokenGrant};
pub use ops::{
    normalize_entities, AuthenticateOperation, CreateEntityOperation, Operation, OperationHandle,
    RetryPolicy,
};
pub use session::HttpSession;
pub use transport::{PostOptions, RawResponse, SessionTransport};
