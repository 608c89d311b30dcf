// Login handshake operation
// A password-grant token exchange driven by an explicit state machine
// with a bounded retry budget

use std::sync::Arc;

use crate::content_type::decode_json_reply;
use crate::error::{AsyncError, ClientError, ErrorKind, OpResult, Result};
use crate::models::{AuthRequest, Credentials, TokenGrant};
use crate::ops::{CompletionSlot, Operation, OperationHandle};
use crate::transport::{PostOptions, RawResponse, SessionTransport};

/// States of the login handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthState {
    Init,
    Login,
    Failed,
    Done,
}

/// Events fed into the machine by the driver
#[derive(Debug)]
pub(crate) enum AuthEvent {
    DoLogin,
    LoginDone(TokenGrant),
    Exception(AsyncError),
    Retry,
    Abort(AsyncError),
}

/// Side effects the driver executes after a transition
#[derive(Debug)]
pub(crate) enum AuthEffect {
    /// Issue one POST of the precomputed login request
    IssueLogin,
    /// Decide between retry and abort for this failure
    HandleFailure(AsyncError),
    /// Fire the completion contract with the terminal outcome
    Complete(OpResult<TokenGrant>),
}

/// The pure transition function.
///
/// Deterministic and free of I/O; every effect executes in the driver
/// loop. An event that is not legal in the current state is a protocol
/// violation.
pub(crate) fn auth_step(state: AuthState, event: AuthEvent) -> Result<(AuthState, AuthEffect)> {
    use AuthEffect::*;
    use AuthEvent::*;
    use AuthState::*;

    match (state, event) {
        (Init | Failed, DoLogin) => Ok((Login, IssueLogin)),
        (Login, LoginDone(grant)) => Ok((Done, Complete(Ok(grant)))),
        (Init | Login | Failed, Exception(err)) => Ok((Failed, HandleFailure(err))),
        (Failed, Retry) => Ok((Login, IssueLogin)),
        (Failed, Abort(err)) => Ok((Done, Complete(Err(err)))),
        (state, event) => Err(ClientError::Protocol(format!(
            "event {:?} not valid in state {:?}",
            event, state
        ))),
    }
}

/// Which failures are worth another login attempt.
///
/// The server's reply being malformed is deterministic, yet the default
/// retries it exactly like a transport failure for compatibility with the
/// servers this client grew up against. `TransportOnly` is the stricter
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    All,
    TransportOnly,
}

impl RetryPolicy {
    fn retryable(self, kind: ErrorKind) -> bool {
        match self {
            RetryPolicy::All => true,
            RetryPolicy::TransportOnly => matches!(kind, ErrorKind::Transport | ErrorKind::Status),
        }
    }
}

/// Log-in against the server's token endpoint.
///
/// One POST per attempt, strictly sequential; the request is precomputed
/// once and reissued unchanged on every retry.
pub struct AuthenticateOperation {
    driver: Option<AuthDriver>,
}

impl AuthenticateOperation {
    /// `retries` is the number of re-attempts after the first failure, so
    /// `retries = 2` allows three attempts in total.
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        credentials: &Credentials,
        auth_path: impl Into<String>,
        retries: u32,
    ) -> Result<Self> {
        let request = AuthRequest::build(credentials)?;
        Ok(AuthenticateOperation {
            driver: Some(AuthDriver {
                transport,
                request,
                auth_path: auth_path.into(),
                retries_left: retries,
                policy: RetryPolicy::default(),
                attempt: 0,
            }),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        if let Some(driver) = self.driver.as_mut() {
            driver.policy = policy;
        }
        self
    }
}

impl Operation for AuthenticateOperation {
    type Output = TokenGrant;

    fn go(&mut self) -> OperationHandle<TokenGrant> {
        let Some(driver) = self.driver.take() else {
            panic!("AuthenticateOperation::go() called twice");
        };
        let (slot, handle) = CompletionSlot::new();
        tokio::spawn(driver.run(slot));
        handle
    }
}

struct AuthDriver {
    transport: Arc<dyn SessionTransport>,
    request: AuthRequest,
    auth_path: String,
    retries_left: u32,
    policy: RetryPolicy,
    attempt: u32,
}

impl AuthDriver {
    async fn run(mut self, mut slot: CompletionSlot<TokenGrant>) {
        let mut state = AuthState::Init;
        let mut event = AuthEvent::DoLogin;

        loop {
            let (next, effect) = match auth_step(state, event) {
                Ok(transition) => transition,
                Err(err) => {
                    slot.complete(Err(AsyncError::capture(err)));
                    return;
                }
            };
            state = next;

            event = match effect {
                AuthEffect::IssueLogin => {
                    self.attempt += 1;
                    tracing::debug!(attempt = self.attempt, "Issuing login request");
                    match self.try_login().await {
                        Ok(grant) => AuthEvent::LoginDone(grant),
                        Err(err) => AuthEvent::Exception(err),
                    }
                }
                AuthEffect::HandleFailure(err) => {
                    if !self.policy.retryable(err.kind()) {
                        tracing::debug!(error = %err, "Failure is not retryable");
                        AuthEvent::Abort(err)
                    } else if self.retries_left > 0 {
                        self.retries_left -= 1;
                        tracing::warn!(
                            error = %err,
                            retries_left = self.retries_left,
                            "Login attempt failed, retrying"
                        );
                        AuthEvent::Retry
                    } else {
                        AuthEvent::Abort(err)
                    }
                }
                AuthEffect::Complete(outcome) => {
                    match &outcome {
                        Ok(_) => tracing::info!(attempts = self.attempt, "Login succeeded"),
                        Err(err) => tracing::error!(
                            attempts = self.attempt,
                            error = %err,
                            "Login failed"
                        ),
                    }
                    slot.complete(outcome);
                    return;
                }
            };
        }
    }

    /// One full login attempt: POST, then negotiate and validate the reply.
    async fn try_login(&self) -> OpResult<TokenGrant> {
        // The Basic auth header is exclusive to this request and the login
        // handshake stands outside the API surface.
        let response = self
            .transport
            .post(
                &self.auth_path,
                self.request.body.clone(),
                self.request.headers.clone(),
                PostOptions::raw(),
            )
            .await?;

        decode_grant(&response).map_err(AsyncError::capture)
    }
}

fn decode_grant(response: &RawResponse) -> Result<TokenGrant> {
    let payload = decode_json_reply(response)?;
    TokenGrant::from_json(payload)
}
