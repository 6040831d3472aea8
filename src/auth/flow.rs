//! Token handshake state machine.
//!
//! ```text
//! Unauthenticated --begin--> AwaitingRequestToken --body--> AwaitingUserInput
//!        ^                                                        |
//!        |  (any failure)                                     submit_pin
//!        |                                                        v
//!        +------------------------------------------------ AwaitingAccessToken
//!                                                                 |
//!                                          Authenticated <--body--+
//! ```
//!
//! Each step is an ordinary multiplexer request, so the flow advances as
//! the host polls. No step blocks.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::BytesMut;
use serde::Deserialize;

use super::Credentials;
use crate::codec::FormCodec;
use crate::error::{Completion, FeedwireError, Result};
use crate::handler::{RequestContext, ResponseHandler};
use crate::multiplexer::{FetchRequest, HandleId, RequestMultiplexer};
use crate::transport::Transport;

/// Signed endpoint URLs of the token handshake.
///
/// Signing needs the consumer key and secret, which stay with the
/// implementor.
pub trait TokenEndpoints: 'static {
    /// Signed URL returning a request token.
    fn request_token_url(&self) -> String;

    /// URL the user visits to authorize `request_token` and obtain a PIN.
    fn authorize_url(&self, request_token: &Credentials) -> String;

    /// Signed URL exchanging `request_token` and `pin` for an access token.
    fn access_token_url(&self, request_token: &Credentials, pin: &str) -> String;
}

/// Where the handshake stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingRequestToken,
    AwaitingUserInput {
        request_token: Credentials,
        authorize_url: String,
    },
    AwaitingAccessToken,
    Authenticated(Credentials),
}

impl AuthState {
    fn name(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "Unauthenticated",
            AuthState::AwaitingRequestToken => "AwaitingRequestToken",
            AuthState::AwaitingUserInput { .. } => "AwaitingUserInput",
            AuthState::AwaitingAccessToken => "AwaitingAccessToken",
            AuthState::Authenticated(_) => "Authenticated",
        }
    }
}

/// Body of a token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
}

impl From<TokenResponse> for Credentials {
    fn from(response: TokenResponse) -> Self {
        Credentials::new(response.oauth_token, response.oauth_token_secret)
    }
}

struct Shared {
    state: AuthState,
    last_error: Option<String>,
}

impl Shared {
    fn fail(&mut self, error: FeedwireError) {
        tracing::warn!("Token handshake failed in {}: {}", self.state.name(), error);
        self.state = AuthState::Unauthenticated;
        self.last_error = Some(error.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    RequestToken,
    AccessToken,
}

/// Accumulates one token response and applies it to the flow.
struct TokenHandler<E: TokenEndpoints> {
    step: Step,
    body: BytesMut,
    endpoints: Rc<E>,
    shared: Rc<RefCell<Shared>>,
}

impl<E: TokenEndpoints> TokenHandler<E> {
    fn awaiting(&self, state: &AuthState) -> bool {
        matches!(
            (self.step, state),
            (Step::RequestToken, AuthState::AwaitingRequestToken)
                | (Step::AccessToken, AuthState::AwaitingAccessToken)
        )
    }
}

impl<E: TokenEndpoints> ResponseHandler for TokenHandler<E> {
    fn on_chunk(&mut self, chunk: &[u8], _ctx: &mut RequestContext<'_>) -> Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn on_complete(&mut self, outcome: Completion, ctx: &mut RequestContext<'_>) {
        {
            let shared = self.shared.borrow();
            if !self.awaiting(&shared.state) {
                tracing::debug!(
                    "Ignoring {:?} response {} in state {}",
                    self.step,
                    ctx.id(),
                    shared.state.name()
                );
                return;
            }
        }

        let token: Credentials = match outcome
            .map_err(FeedwireError::from)
            .and_then(|()| FormCodec::decode::<TokenResponse>(&self.body))
        {
            Ok(response) => response.into(),
            Err(e) => {
                self.shared.borrow_mut().fail(e);
                return;
            }
        };

        // No borrow is held while the endpoints run; they may inspect the flow.
        let next = match self.step {
            Step::RequestToken => {
                let authorize_url = self.endpoints.authorize_url(&token);
                tracing::info!("Request token received; authorize at {}", authorize_url);
                AuthState::AwaitingUserInput {
                    request_token: token,
                    authorize_url,
                }
            }
            Step::AccessToken => {
                tracing::info!("Access token received");
                AuthState::Authenticated(token)
            }
        };
        self.shared.borrow_mut().state = next;
    }
}

/// Drives the request-token, PIN, access-token handshake.
///
/// # Example
///
/// ```
/// use feedwire::auth::{AuthFlow, AuthState, Credentials, TokenEndpoints};
/// use feedwire::multiplexer::RequestMultiplexer;
/// use feedwire::transport::ScriptedTransport;
///
/// struct Endpoints;
///
/// impl TokenEndpoints for Endpoints {
///     fn request_token_url(&self) -> String {
///         "mem://request_token".into()
///     }
///     fn authorize_url(&self, token: &Credentials) -> String {
///         format!("mem://authorize?oauth_token={}", token.token_key)
///     }
///     fn access_token_url(&self, _token: &Credentials, pin: &str) -> String {
///         format!("mem://access_token?pin={}", pin)
///     }
/// }
///
/// let transport = ScriptedTransport::new();
/// let feed = transport.feed("mem://request_token");
/// let mut mux = RequestMultiplexer::new(transport);
/// let mut flow = AuthFlow::new(Endpoints);
///
/// flow.begin(&mut mux).unwrap();
/// feed.push("oauth_token=rt&oauth_token_secret=rs");
/// feed.finish();
/// mux.poll().unwrap();
///
/// assert_eq!(flow.authorize_url().as_deref(), Some("mem://authorize?oauth_token=rt"));
/// ```
pub struct AuthFlow<E: TokenEndpoints> {
    endpoints: Rc<E>,
    shared: Rc<RefCell<Shared>>,
}

impl<E: TokenEndpoints> AuthFlow<E> {
    /// Create a flow in the `Unauthenticated` state.
    pub fn new(endpoints: E) -> Self {
        Self {
            endpoints: Rc::new(endpoints),
            shared: Rc::new(RefCell::new(Shared {
                state: AuthState::Unauthenticated,
                last_error: None,
            })),
        }
    }

    /// Fetch a request token.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::InvalidState`] unless the flow is
    /// `Unauthenticated`.
    pub fn begin<T: Transport>(&mut self, mux: &mut RequestMultiplexer<T>) -> Result<HandleId> {
        self.expect_state("begin", |state| matches!(state, AuthState::Unauthenticated))?;

        let id = mux.submit_with(
            FetchRequest::get(self.endpoints.request_token_url()),
            self.handler(Step::RequestToken),
        )?;

        let mut shared = self.shared.borrow_mut();
        shared.state = AuthState::AwaitingRequestToken;
        shared.last_error = None;
        tracing::debug!("Requesting request token ({})", id);
        Ok(id)
    }

    /// Exchange the authorized request token and the user's PIN for an
    /// access token.
    ///
    /// # Errors
    ///
    /// Returns [`FeedwireError::InvalidState`] unless the flow is
    /// `AwaitingUserInput`.
    pub fn submit_pin<T: Transport>(
        &mut self,
        mux: &mut RequestMultiplexer<T>,
        pin: &str,
    ) -> Result<HandleId> {
        let request_token = match &self.shared.borrow().state {
            AuthState::AwaitingUserInput { request_token, .. } => request_token.clone(),
            other => return Err(invalid_state("submit_pin", other)),
        };

        let id = mux.submit_with(
            FetchRequest::get(self.endpoints.access_token_url(&request_token, pin.trim())),
            self.handler(Step::AccessToken),
        )?;

        self.shared.borrow_mut().state = AuthState::AwaitingAccessToken;
        tracing::debug!("Requesting access token ({})", id);
        Ok(id)
    }

    /// Use previously obtained credentials.
    ///
    /// A response still in flight is ignored when it arrives.
    pub fn restore(&mut self, credentials: Credentials) {
        let mut shared = self.shared.borrow_mut();
        shared.state = AuthState::Authenticated(credentials);
        shared.last_error = None;
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.shared.borrow().state.clone()
    }

    /// Access credentials once authenticated.
    pub fn credentials(&self) -> Option<Credentials> {
        match &self.shared.borrow().state {
            AuthState::Authenticated(credentials) => Some(credentials.clone()),
            _ => None,
        }
    }

    /// URL to show the user while waiting for the PIN.
    pub fn authorize_url(&self) -> Option<String> {
        match &self.shared.borrow().state {
            AuthState::AwaitingUserInput { authorize_url, .. } => Some(authorize_url.clone()),
            _ => None,
        }
    }

    /// Check if the flow holds access credentials.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.shared.borrow().state, AuthState::Authenticated(_))
    }

    /// Message of the failure that last reset the flow.
    pub fn last_error(&self) -> Option<String> {
        self.shared.borrow().last_error.clone()
    }

    fn handler(&self, step: Step) -> TokenHandler<E> {
        TokenHandler {
            step,
            body: BytesMut::new(),
            endpoints: self.endpoints.clone(),
            shared: self.shared.clone(),
        }
    }

    fn expect_state(&self, operation: &str, allowed: impl Fn(&AuthState) -> bool) -> Result<()> {
        let shared = self.shared.borrow();
        if allowed(&shared.state) {
            Ok(())
        } else {
            Err(invalid_state(operation, &shared.state))
        }
    }
}

fn invalid_state(operation: &str, state: &AuthState) -> FeedwireError {
    FeedwireError::InvalidState(format!("{} called in state {}", operation, state.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, TransportFailure};
    use crate::transport::ScriptedTransport;

    struct Endpoints;

    impl TokenEndpoints for Endpoints {
        fn request_token_url(&self) -> String {
            "mem://request_token".to_string()
        }

        fn authorize_url(&self, token: &Credentials) -> String {
            format!("mem://authorize?oauth_token={}", token.token_key)
        }

        fn access_token_url(&self, token: &Credentials, pin: &str) -> String {
            format!("mem://access_token?oauth_token={}&pin={}", token.token_key, pin)
        }
    }

    fn flow_with_request_token(
        transport: &ScriptedTransport,
        mux: &mut RequestMultiplexer<ScriptedTransport>,
    ) -> AuthFlow<Endpoints> {
        let feed = transport.feed("mem://request_token");
        let mut flow = AuthFlow::new(Endpoints);

        flow.begin(mux).unwrap();
        feed.push("oauth_token=rt&oauth_token_secret=rs&oauth_callback_confirmed=true");
        feed.finish();
        mux.poll().unwrap();
        flow
    }

    #[test]
    fn test_full_handshake() {
        let transport = ScriptedTransport::new();
        let mut mux = RequestMultiplexer::new(transport.clone());
        let mut flow = flow_with_request_token(&transport, &mut mux);

        assert_eq!(
            flow.state(),
            AuthState::AwaitingUserInput {
                request_token: Credentials::new("rt", "rs"),
                authorize_url: "mem://authorize?oauth_token=rt".to_string(),
            }
        );

        let access = transport.feed("mem://access_token?oauth_token=rt&pin=1234");
        let id = flow.submit_pin(&mut mux, " 1234\n").unwrap();
        assert_eq!(flow.state(), AuthState::AwaitingAccessToken);

        access.push("oauth_token=ak&oauth_");
        mux.poll().unwrap();
        assert_eq!(flow.state(), AuthState::AwaitingAccessToken);

        access.push("token_secret=as&user_id=42");
        access.finish();
        mux.poll().unwrap();

        assert!(!mux.contains(id));
        assert!(flow.is_authenticated());
        assert_eq!(flow.credentials(), Some(Credentials::new("ak", "as")));
        assert!(flow.last_error().is_none());
    }

    #[test]
    fn test_wrong_state_rejected() {
        let transport = ScriptedTransport::new();
        let mut mux = RequestMultiplexer::new(transport);
        let mut flow = AuthFlow::new(Endpoints);

        assert!(matches!(
            flow.submit_pin(&mut mux, "1"),
            Err(FeedwireError::InvalidState(_))
        ));

        flow.begin(&mut mux).unwrap();
        assert!(matches!(
            flow.begin(&mut mux),
            Err(FeedwireError::InvalidState(_))
        ));
        assert_eq!(mux.len(), 1);
    }

    #[test]
    fn test_transport_failure_resets() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed("mem://request_token");
        let mut mux = RequestMultiplexer::new(transport);
        let mut flow = AuthFlow::new(Endpoints);

        flow.begin(&mut mux).unwrap();
        feed.fail(TransportFailure::new(FailureKind::Status(401), "unauthorized"));
        mux.poll().unwrap();

        assert_eq!(flow.state(), AuthState::Unauthenticated);
        let error = flow.last_error().unwrap();
        assert!(error.contains("401"), "{}", error);

        // A reset flow can start over.
        flow.begin(&mut mux).unwrap();
        assert_eq!(flow.state(), AuthState::AwaitingRequestToken);
        assert!(flow.last_error().is_none());
    }

    #[test]
    fn test_unparsable_body_resets() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed("mem://request_token");
        let mut mux = RequestMultiplexer::new(transport);
        let mut flow = AuthFlow::new(Endpoints);

        flow.begin(&mut mux).unwrap();
        feed.push("Failed to validate oauth signature and token");
        feed.finish();
        mux.poll().unwrap();

        assert_eq!(flow.state(), AuthState::Unauthenticated);
        assert!(flow.last_error().is_some());
    }

    #[test]
    fn test_restore_skips_handshake() {
        let mut flow = AuthFlow::new(Endpoints);
        flow.restore(Credentials::new("cached", "secret"));

        assert!(flow.is_authenticated());
        assert_eq!(flow.credentials(), Some(Credentials::new("cached", "secret")));
    }

    /// Endpoints that read the flow's state while building the authorize URL.
    struct InspectingEndpoints {
        flow: Rc<RefCell<Option<Rc<RefCell<Shared>>>>>,
        seen: Rc<RefCell<Vec<&'static str>>>,
    }

    impl TokenEndpoints for InspectingEndpoints {
        fn request_token_url(&self) -> String {
            "mem://request_token".to_string()
        }

        fn authorize_url(&self, token: &Credentials) -> String {
            if let Some(shared) = self.flow.borrow().as_ref() {
                self.seen.borrow_mut().push(shared.borrow().state.name());
            }
            format!("mem://authorize?oauth_token={}", token.token_key)
        }

        fn access_token_url(&self, _token: &Credentials, pin: &str) -> String {
            format!("mem://access_token?pin={}", pin)
        }
    }

    #[test]
    fn test_endpoints_may_read_state_during_completion() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed("mem://request_token");
        let mut mux = RequestMultiplexer::new(transport);

        let slot = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut flow = AuthFlow::new(InspectingEndpoints {
            flow: slot.clone(),
            seen: seen.clone(),
        });
        *slot.borrow_mut() = Some(flow.shared.clone());

        flow.begin(&mut mux).unwrap();
        feed.push("oauth_token=rt&oauth_token_secret=rs");
        feed.finish();
        mux.poll().unwrap();

        assert_eq!(*seen.borrow(), vec!["AwaitingRequestToken"]);
        assert_eq!(flow.authorize_url().as_deref(), Some("mem://authorize?oauth_token=rt"));
    }

    #[test]
    fn test_late_response_ignored_after_restore() {
        let transport = ScriptedTransport::new();
        let feed = transport.feed("mem://request_token");
        let mut mux = RequestMultiplexer::new(transport);
        let mut flow = AuthFlow::new(Endpoints);

        flow.begin(&mut mux).unwrap();
        flow.restore(Credentials::new("cached", "secret"));

        feed.push("oauth_token=rt&oauth_token_secret=rs");
        feed.finish();
        mux.poll().unwrap();

        assert_eq!(flow.credentials(), Some(Credentials::new("cached", "secret")));
    }
}
