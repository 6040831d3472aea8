//! Streaming session - one long-lived GET feeding the observer registry.
//!
//! A session owns nothing but counters. The request itself lives in the
//! multiplexer, so the host keeps driving `poll()` as usual:
//!
//! ```text
//! transport chunk -> StreamDecoder::feed_into -> Record -> ObserverRegistry::dispatch
//! ```
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use feedwire::auth::StaticAuth;
//! use feedwire::handler::ObserverRegistry;
//! use feedwire::multiplexer::RequestMultiplexer;
//! use feedwire::session::StreamingSession;
//! use feedwire::transport::ScriptedTransport;
//!
//! let transport = ScriptedTransport::new();
//! let feed = transport.feed("mem://user");
//! let mut mux = RequestMultiplexer::new(transport);
//!
//! let registry = Rc::new(ObserverRegistry::new());
//! registry.register("stream", |value| println!("{}", value));
//!
//! let auth = StaticAuth::new("Authorization: Bearer abc");
//! let session = StreamingSession::builder("mem://user")
//!     .start(&mut mux, &auth, registry)
//!     .unwrap();
//!
//! feed.push("{\"id\":1}\r\n{\"id\"");
//! feed.push(":2}\r\n");
//! mux.poll().unwrap();
//!
//! assert_eq!(session.records_dispatched(), 2);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::auth::AuthProvider;
use crate::config::{DecoderConfig, DEFAULT_TOPIC};
use crate::error::{Completion, FeedwireError, Result, TransportFailure};
use crate::handler::{ObserverRegistry, RequestContext, ResponseHandler};
use crate::multiplexer::{FetchRequest, HandleId, RequestMultiplexer, Timeout};
use crate::protocol::{DelimiterPolicy, StreamDecoder};
use crate::transport::Transport;

/// Counters shared between a session and its in-flight handler.
#[derive(Debug, Default)]
struct SessionState {
    dispatched: Cell<u64>,
    malformed: Cell<u64>,
    finished: Cell<bool>,
    failure: RefCell<Option<TransportFailure>>,
}

/// Response handler decoding the stream and dispatching records.
struct SessionHandler {
    decoder: StreamDecoder,
    registry: Rc<ObserverRegistry>,
    topic: String,
    state: Rc<SessionState>,
}

impl ResponseHandler for SessionHandler {
    fn on_chunk(&mut self, chunk: &[u8], ctx: &mut RequestContext<'_>) -> Result<()> {
        let mut records = Vec::new();
        let decoded = self.decoder.feed_into(chunk, &mut records);

        // Records terminated ahead of an overflowing tail still go out.
        for record in records {
            match self.registry.dispatch(&self.topic, &record) {
                Ok(_) => self.state.dispatched.set(self.state.dispatched.get() + 1),
                Err(FeedwireError::MalformedRecord(e)) => {
                    self.state.malformed.set(self.state.malformed.get() + 1);
                    tracing::warn!(
                        "Session {} skipped malformed record ({} bytes): {}",
                        ctx.id(),
                        record.len(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        decoded
    }

    fn on_complete(&mut self, outcome: Completion, ctx: &mut RequestContext<'_>) {
        if !self.decoder.is_empty() {
            tracing::debug!(
                "Session {} ended with {} undelimited bytes",
                ctx.id(),
                self.decoder.tail_len()
            );
        }

        self.state.finished.set(true);
        match outcome {
            Ok(()) => tracing::info!("Session {} stream closed", ctx.id()),
            Err(failure) => *self.state.failure.borrow_mut() = Some(failure),
        }
    }
}

/// Builder for [`StreamingSession`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    url: String,
    topic: String,
    decoder: DecoderConfig,
}

impl SessionBuilder {
    /// Create a builder for a stream at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: DEFAULT_TOPIC.to_string(),
            decoder: DecoderConfig::default(),
        }
    }

    /// Set the topic records are dispatched to.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the record delimiter policy.
    pub fn delimiter(mut self, delimiter: DelimiterPolicy) -> Self {
        self.decoder.delimiter = delimiter;
        self
    }

    /// Set the bound on undelimited bytes.
    pub fn max_tail_size(mut self, max_tail_size: usize) -> Self {
        self.decoder.max_tail_size = max_tail_size;
        self
    }

    /// Replace all decoder settings.
    pub fn decoder_config(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Submit the stream request and return the session.
    ///
    /// # Errors
    ///
    /// - [`FeedwireError::UnknownTopic`] if the topic is not declared in
    ///   `registry`
    /// - [`FeedwireError::EmptyUrl`] if the URL is empty
    pub fn start<T, A>(
        self,
        mux: &mut RequestMultiplexer<T>,
        auth: &A,
        registry: Rc<ObserverRegistry>,
    ) -> Result<StreamingSession>
    where
        T: Transport,
        A: AuthProvider + ?Sized,
    {
        if !registry.has_topic(&self.topic) {
            return Err(FeedwireError::UnknownTopic(self.topic));
        }

        let mut request = FetchRequest::get(self.url.as_str()).timeout(Timeout::Unlimited);
        let authorization = auth.authorization_header(&self.url);
        if !authorization.is_empty() {
            request = request.header(authorization);
        }

        let state = Rc::new(SessionState::default());
        let handler = SessionHandler {
            decoder: self.decoder.build(),
            registry,
            topic: self.topic.clone(),
            state: state.clone(),
        };

        let id = mux.submit_with(request, handler)?;
        tracing::info!("Session {} streaming {} to topic {:?}", id, self.url, self.topic);

        Ok(StreamingSession {
            id,
            topic: self.topic,
            state,
        })
    }
}

/// Observable side of a running stream.
#[derive(Debug)]
pub struct StreamingSession {
    id: HandleId,
    topic: String,
    state: Rc<SessionState>,
}

impl StreamingSession {
    /// Start a session with default decoder settings.
    pub fn start<T, A>(
        mux: &mut RequestMultiplexer<T>,
        url: &str,
        auth: &A,
        registry: Rc<ObserverRegistry>,
        topic: &str,
    ) -> Result<Self>
    where
        T: Transport,
        A: AuthProvider + ?Sized,
    {
        SessionBuilder::new(url).topic(topic).start(mux, auth, registry)
    }

    /// Create a builder for a stream at `url`.
    pub fn builder(url: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(url)
    }

    /// Handle of the underlying request.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Topic records are dispatched to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Records successfully dispatched so far.
    pub fn records_dispatched(&self) -> u64 {
        self.state.dispatched.get()
    }

    /// Records skipped because they were not valid JSON.
    pub fn malformed_records(&self) -> u64 {
        self.state.malformed.get()
    }

    /// Check if the stream has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.state.finished.get()
    }

    /// Transport failure that ended the stream, if any.
    pub fn failure(&self) -> Option<TransportFailure> {
        self.state.failure.borrow().clone()
    }
}
