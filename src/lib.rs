//! # feedwire
//!
//! Non-blocking HTTP streaming client for line-delimited JSON feeds.
//!
//! Many concurrent GETs are driven from one cooperative polling loop. A
//! streaming session turns one of them into discrete records and fans
//! each record out to the observers of a topic.
//!
//! ## Architecture
//!
//! - **Multiplexer**: owns every in-flight request, advanced by `poll()`
//! - **Decoder**: reassembles `\r\n`-delimited records from arbitrary chunks
//! - **Registry**: topic to ordered observers, fed with parsed JSON values
//! - **Auth**: header providers and the token handshake state machine
//!
//! ## Example
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use feedwire::auth::StaticAuth;
//! use feedwire::transport::HttpConfig;
//! use feedwire::{ObserverRegistry, RequestMultiplexer, StreamingSession};
//!
//! fn main() -> feedwire::Result<()> {
//!     let mut mux = RequestMultiplexer::with_http(HttpConfig::default())?;
//!
//!     let registry = Rc::new(ObserverRegistry::new());
//!     registry.register("stream", |value| println!("{}", value));
//!
//!     let auth = StaticAuth::new("Authorization: Bearer abc");
//!     let session = StreamingSession::start(
//!         &mut mux,
//!         "https://stream.example.com/user.json",
//!         &auth,
//!         registry,
//!         "stream",
//!     )?;
//!
//!     while !session.is_finished() {
//!         mux.poll()?;
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod multiplexer;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Completion, FailureKind, FeedwireError, Result, TransportFailure};
pub use handler::{ObserverRegistry, RequestContext, ResponseHandler};
pub use multiplexer::{FetchRequest, HandleId, RequestMultiplexer};
pub use protocol::{Record, StreamDecoder};
pub use session::{SessionBuilder, StreamingSession};
