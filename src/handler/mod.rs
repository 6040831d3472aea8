//! Handler module - response callbacks and record dispatch.
//!
//! Provides:
//! - [`ResponseHandler`] - per-request chunk and completion callbacks
//! - [`RequestContext`] - lets callbacks chain further requests
//! - [`ObserverRegistry`] - maps topics to ordered observers
//!
//! # Example
//!
//! ```
//! use feedwire::handler::ObserverRegistry;
//!
//! let registry = ObserverRegistry::new();
//!
//! registry.register("user", |value| println!("first: {}", value));
//! registry.register("user", |value| println!("second: {}", value));
//!
//! registry.dispatch("user", br#"{"id":1}"#).unwrap();
//! ```

mod context;
mod registry;
mod response;

pub use context::RequestContext;
pub use registry::{Observer, ObserverRegistry, TypedObserver, ValueObserver};
pub use response::{Callbacks, ChunkHandler, ResponseHandler};
