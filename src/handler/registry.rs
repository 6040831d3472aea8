//! Observer registry for dispatching records by topic.
//!
//! Each topic owns an ordered list of observers; registration order is
//! dispatch order. Records are parsed once per dispatch and every observer
//! of the topic sees the same value.
//!
//! # Example
//!
//! ```
//! use feedwire::handler::ObserverRegistry;
//!
//! let registry = ObserverRegistry::new();
//!
//! registry.register("user", |value| {
//!     println!("event: {}", value);
//! });
//!
//! let notified = registry.dispatch("user", br#"{"text":"hi"}"#).unwrap();
//! assert_eq!(notified, 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::{FeedwireError, Result};

/// Trait for record observers.
pub trait Observer: 'static {
    /// Observe one parsed record.
    fn notify(&self, value: &Value);
}

/// Observer over the raw parsed value.
pub struct ValueObserver<F>
where
    F: Fn(&Value) + 'static,
{
    observer: F,
}

impl<F> ValueObserver<F>
where
    F: Fn(&Value) + 'static,
{
    /// Create a new value observer.
    pub fn new(observer: F) -> Self {
        Self { observer }
    }
}

impl<F> Observer for ValueObserver<F>
where
    F: Fn(&Value) + 'static,
{
    fn notify(&self, value: &Value) {
        (self.observer)(value)
    }
}

/// Wrapper that converts the value into `T` before calling the observer.
///
/// Values that do not have the shape of `T` are skipped. Streams mix
/// several kinds of messages on one connection, and a typed observer only
/// sees the kind it can represent.
pub struct TypedObserver<F, T>
where
    F: Fn(T) + 'static,
    T: DeserializeOwned + 'static,
{
    observer: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> TypedObserver<F, T>
where
    F: Fn(T) + 'static,
    T: DeserializeOwned + 'static,
{
    /// Create a new typed observer.
    pub fn new(observer: F) -> Self {
        Self {
            observer,
            _phantom: PhantomData,
        }
    }
}

impl<F, T> Observer for TypedObserver<F, T>
where
    F: Fn(T) + 'static,
    T: DeserializeOwned + 'static,
{
    fn notify(&self, value: &Value) {
        match JsonCodec::convert::<T>(value) {
            Ok(typed) => (self.observer)(typed),
            Err(e) => {
                tracing::trace!(
                    "Skipping {} observer: {}",
                    std::any::type_name::<T>(),
                    e
                );
            }
        }
    }
}

/// Registry mapping topics to ordered observer lists.
///
/// Registration goes through `&self` so observers may register further
/// observers while a dispatch is running. Dispatch iterates a snapshot of
/// the list taken when it started, so such registrations take effect from
/// the next dispatch on.
pub struct ObserverRegistry {
    topics: RefCell<HashMap<String, Vec<Rc<dyn Observer>>>>,
}

impl ObserverRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            topics: RefCell::new(HashMap::new()),
        }
    }

    /// Declare a topic without observers.
    pub fn declare(&self, topic: &str) {
        self.topics
            .borrow_mut()
            .entry(topic.to_string())
            .or_default();
    }

    /// Register an observer over the parsed value.
    pub fn register<F>(&self, topic: &str, observer: F)
    where
        F: Fn(&Value) + 'static,
    {
        self.register_observer(topic, ValueObserver::new(observer));
    }

    /// Register an observer that receives records converted to `T`.
    pub fn register_typed<F, T>(&self, topic: &str, observer: F)
    where
        F: Fn(T) + 'static,
        T: DeserializeOwned + 'static,
    {
        self.register_observer(topic, TypedObserver::new(observer));
    }

    /// Append any [`Observer`] to the topic's list.
    pub fn register_observer<O: Observer>(&self, topic: &str, observer: O) {
        self.topics
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(Rc::new(observer));
    }

    /// Check if a topic has been declared.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.borrow().contains_key(topic)
    }

    /// Number of observers registered for a topic.
    pub fn observer_count(&self, topic: &str) -> usize {
        self.topics.borrow().get(topic).map_or(0, Vec::len)
    }

    /// Parse a record and dispatch it to every observer of `topic`.
    ///
    /// Returns the number of observers notified.
    ///
    /// # Errors
    ///
    /// - [`FeedwireError::UnknownTopic`] if the topic was never declared
    /// - [`FeedwireError::MalformedRecord`] if the record is not valid JSON;
    ///   no observer is called in that case
    pub fn dispatch(&self, topic: &str, record: &[u8]) -> Result<usize> {
        if !self.has_topic(topic) {
            return Err(FeedwireError::UnknownTopic(topic.to_string()));
        }

        let value = JsonCodec::parse(record)?;
        self.dispatch_value(topic, &value)
    }

    /// Dispatch an already parsed value to every observer of `topic`.
    pub fn dispatch_value(&self, topic: &str, value: &Value) -> Result<usize> {
        let observers = self
            .topics
            .borrow()
            .get(topic)
            .cloned()
            .ok_or_else(|| FeedwireError::UnknownTopic(topic.to_string()))?;

        for observer in &observers {
            observer.notify(value);
        }

        Ok(observers.len())
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
