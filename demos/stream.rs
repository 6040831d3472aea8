//! Stream - print every record of a streaming feed.
//!
//! This example demonstrates:
//! - Loading a `FeedConfig` from a JSON file
//! - Starting a `StreamingSession` and driving the multiplexer
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=feedwire=debug cargo run --example stream -- feed.json
//! ```
//!
//! with `feed.json` like:
//!
//! ```json
//! {
//!     "stream_url": "https://stream.example.com/1.1/user.json",
//!     "authorization": "Authorization: Bearer <token>"
//! }
//! ```

use std::rc::Rc;
use std::time::Duration;

use feedwire::auth::StaticAuth;
use feedwire::config::FeedConfig;
use feedwire::{ObserverRegistry, RequestMultiplexer, StreamingSession};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// The few fields printed for each status.
#[derive(Deserialize, Debug)]
struct Status {
    id: u64,
    text: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: stream <feed.json>")?;
    let config = FeedConfig::from_json_file(&path)?;

    let auth = StaticAuth::new(config.authorization.clone().unwrap_or_default());

    let registry = Rc::new(ObserverRegistry::new());
    registry.register_typed(&config.topic, |status: Status| {
        println!("[{}] {}", status.id, status.text);
    });
    registry.register(&config.topic, |value| {
        tracing::debug!("Record: {}", value);
    });

    let mut mux = RequestMultiplexer::with_http(config.http.clone())?;
    let session = StreamingSession::builder(config.stream_url.as_str())
        .topic(config.topic.as_str())
        .decoder_config(config.decoder)
        .start(&mut mux, &auth, registry)?;

    while !session.is_finished() {
        mux.poll()?;
        std::thread::sleep(Duration::from_millis(10));
    }

    eprintln!(
        "dispatched {} records, skipped {} malformed",
        session.records_dispatched(),
        session.malformed_records()
    );
    match session.failure() {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}
