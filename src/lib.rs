//! # SQS Poller
//!
//! A long-polling AWS SQS consumer loop. The poller repeatedly receives a batch
//! of messages, publishes each one to the registered handlers, then deletes the
//! whole batch in a single call.
//!
//! ## Features
//!
//! - Asynchronous polling on a tokio task with idempotent `start` and immediate `stop`
//! - Typed notifications for every step of a cycle (`start`, `stopped`,
//!   `before_poll`, `after_poll`, `message`, `messages_received_count`,
//!   `messages_deleted`, `error`)
//! - Optional per-message transform, with a built-in JSON body parser
//! - Configuration validated at construction, loadable from the environment or serde
//! - A [`QueueService`] seam so the loop can run against any queue backend
//!
//! Failures never stop the loop: receive, delete and transform errors are
//! published through the `error` notification and polling continues. There is
//! no retry or backoff; redelivery is left to the queue's visibility timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sqs_poller::{ParseJsonBody, Poller, PollerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PollerConfig::new("https://sqs.us-east-1.amazonaws.com/123456789012/jobs");
//!     let poller = Poller::builder(config)
//!         .transform(ParseJsonBody)
//!         .connect()
//!         .await?;
//!
//!     poller.on_message(|message| {
//!         println!("Processing message {}: {:?}", message.message_id, message.parsed_body);
//!     });
//!     poller.on_error(|error| eprintln!("poller error: {error}"));
//!
//!     poller.start();
//!     tokio::signal::ctrl_c().await?;
//!     poller.stop();
//!     poller.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod errors;
pub mod message;
pub mod poller;
pub mod queue;

pub use errors::{ConfigError, PollerError, QueueError, TransformError};
pub use message::{Message, MessageAttribute};
pub use poller::config::{PollerConfig, ReceiveSettings, StaticCredentials};
pub use poller::events::{EventKind, PollerEvent, PollerObserver, TracingObserver};
pub use poller::transform::{MessageTransform, ParseJsonBody, Transform};
pub use poller::{Poller, PollerBuilder, PollerHandle};
pub use queue::{DeleteAck, DeleteEntry, DeleteFailure, QueueService, ReceiveRequest, SqsQueue};
