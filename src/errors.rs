use thiserror::Error;

/// Boxed error type used for opaque failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for poller operations.
///
/// Configuration problems are returned synchronously from the constructors.
/// Everything else is reported through the `error` notification while the
/// loop keeps running.
#[derive(Debug, Error)]
pub enum PollerError {
    /// The configuration was rejected before the poller became usable.
    #[error("invalid poller configuration: {0}")]
    Config(#[from] ConfigError),

    /// The receive call for a cycle failed. No messages were emitted.
    #[error("failed to receive messages from {queue_url}: {source}")]
    Receive {
        queue_url: String,
        #[source]
        source: QueueError,
    },

    /// The batch delete failed after the messages were already emitted.
    ///
    /// Handlers may have processed these messages; the queue will deliver
    /// them again once their visibility timeout expires.
    #[error("failed to delete {count} messages from {queue_url}: {source}")]
    Delete {
        queue_url: String,
        count: usize,
        #[source]
        source: QueueError,
    },

    /// The configured transform rejected a message.
    #[error("failed to transform message {message_id}: {source}")]
    Transform {
        message_id: String,
        #[source]
        source: TransformError,
    },

    /// The spawned poll loop ended abnormally (panicked or was cancelled).
    #[error("poll loop terminated abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Construction-time configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("queue url is required")]
    MissingQueueUrl,

    #[error("region is required")]
    MissingRegion,

    #[error("max_number_of_messages must be between 1 and 10, got {0}")]
    MaxNumberOfMessagesOutOfRange(i32),

    #[error("wait_time_seconds must be between 0 and 20, got {0}")]
    WaitTimeSecondsOutOfRange(i32),

    #[error("visibility_timeout must be between 0 and 43200, got {0}")]
    VisibilityTimeoutOutOfRange(i32),

    #[error("static credentials require both an access key id and a secret access key")]
    IncompleteCredentials,

    #[error("environment variable {name} has an invalid value {value:?}")]
    InvalidEnvVar { name: String, value: String },
}

/// Opaque failure of the backing queue service.
///
/// Carries the rendered error text so it can be logged and compared, plus the
/// original error when one is available.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueueError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl QueueError {
    /// Creates a new `QueueError` with the provided message.
    pub fn new(message: impl Into<String>) -> Self {
        QueueError {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping its rendered text as the message.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        QueueError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for QueueError {
    fn from(s: String) -> Self {
        QueueError::new(s)
    }
}

impl From<&str> for QueueError {
    fn from(s: &str) -> Self {
        QueueError::new(s)
    }
}

/// Error returned by a [`MessageTransform`](crate::poller::transform::MessageTransform).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransformError(#[source] BoxError);

impl TransformError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        TransformError(source.into())
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(e: serde_json::Error) -> Self {
        TransformError::new(e)
    }
}

impl From<String> for TransformError {
    fn from(s: String) -> Self {
        TransformError::new(s)
    }
}

impl From<&str> for TransformError {
    fn from(s: &str) -> Self {
        TransformError::new(s)
    }
}
