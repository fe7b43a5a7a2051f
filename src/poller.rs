use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::task::JoinHandle;

use crate::errors::{ConfigError, PollerError};
use crate::message::Message;
use crate::queue::{DeleteAck, DeleteEntry, QueueService, ReceiveRequest, SqsQueue};

pub mod config;
pub mod events;
pub mod transform;

use config::PollerConfig;
use events::{Observers, PollerEvent, PollerObserver};
use transform::{MessageTransform, Transform};

/// A long-polling consumer loop over a queue.
///
/// Each cycle receives a batch, publishes every message through the
/// `message` notification, then deletes the whole batch in one call. The
/// loop runs on a tokio task spawned by [`Poller::start`] and keeps going
/// until [`Poller::stop`] is called.
///
/// Cloning a `Poller` yields another reference to the same loop.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<Inner>,
}

/// A weak reference to a [`Poller`], for use inside notification handlers.
///
/// Handlers are owned by the poller, so capturing a `Poller` clone in one
/// would keep the poller alive forever. Once the poller is dropped every
/// method on the handle becomes a no-op.
#[derive(Clone)]
pub struct PollerHandle {
    inner: Weak<Inner>,
}

struct Inner {
    config: PollerConfig,
    request: ReceiveRequest,
    queue: Arc<dyn QueueService>,
    transform: Transform,
    observers: Observers,
    active: AtomicBool,
    /// Bumped on every start so a loop from an earlier start exits instead of
    /// running alongside the new one.
    generation: AtomicU64,
    /// Held for the whole of a cycle. At most one cycle is in flight.
    cycle: tokio::sync::Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for a [`Poller`] with a transform.
#[derive(Debug)]
pub struct PollerBuilder {
    config: PollerConfig,
    transform: Transform,
}

impl PollerBuilder {
    pub fn transform<T>(mut self, transform: T) -> Self
    where
        T: MessageTransform + 'static,
    {
        self.transform = Transform::custom(transform);
        self
    }

    /// Validates the configuration and builds a poller over `queue`.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue service the poller receives from and deletes on
    ///
    /// # Returns
    ///
    /// Returns an inactive [`Poller`], or the first [`ConfigError`] found.
    pub fn build<Q>(self, queue: Q) -> Result<Poller, ConfigError>
    where
        Q: QueueService + 'static,
    {
        self.config.validate()?;
        Ok(self.assemble(Arc::new(queue)))
    }

    /// Validates the configuration, then builds an SQS client from it.
    ///
    /// # Returns
    ///
    /// Returns an inactive [`Poller`] over AWS SQS. Fails with
    /// [`PollerError::Config`] before any client is created when the
    /// configuration is invalid.
    pub async fn connect(self) -> Result<Poller, PollerError> {
        self.config.validate()?;
        let client = crate::client::create_sqs_client(&self.config).await;
        Ok(self.assemble(Arc::new(SqsQueue::new(client))))
    }

    /// Builds the poller from an already validated configuration.
    fn assemble(self, queue: Arc<dyn QueueService>) -> Poller {
        let request = ReceiveRequest::from(&self.config);
        Poller {
            inner: Arc::new(Inner {
                config: self.config,
                request,
                queue,
                transform: self.transform,
                observers: Observers::default(),
                active: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                cycle: tokio::sync::Mutex::new(()),
                task: Mutex::new(None),
            }),
        }
    }
}

impl Poller {
    /// Creates a poller over `queue` without a transform.
    ///
    /// No network activity happens here.
    ///
    /// # Arguments
    ///
    /// * `config` - The poller configuration, validated before anything else
    /// * `queue` - The queue service to poll
    ///
    /// # Returns
    ///
    /// Returns an inactive [`Poller`], or the first [`ConfigError`] found.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use sqs_poller::{client::create_sqs_client, Poller, PollerConfig, SqsQueue};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = PollerConfig::new("https://sqs.us-east-1.amazonaws.com/123456789012/jobs");
    ///     let client = create_sqs_client(&config).await;
    ///     let poller = Poller::new(config, SqsQueue::new(client))?;
    ///     poller.start();
    ///     Ok(())
    /// }
    /// ```
    pub fn new<Q>(config: PollerConfig, queue: Q) -> Result<Self, ConfigError>
    where
        Q: QueueService + 'static,
    {
        Self::builder(config).build(queue)
    }

    pub fn builder(config: PollerConfig) -> PollerBuilder {
        PollerBuilder {
            config,
            transform: Transform::Identity,
        }
    }

    /// Creates a poller over AWS SQS using the configured region and credentials.
    pub async fn connect(config: PollerConfig) -> Result<Self, PollerError> {
        Self::builder(config).connect().await
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Starts polling. Does nothing if the poller is already active.
    ///
    /// Emits `start` and spawns the loop on the current tokio runtime, then
    /// returns without waiting for the first cycle. That first cycle runs even
    /// if `stop()` follows immediately. When an earlier loop is still finishing
    /// its cycle, the new loop waits for it before polling.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(&self) {
        Inner::start(&self.inner);
    }

    /// Stops polling and emits `stopped` right away.
    ///
    /// A receive or delete already in flight is allowed to finish; no further
    /// cycle is started after it.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Waits for the most recently started loop to finish.
    ///
    /// A loop started after `stop()` first drains the loop it replaced, so this
    /// also waits for that loop's in-flight cycle. Returns immediately if the
    /// poller was never started or was already joined.
    pub async fn join(&self) -> Result<(), PollerError> {
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => Ok(task.await?),
            None => Ok(()),
        }
    }

    /// Registers an observer for every notification.
    pub fn subscribe<O>(&self, observer: O)
    where
        O: PollerObserver,
    {
        self.inner.observers.subscribe(Arc::new(observer));
    }

    /// Registers a callback for every notification.
    pub fn on_event<F>(&self, f: F)
    where
        F: Fn(&PollerEvent<'_>) + Send + Sync + 'static,
    {
        self.inner.observers.on_event(f);
    }

    pub fn on_start<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::Start = event {
                f()
            }
        });
    }

    pub fn on_stopped<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::Stopped = event {
                f()
            }
        });
    }

    pub fn on_before_poll<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::BeforePoll = event {
                f()
            }
        });
    }

    pub fn on_after_poll<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::AfterPoll = event {
                f()
            }
        });
    }

    /// Registers a handler for each received message.
    pub fn on_message<F>(&self, f: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::Message(message) = *event {
                f(message)
            }
        });
    }

    pub fn on_messages_received_count<F>(&self, f: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::MessagesReceivedCount(count) = *event {
                f(count)
            }
        });
    }

    pub fn on_messages_deleted<F>(&self, f: F)
    where
        F: Fn(&DeleteAck) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::MessagesDeleted(ack) = *event {
                f(ack)
            }
        });
    }

    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&PollerError) + Send + Sync + 'static,
    {
        self.on_event(move |event| {
            if let PollerEvent::Error(error) = *event {
                f(error)
            }
        });
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("queue_url", &self.inner.config.queue_url)
            .field("active", &self.is_active())
            .field("transform", &self.inner.transform)
            .field("observers", &self.inner.observers)
            .finish()
    }
}

impl PollerHandle {
    /// Starts the poller if it still exists. See [`Poller::start`].
    pub fn start(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Inner::start(&inner);
        }
    }

    /// Stops the poller if it still exists. See [`Poller::stop`].
    pub fn stop(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.active.load(Ordering::SeqCst))
    }
}

impl fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollerHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Inner {
    fn start(this: &Arc<Self>) {
        if this
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(queue_url = %this.config.queue_url, "starting poller");
        this.observers.emit(PollerEvent::Start);

        // The loop only holds a weak reference so dropping every `Poller`
        // lets it wind down after the current cycle.
        let weak = Arc::downgrade(this);
        let mut task = this.task.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = task.take();
        *task = Some(tokio::spawn(run(weak, generation, previous)));
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        tracing::info!(queue_url = %self.config.queue_url, "stopping poller");
        self.observers.emit(PollerEvent::Stopped);
    }

    /// The first cycle of a start always runs unless a newer start superseded
    /// it. Later cycles also require the poller to still be active.
    fn should_poll(&self, generation: u64, first: bool) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && (first || self.active.load(Ordering::SeqCst))
    }

    /// Runs one cycle: before_poll, receive, publish, delete, after_poll.
    async fn poll(&self) {
        self.observers.emit(PollerEvent::BeforePoll);

        match self.queue.receive_batch(&self.request).await {
            Ok(messages) if messages.is_empty() => {
                tracing::debug!(queue_url = %self.request.queue_url, "no messages received");
            }
            Ok(messages) => self.handle_batch(messages).await,
            Err(source) => {
                tracing::warn!(
                    queue_url = %self.request.queue_url,
                    error = %source,
                    "failed to receive messages"
                );
                let error = PollerError::Receive {
                    queue_url: self.request.queue_url.clone(),
                    source,
                };
                self.observers.emit(PollerEvent::Error(&error));
            }
        }

        self.observers.emit(PollerEvent::AfterPoll);
    }

    async fn handle_batch(&self, messages: Vec<Message>) {
        tracing::debug!(
            queue_url = %self.request.queue_url,
            count = messages.len(),
            "received messages"
        );

        let mut entries = Vec::with_capacity(messages.len());
        for (index, message) in messages.into_iter().enumerate() {
            let message_id = message.message_id.clone();
            match self.transform.apply(message) {
                Ok(message) => {
                    self.observers.emit(PollerEvent::Message(&message));
                    entries.push(DeleteEntry::for_message(index, &message));
                }
                Err(source) => {
                    tracing::warn!(
                        message_id = %message_id,
                        error = %source,
                        "failed to transform message, leaving it on the queue"
                    );
                    let error = PollerError::Transform { message_id, source };
                    self.observers.emit(PollerEvent::Error(&error));
                }
            }
        }

        if entries.is_empty() {
            return;
        }

        match self
            .queue
            .delete_batch(&self.request.queue_url, &entries)
            .await
        {
            Ok(ack) => {
                if !ack.failed.is_empty() {
                    tracing::warn!(
                        queue_url = %self.request.queue_url,
                        successful = ack.successful.len(),
                        failed = ack.failed.len(),
                        "partial batch delete failure"
                    );
                }
                self.observers.emit(PollerEvent::MessagesDeleted(&ack));
                self.observers
                    .emit(PollerEvent::MessagesReceivedCount(entries.len()));
            }
            Err(source) => {
                tracing::warn!(
                    queue_url = %self.request.queue_url,
                    count = entries.len(),
                    error = %source,
                    "failed to delete messages"
                );
                let error = PollerError::Delete {
                    queue_url: self.request.queue_url.clone(),
                    count: entries.len(),
                    source,
                };
                self.observers.emit(PollerEvent::Error(&error));
            }
        }
    }
}

/// Drives the cycles of one start. A restart hands over the loop it
/// superseded, which is drained first so its in-flight cycle finishes and
/// `join()` covers it.
async fn run(inner: Weak<Inner>, generation: u64, previous: Option<JoinHandle<()>>) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            tracing::warn!(error = %e, "previous poll loop ended abnormally");
            if let Some(poller) = inner.upgrade() {
                let error = PollerError::Join(e);
                poller.observers.emit(PollerEvent::Error(&error));
            }
        }
    }

    let mut first = true;
    loop {
        let Some(poller) = inner.upgrade() else {
            break;
        };
        let _cycle = poller.cycle.lock().await;
        if !poller.should_poll(generation, first) {
            break;
        }
        first = false;
        poller.poll().await;
    }
    tracing::debug!(generation, "poll loop finished");
}
