//! # Poller notifications
//!
//! Every observable step of the poll loop is published as a [`PollerEvent`].
//! Observers are plain synchronous callbacks invoked on the loop's task, in
//! registration order, before the loop moves on to the next step.
//!
//! ## Contract
//! - Payloads are borrowed for the duration of the callback; clone what you keep.
//! - Observers may register further observers or call
//!   [`PollerHandle::stop`](crate::poller::PollerHandle::stop) from inside a
//!   callback. Observers added during an emission see the next event onwards.
//! - Slow observers delay the loop. Hand heavy work off to a task or channel.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::PollerError;
use crate::message::Message;
use crate::queue::DeleteAck;

/// A notification emitted by the poller.
#[derive(Debug, Clone, Copy)]
pub enum PollerEvent<'a> {
    /// The poller went from inactive to active.
    Start,
    /// `stop()` was called.
    Stopped,
    /// A cycle is about to receive.
    BeforePoll,
    /// A cycle finished, whatever its outcome.
    AfterPoll,
    /// A received (and transformed) message.
    Message(&'a Message),
    /// Number of messages emitted in a cycle whose batch delete succeeded.
    MessagesReceivedCount(usize),
    /// Response of a successful batch delete.
    MessagesDeleted(&'a DeleteAck),
    /// A receive, delete or transform failure.
    Error(&'a PollerError),
}

/// Payload-free discriminant of [`PollerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stopped,
    BeforePoll,
    AfterPoll,
    Message,
    MessagesReceivedCount,
    MessagesDeleted,
    Error,
}

impl EventKind {
    /// Stable snake_case name, e.g. `before_poll`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Stopped => "stopped",
            EventKind::BeforePoll => "before_poll",
            EventKind::AfterPoll => "after_poll",
            EventKind::Message => "message",
            EventKind::MessagesReceivedCount => "messages_received_count",
            EventKind::MessagesDeleted => "messages_deleted",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PollerEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            PollerEvent::Start => EventKind::Start,
            PollerEvent::Stopped => EventKind::Stopped,
            PollerEvent::BeforePoll => EventKind::BeforePoll,
            PollerEvent::AfterPoll => EventKind::AfterPoll,
            PollerEvent::Message(_) => EventKind::Message,
            PollerEvent::MessagesReceivedCount(_) => EventKind::MessagesReceivedCount,
            PollerEvent::MessagesDeleted(_) => EventKind::MessagesDeleted,
            PollerEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Receives every notification of a poller.
pub trait PollerObserver: Send + Sync + 'static {
    fn on_event(&self, event: &PollerEvent<'_>);
}

impl<F> PollerObserver for F
where
    F: Fn(&PollerEvent<'_>) + Send + Sync + 'static,
{
    fn on_event(&self, event: &PollerEvent<'_>) {
        (self)(event)
    }
}

/// Logs every notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PollerObserver for TracingObserver {
    fn on_event(&self, event: &PollerEvent<'_>) {
        match event {
            PollerEvent::Start => tracing::info!("poller started"),
            PollerEvent::Stopped => tracing::info!("poller stopped"),
            PollerEvent::BeforePoll => tracing::trace!("polling"),
            PollerEvent::AfterPoll => tracing::trace!("poll finished"),
            PollerEvent::Message(message) => tracing::debug!(
                message_id = %message.message_id,
                body_len = message.body.len(),
                "message received"
            ),
            PollerEvent::MessagesReceivedCount(count) => {
                tracing::debug!(count, "messages processed")
            }
            PollerEvent::MessagesDeleted(ack) => tracing::debug!(
                successful = ack.successful.len(),
                failed = ack.failed.len(),
                "messages deleted"
            ),
            PollerEvent::Error(error) => tracing::error!(error = %error, "poller error"),
        }
    }
}

/// Registry of observers. Emission works on a snapshot, so callbacks can
/// register observers without deadlocking.
#[derive(Default)]
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn PollerObserver>>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Arc<dyn PollerObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub(crate) fn on_event<F>(&self, f: F)
    where
        F: Fn(&PollerEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(f));
    }

    pub(crate) fn emit(&self, event: PollerEvent<'_>) {
        let snapshot = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &snapshot {
            observer.on_event(&event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn kinds_have_stable_names() {
        let message = Message::default();
        let ack = DeleteAck::default();
        let error = PollerError::Receive {
            queue_url: "q".to_string(),
            source: crate::errors::QueueError::new("boom"),
        };
        let names: Vec<&str> = [
            PollerEvent::Start,
            PollerEvent::Stopped,
            PollerEvent::BeforePoll,
            PollerEvent::AfterPoll,
            PollerEvent::Message(&message),
            PollerEvent::MessagesReceivedCount(1),
            PollerEvent::MessagesDeleted(&ack),
            PollerEvent::Error(&error),
        ]
        .iter()
        .map(|event| event.kind().as_str())
        .collect();

        assert_eq!(
            names,
            [
                "start",
                "stopped",
                "before_poll",
                "after_poll",
                "message",
                "messages_received_count",
                "messages_deleted",
                "error",
            ]
        );
        assert_eq!(PollerEvent::Error(&error).kind().to_string(), "error");
    }

    #[test]
    fn observers_run_in_registration_order() {
        let observers = Observers::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            observers.on_event(move |_| {
                seen.lock().unwrap().push(tag);
            });
        }

        observers.emit(PollerEvent::BeforePoll);

        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn observer_can_subscribe_during_emission() {
        let observers = Arc::new(Observers::default());
        let registry = observers.clone();
        observers.on_event(move |_| {
            registry.subscribe(Arc::new(TracingObserver));
        });

        observers.emit(PollerEvent::Start);

        assert_eq!(observers.len(), 2);
    }
}
