use std::fmt;
use std::sync::Arc;

use crate::errors::TransformError;
use crate::message::Message;

/// Hook applied to every received message before it is published.
///
/// The transform runs exactly once per message, on the poll loop, before the
/// `message` notification. Returning an error reports a
/// [`PollerError::Transform`](crate::errors::PollerError::Transform) instead of
/// publishing the message, and the message is left on the queue.
pub trait MessageTransform: Send + Sync {
    fn transform(&self, message: Message) -> Result<Message, TransformError>;
}

impl<F> MessageTransform for F
where
    F: Fn(Message) -> Result<Message, TransformError> + Send + Sync,
{
    fn transform(&self, message: Message) -> Result<Message, TransformError> {
        (self)(message)
    }
}

/// The transform configured on a poller.
#[derive(Clone, Default)]
pub enum Transform {
    /// Publish messages exactly as received.
    #[default]
    Identity,
    Custom(Arc<dyn MessageTransform>),
}

impl Transform {
    pub fn custom<T>(transform: T) -> Self
    where
        T: MessageTransform + 'static,
    {
        Transform::Custom(Arc::new(transform))
    }

    pub fn apply(&self, message: Message) -> Result<Message, TransformError> {
        match self {
            Transform::Identity => Ok(message),
            Transform::Custom(transform) => transform.transform(message),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("Identity"),
            Transform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Parses the body as JSON into [`Message::parsed_body`], keeping the raw body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseJsonBody;

impl MessageTransform for ParseJsonBody {
    fn transform(&self, mut message: Message) -> Result<Message, TransformError> {
        message.parsed_body = Some(serde_json::from_str(&message.body)?);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_message_untouched() {
        let message = Message::new("1", "h", "plain text");
        let out = Transform::Identity.apply(message.clone()).unwrap();
        assert_eq!(out, message);
    }

    #[test]
    fn parse_json_body_keeps_raw_body() {
        let message = Message::new("1", "h", r#"{"message": "Message Body"}"#);
        let out = Transform::custom(ParseJsonBody).apply(message).unwrap();

        assert_eq!(out.body, r#"{"message": "Message Body"}"#);
        assert_eq!(out.parsed_body.unwrap()["message"], "Message Body");
    }

    #[test]
    fn parse_json_body_rejects_invalid_json() {
        let message = Message::new("1", "h", "not json");
        assert!(Transform::custom(ParseJsonBody).apply(message).is_err());
    }

    #[test]
    fn closures_are_transforms() {
        let upper = Transform::custom(|mut message: Message| -> Result<Message, TransformError> {
            message.body = message.body.to_uppercase();
            Ok(message)
        });
        let out = upper.apply(Message::new("1", "h", "abc")).unwrap();
        assert_eq!(out.body, "ABC");
    }
}
