use std::collections::HashMap;

/// A message received from the queue.
///
/// The body is carried as an opaque string. It is only interpreted when a
/// transform is configured, which may fill in [`Message::parsed_body`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Unique id assigned by the queue.
    pub message_id: String,

    /// Token required to delete this particular delivery of the message.
    pub receipt_handle: String,

    pub body: String,

    /// System attributes such as `SentTimestamp` or `ApproximateReceiveCount`.
    pub attributes: HashMap<String, String>,

    pub message_attributes: HashMap<String, MessageAttribute>,

    /// Structured form of the body, set by a transform such as
    /// [`ParseJsonBody`](crate::poller::transform::ParseJsonBody).
    pub parsed_body: Option<serde_json::Value>,
}

/// A user-defined message attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: Option<String>,
    pub binary_value: Option<Vec<u8>>,
}

impl Message {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Message {
            message_id: message_id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

impl From<&aws_sdk_sqs::types::Message> for Message {
    fn from(message: &aws_sdk_sqs::types::Message) -> Self {
        let attributes = message
            .attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let message_attributes = message
            .message_attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(name, value)| {
                        let attribute = MessageAttribute {
                            data_type: value.data_type().to_string(),
                            string_value: value.string_value().map(str::to_string),
                            binary_value: value.binary_value().map(|blob| blob.as_ref().to_vec()),
                        };
                        (name.clone(), attribute)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Message {
            message_id: message.message_id().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
            attributes,
            message_attributes,
            parsed_body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sqs::types::{self, MessageAttributeValue, MessageSystemAttributeName};

    #[test]
    fn converts_sdk_message() {
        let sdk_message = types::Message::builder()
            .message_id("id-1")
            .receipt_handle("handle-1")
            .body("hello")
            .attributes(MessageSystemAttributeName::ApproximateReceiveCount, "3")
            .message_attributes(
                "tenant",
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value("acme")
                    .build()
                    .unwrap(),
            )
            .build();

        let message = Message::from(&sdk_message);

        assert_eq!(message.message_id, "id-1");
        assert_eq!(message.receipt_handle, "handle-1");
        assert_eq!(message.body, "hello");
        assert_eq!(
            message.attributes.get("ApproximateReceiveCount").map(String::as_str),
            Some("3")
        );
        let tenant = &message.message_attributes["tenant"];
        assert_eq!(tenant.data_type, "String");
        assert_eq!(tenant.string_value.as_deref(), Some("acme"));
        assert!(message.parsed_body.is_none());
    }

    #[test]
    fn missing_fields_become_empty() {
        let message = Message::from(&types::Message::builder().build());
        assert_eq!(message, Message::default());
    }
}
