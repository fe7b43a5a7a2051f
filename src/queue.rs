//! The queue capability the poller drives: receive a batch, delete a batch.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, MessageSystemAttributeName};

use crate::errors::QueueError;
use crate::message::Message;
use crate::poller::config::{PollerConfig, ReceiveSettings};

/// Parameters for a single receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: String,
    pub max_number_of_messages: i32,
    pub visibility_timeout: i32,
    pub wait_time_seconds: i32,
    pub attribute_names: Vec<String>,
    pub message_attribute_names: Vec<String>,
}

impl ReceiveRequest {
    pub fn new(queue_url: &str, settings: &ReceiveSettings) -> Self {
        ReceiveRequest {
            queue_url: queue_url.to_string(),
            max_number_of_messages: settings.max_number_of_messages,
            visibility_timeout: settings.visibility_timeout,
            wait_time_seconds: settings.wait_time_seconds,
            attribute_names: settings.attribute_names.clone(),
            message_attribute_names: settings.message_attribute_names.clone(),
        }
    }
}

impl From<&PollerConfig> for ReceiveRequest {
    fn from(config: &PollerConfig) -> Self {
        ReceiveRequest::new(&config.queue_url, &config.receive)
    }
}

/// One message to acknowledge in a batch delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Batch-local id, echoed back in the response.
    pub id: String,
    pub receipt_handle: String,
}

impl DeleteEntry {
    /// Builds the entry for a message, falling back to `msg-{index}` when the
    /// message has no id.
    pub fn for_message(index: usize, message: &Message) -> Self {
        let id = if message.message_id.is_empty() {
            format!("msg-{index}")
        } else {
            message.message_id.clone()
        };
        DeleteEntry {
            id,
            receipt_handle: message.receipt_handle.clone(),
        }
    }
}

/// Response of a batch delete.
///
/// A successful call can still contain per-entry failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteAck {
    pub successful: Vec<String>,
    pub failed: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

/// The two operations the poller needs from a queue service.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Long-polls for up to `request.max_number_of_messages` messages.
    async fn receive_batch(&self, request: &ReceiveRequest) -> Result<Vec<Message>, QueueError>;

    /// Deletes the given deliveries from the queue.
    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[DeleteEntry],
    ) -> Result<DeleteAck, QueueError>;
}

/// [`QueueService`] backed by AWS SQS.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    sqs_client: aws_sdk_sqs::Client,
}

impl SqsQueue {
    pub fn new(sqs_client: aws_sdk_sqs::Client) -> Self {
        SqsQueue { sqs_client }
    }

    pub fn client(&self) -> &aws_sdk_sqs::Client {
        &self.sqs_client
    }
}

fn optional_list<T, F>(names: &[String], f: F) -> Option<Vec<T>>
where
    F: Fn(&str) -> T,
{
    if names.is_empty() {
        None
    } else {
        Some(names.iter().map(|name| f(name.as_str())).collect())
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn receive_batch(&self, request: &ReceiveRequest) -> Result<Vec<Message>, QueueError> {
        let output = self
            .sqs_client
            .receive_message()
            .queue_url(&request.queue_url)
            .max_number_of_messages(request.max_number_of_messages)
            .visibility_timeout(request.visibility_timeout)
            .wait_time_seconds(request.wait_time_seconds)
            .set_message_system_attribute_names(optional_list(
                &request.attribute_names,
                |name| MessageSystemAttributeName::from(name),
            ))
            .set_message_attribute_names(optional_list(
                &request.message_attribute_names,
                |name| name.to_string(),
            ))
            .send()
            .await
            .map_err(|e| QueueError::with_source(DisplayErrorContext(&e).to_string(), e))?;

        Ok(output.messages().iter().map(Message::from).collect())
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[DeleteEntry],
    ) -> Result<DeleteAck, QueueError> {
        let entries = entries
            .iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(&entry.id)
                    .receipt_handle(&entry.receipt_handle)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| QueueError::with_source(e.to_string(), e))?;

        let output = self
            .sqs_client
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| QueueError::with_source(DisplayErrorContext(&e).to_string(), e))?;

        Ok(DeleteAck {
            successful: output
                .successful()
                .iter()
                .map(|entry| entry.id().to_string())
                .collect(),
            failed: output
                .failed()
                .iter()
                .map(|entry| DeleteFailure {
                    id: entry.id().to_string(),
                    code: entry.code().to_string(),
                    message: entry.message().map(str::to_string),
                    sender_fault: entry.sender_fault(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_request_copies_settings() {
        let mut config = PollerConfig::new("q");
        config.receive.attribute_names = vec!["All".to_string()];
        let request = ReceiveRequest::from(&config);

        assert_eq!(request.queue_url, "q");
        assert_eq!(request.max_number_of_messages, 10);
        assert_eq!(request.visibility_timeout, 30);
        assert_eq!(request.wait_time_seconds, 20);
        assert_eq!(request.attribute_names, vec!["All".to_string()]);
        assert!(request.message_attribute_names.is_empty());
    }

    #[test]
    fn delete_entry_falls_back_to_index() {
        let entry = DeleteEntry::for_message(3, &Message::new("", "handle", "body"));
        assert_eq!(entry.id, "msg-3");
        assert_eq!(entry.receipt_handle, "handle");

        let entry = DeleteEntry::for_message(0, &Message::new("abc", "handle", "body"));
        assert_eq!(entry.id, "abc");
    }

    #[test]
    fn empty_filters_are_omitted() {
        assert_eq!(optional_list(&[], str::to_string), None);
        assert_eq!(
            optional_list(&["a".to_string()], str::to_string),
            Some(vec!["a".to_string()])
        );
    }
}
