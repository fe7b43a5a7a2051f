use sqs_poller::{ParseJsonBody, Poller, PollerConfig, TracingObserver};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// Runs against a real queue. Requires `TEST_SQS_QUEUE_URL` plus the usual
/// AWS credentials, optionally from a `.env` file.
#[tokio::test]
#[ignore = "requires a live SQS queue"]
async fn test_sqs_poll_and_delete() {
    dotenvy::dotenv().ok();

    let queue_url = env::var("TEST_SQS_QUEUE_URL").expect("TEST_SQS_QUEUE_URL must be set");

    let mut config = PollerConfig::from_env().expect("invalid environment");
    config.queue_url = queue_url.clone();
    config.receive.wait_time_seconds = 1;

    let sqs_client = sqs_poller::client::create_sqs_client(&config).await;
    sqs_client
        .send_message()
        .queue_url(&queue_url)
        .message_body(r#"{"message": "Message Body"}"#)
        .send()
        .await
        .expect("Failed to send test message");

    let poller = Poller::builder(config)
        .transform(ParseJsonBody)
        .connect()
        .await
        .expect("Failed to build poller");
    poller.subscribe(TracingObserver);

    let bodies = Arc::new(Mutex::new(Vec::new()));
    let sink = bodies.clone();
    poller.on_message(move |message| {
        if let Some(parsed) = &message.parsed_body {
            sink.lock().unwrap().push(parsed["message"].clone());
        }
    });

    let deleted = Arc::new(AtomicUsize::new(0));
    let counter = deleted.clone();
    let handle = poller.handle();
    poller.on_messages_received_count(move |count| {
        counter.fetch_add(count, Ordering::SeqCst);
        handle.stop();
    });
    poller.on_error(|error| println!("poller error: {error}"));

    poller.start();
    let result = timeout(Duration::from_secs(30), poller.join()).await;
    if result.is_err() {
        poller.stop();
        panic!("Test timed out waiting for the message");
    }

    assert!(deleted.load(Ordering::SeqCst) >= 1);
    assert!(
        bodies
            .lock()
            .unwrap()
            .iter()
            .any(|value| value == "Message Body")
    );
}
