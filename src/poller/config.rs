use std::fmt;

use serde::Deserialize;

use crate::errors::ConfigError;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for the SQS poller.
///
/// Deserializing a partial document merges it over the defaults, so only
/// `queue_url` normally needs to be supplied. The poller validates the
/// configuration when it is constructed and never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// The URL of the queue to poll.
    pub queue_url: String,

    /// The AWS region of the queue.
    pub region: String,

    /// Overrides the service endpoint, e.g. for LocalStack or ElasticMQ.
    pub endpoint_url: Option<String>,

    /// Static credentials. When absent the default provider chain is used.
    pub credentials: Option<StaticCredentials>,

    /// Parameters sent with every receive call.
    pub receive: ReceiveSettings,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            queue_url: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            credentials: None,
            receive: ReceiveSettings::default(),
        }
    }
}

/// Static AWS credentials, stored exactly as supplied.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Receive parameters for each long poll.
///
/// # Fields
/// - `max_number_of_messages`: batch size, between 1 and 10.
/// - `visibility_timeout`: seconds a received message stays hidden from other consumers.
/// - `wait_time_seconds`: long-poll wait, between 0 and 20.
/// - `attribute_names`: system attributes to request (e.g. `SentTimestamp`, `All`).
/// - `message_attribute_names`: user message attributes to request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReceiveSettings {
    pub max_number_of_messages: i32,
    pub visibility_timeout: i32,
    pub wait_time_seconds: i32,
    pub attribute_names: Vec<String>,
    pub message_attribute_names: Vec<String>,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        ReceiveSettings {
            max_number_of_messages: 10,
            visibility_timeout: 30,
            wait_time_seconds: 20,
            attribute_names: Vec::new(),
            message_attribute_names: Vec::new(),
        }
    }
}

impl PollerConfig {
    /// Creates a configuration for `queue_url` with every other field defaulted.
    pub fn new(queue_url: impl Into<String>) -> Self {
        PollerConfig {
            queue_url: queue_url.into(),
            ..Default::default()
        }
    }

    /// Builds a configuration from environment variables.
    ///
    /// Reads `SQS_QUEUE_URL`, `AWS_REGION` (or `AWS_DEFAULT_REGION`),
    /// `SQS_ENDPOINT_URL`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// `AWS_SESSION_TOKEN`, `SQS_MAX_NUMBER_OF_MESSAGES`,
    /// `SQS_VISIBILITY_TIMEOUT` and `SQS_WAIT_TIME_SECONDS`. Unset variables
    /// keep their defaults. The result is not validated here.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PollerConfig::default();

        if let Some(queue_url) = lookup("SQS_QUEUE_URL") {
            config.queue_url = queue_url;
        }
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            config.region = region;
        }
        config.endpoint_url = lookup("SQS_ENDPOINT_URL").filter(|url| !url.is_empty());

        if let (Some(access_key_id), Some(secret_access_key)) =
            (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY"))
        {
            config.credentials = Some(StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: lookup("AWS_SESSION_TOKEN"),
            });
        }

        let int_var = |name: &str, target: &mut i32| -> Result<(), ConfigError> {
            if let Some(value) = lookup(name) {
                *target = value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
                    name: name.to_string(),
                    value,
                })?;
            }
            Ok(())
        };
        int_var(
            "SQS_MAX_NUMBER_OF_MESSAGES",
            &mut config.receive.max_number_of_messages,
        )?;
        int_var(
            "SQS_VISIBILITY_TIMEOUT",
            &mut config.receive.visibility_timeout,
        )?;
        int_var(
            "SQS_WAIT_TIME_SECONDS",
            &mut config.receive.wait_time_seconds,
        )?;

        Ok(config)
    }

    /// Checks the required fields and the receive bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_url.trim().is_empty() {
            return Err(ConfigError::MissingQueueUrl);
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        if let Some(credentials) = &self.credentials {
            if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
                return Err(ConfigError::IncompleteCredentials);
            }
        }
        self.receive.validate()
    }
}

impl ReceiveSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.max_number_of_messages) {
            return Err(ConfigError::MaxNumberOfMessagesOutOfRange(
                self.max_number_of_messages,
            ));
        }
        if !(0..=20).contains(&self.wait_time_seconds) {
            return Err(ConfigError::WaitTimeSecondsOutOfRange(self.wait_time_seconds));
        }
        if !(0..=43_200).contains(&self.visibility_timeout) {
            return Err(ConfigError::VisibilityTimeoutOutOfRange(
                self.visibility_timeout,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid_once_queue_url_is_set() {
        let config = PollerConfig::new("https://sqs.us-east-1.amazonaws.com/123/q");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.receive.max_number_of_messages, 10);
        assert_eq!(config.receive.wait_time_seconds, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_negative_wait_time() {
        let mut config = PollerConfig::new("q");
        config.receive.wait_time_seconds = -1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::WaitTimeSecondsOutOfRange(-1))
        );
    }

    #[test]
    fn rejects_half_set_credentials() {
        let mut config = PollerConfig::new("q");
        config.credentials = Some(StaticCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: String::new(),
            session_token: None,
        });
        assert_eq!(config.validate(), Err(ConfigError::IncompleteCredentials));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credentials = StaticCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: Some("token".to_string()),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("token\""));
    }

    #[test]
    fn partial_json_merges_over_defaults() {
        let config: PollerConfig = serde_json::from_str(
            r#"{"queue_url": "q", "receive": {"max_number_of_messages": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.receive.max_number_of_messages, 5);
        assert_eq!(config.receive.wait_time_seconds, 20);
    }

    #[test]
    fn reads_environment_lookup() {
        let config = PollerConfig::from_lookup(lookup_from(&[
            ("SQS_QUEUE_URL", "http://localhost:9324/queue/jobs"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("SQS_WAIT_TIME_SECONDS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.queue_url, "http://localhost:9324/queue/jobs");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.receive.wait_time_seconds, 5);
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.access_key_id, "AKID");
        assert_eq!(credentials.secret_access_key, "secret");
        assert_eq!(credentials.session_token, None);
    }

    #[test]
    fn rejects_unparseable_environment_numbers() {
        let err = PollerConfig::from_lookup(lookup_from(&[("SQS_VISIBILITY_TIMEOUT", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnvVar {
                name: "SQS_VISIBILITY_TIMEOUT".to_string(),
                value: "soon".to_string(),
            }
        );
    }
}
