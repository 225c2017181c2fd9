//! Batch dispatch to the external phishing classifier.
//!
//! Exactly one outbound call per analysis batch, with a bounded timeout and
//! no retries. Any failure — transport, timeout, non-success status, or a
//! malformed body — degrades to an empty verdict list so ingestion never
//! depends on classifier availability.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClassifierConfig;
use crate::error::{Result, TriageError};
use crate::features::FeatureVector;
use crate::model::record::{NormalizedRecord, Verdict};

/// The request envelope: `{"emails": [...]}`.
#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    emails: Vec<EmailPayload<'a>>,
}

/// Flat wire shape of one record. The feature variant sends `features`
/// in place of `body`.
#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    sender_name: Option<&'a str>,
    sender_email: &'a str,
    recipient_name: Option<&'a str>,
    recipient_email: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    attachment_filenames: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<&'a FeatureVector>,
}

impl<'a> From<&'a NormalizedRecord> for EmailPayload<'a> {
    fn from(record: &'a NormalizedRecord) -> Self {
        Self {
            sender_name: record.sender.display_name.as_deref(),
            sender_email: &record.sender.address,
            recipient_name: record.recipient.display_name.as_deref(),
            recipient_email: &record.recipient.address,
            subject: &record.subject,
            body: record.features.is_none().then_some(record.body_text.as_str()),
            attachment_filenames: &record.attachment_filenames,
            features: record.features.as_ref(),
        }
    }
}

/// The response envelope. A missing `verdicts` key is tolerated as empty.
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    verdicts: Vec<Verdict>,
}

/// Blocking client for the classifier service.
#[derive(Debug)]
pub struct ClassifierClient {
    endpoint: Url,
    http: reqwest::blocking::Client,
}

impl ClassifierClient {
    /// Build a client with the configured endpoint and request deadline.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            TriageError::InvalidConfig(format!(
                "classifier endpoint '{}': {e}",
                config.endpoint
            ))
        })?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TriageError::Classifier(format!("client setup failed: {e}")))?;
        Ok(Self { endpoint, http })
    }

    /// Classify a batch of records in a single call.
    ///
    /// Returns the verdicts in request order, or an empty list when the
    /// service is unreachable, times out, or answers abnormally. Never
    /// retries, never raises.
    pub fn classify(&self, records: &[NormalizedRecord]) -> Vec<Verdict> {
        if records.is_empty() {
            return Vec::new();
        }

        let request = ClassifyRequest {
            emails: records.iter().map(EmailPayload::from).collect(),
        };

        match self.post(&request) {
            Ok(verdicts) => {
                debug!(
                    sent = records.len(),
                    received = verdicts.len(),
                    "classifier round trip"
                );
                verdicts
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "classifier call failed; defaulting verdicts");
                Vec::new()
            }
        }
    }

    fn post(&self, request: &ClassifyRequest<'_>) -> Result<Vec<Verdict>> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .map_err(|e| TriageError::Classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TriageError::Classifier(format!(
                "API error {status}: {body}"
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .map_err(|e| TriageError::Classifier(format!("invalid response body: {e}")))?;
        Ok(parsed.verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::Identity;

    fn record(body: &str, features: Option<FeatureVector>) -> NormalizedRecord {
        NormalizedRecord {
            sender: Identity::from_parts(Some("Alice"), "alice@example.com"),
            recipient: Identity::from_parts(None, "bob@example.com"),
            subject: "Hi".to_string(),
            body_text: body.to_string(),
            attachment_filenames: vec!["a.pdf".to_string()],
            features,
        }
    }

    #[test]
    fn test_payload_wire_shape() {
        let r = record("Hello", None);
        let payload = EmailPayload::from(&r);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sender_name"], "Alice");
        assert_eq!(json["sender_email"], "alice@example.com");
        assert_eq!(json["recipient_name"], serde_json::Value::Null);
        assert_eq!(json["recipient_email"], "bob@example.com");
        assert_eq!(json["body"], "Hello");
        assert_eq!(json["attachment_filenames"][0], "a.pdf");
        assert!(json.get("features").is_none());
    }

    #[test]
    fn test_feature_variant_replaces_body() {
        let r = record("Hello", Some(FeatureVector::compute("Hello world")));
        let json = serde_json::to_value(EmailPayload::from(&r)).unwrap();
        assert!(json.get("body").is_none());
        assert_eq!(json["features"]["word_count"], 2);
    }

    #[test]
    fn test_response_missing_verdicts_key() {
        let parsed: ClassifyResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.verdicts.is_empty());
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let err = ClassifierClient::new(&ClassifierConfig {
            endpoint: "not a url".to_string(),
            timeout_secs: 1,
        })
        .unwrap_err();
        assert!(matches!(err, TriageError::InvalidConfig(_)));
    }

    #[test]
    fn test_classify_empty_batch_makes_no_call() {
        // Endpoint is unroutable; an attempted call would error loudly.
        let client = ClassifierClient::new(&ClassifierConfig {
            endpoint: "http://127.0.0.1:9/predict".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(client.classify(&[]).is_empty());
    }

    #[test]
    fn test_classify_unreachable_endpoint_defaults() {
        let client = ClassifierClient::new(&ClassifierConfig {
            endpoint: "http://127.0.0.1:9/predict".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        let verdicts = client.classify(&[record("Hello", None)]);
        assert!(verdicts.is_empty());
    }
}
