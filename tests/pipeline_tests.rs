//! Integration tests for the normalization pipeline, batch analysis, and
//! verdict merging.

use mailtriage::config::{ClassifierConfig, Config};
use mailtriage::features::FeatureVector;
use mailtriage::model::address::Identity;
use mailtriage::model::record::{MessageReport, RawMessage, Verdict};
use mailtriage::pipeline::{self, PipelineOptions};

fn raw(filename: &str, data: &[u8]) -> RawMessage {
    RawMessage {
        filename: filename.to_string(),
        data: data.to_vec(),
    }
}

// ─── Test 1: Identity resolution edge cases ─────────────────────────

#[test]
fn test_identity_name_and_address() {
    let id = Identity::resolve("John Doe <john@example.com>");
    assert_eq!(id.display_name.as_deref(), Some("John Doe"));
    assert_eq!(id.address, "john@example.com");
}

#[test]
fn test_identity_no_name_is_none() {
    for header in ["user@example.com", "<user@example.com>", "  user@example.com  "] {
        let id = Identity::resolve(header);
        assert_eq!(id.display_name, None, "header: {header}");
        assert_eq!(id.address, "user@example.com");
    }
}

#[test]
fn test_identity_garbage_falls_back_without_raising() {
    let id = Identity::resolve("<weird>>not-an-email");
    assert_eq!(id.display_name, None);
    assert_eq!(id.address, "<weird>>not-an-email");
}

// ─── Test 2: Plain-only multipart gets a preformatted preview ───────

#[test]
fn test_multipart_plain_only_preview() {
    let data = b"MIME-Version: 1.0\r\n\
From: a@b.com\r\n\
Content-Type: multipart/mixed; boundary=zz\r\n\r\n\
--zz\r\nContent-Type: text/plain\r\n\r\nLine one\r\n  indented line\r\n\
--zz--\r\n";
    let normalized =
        pipeline::normalize_message(&raw("m.eml", data), &PipelineOptions::default()).unwrap();

    let body_text = &normalized.record.body_text;
    assert!(body_text.contains("Line one"));
    assert!(body_text.contains("  indented line"), "inner whitespace kept");

    let preview = &normalized.report.preview_html;
    assert!(preview.starts_with("<pre style='white-space: pre-wrap;'>"));
    assert!(preview.ends_with("</pre>"));
    assert!(preview.contains("Line one"));
    assert!(preview.contains("  indented line"));
}

// ─── Test 3: Plain + HTML parts both feed the body text ─────────────

#[test]
fn test_multipart_plain_and_html() {
    let data = b"MIME-Version: 1.0\r\n\
From: a@b.com\r\n\
Content-Type: multipart/alternative; boundary=zz\r\n\r\n\
--zz\r\nContent-Type: text/plain\r\n\r\nPlain words here.\r\n\
--zz\r\nContent-Type: text/html\r\n\r\n<p>Rich words here.</p>\r\n\
--zz--\r\n";
    let normalized =
        pipeline::normalize_message(&raw("m.eml", data), &PipelineOptions::default()).unwrap();

    assert!(normalized.record.body_text.contains("Plain words here."));
    assert!(normalized.record.body_text.contains("Rich words here."));
    assert!(normalized
        .report
        .preview_html
        .contains("<p>Rich words here.</p>"));
}

// ─── Test 4: Attachment enumeration ─────────────────────────────────

#[test]
fn test_attachment_enumeration_skips_nameless() {
    let data = b"MIME-Version: 1.0\r\n\
From: a@b.com\r\n\
Content-Type: multipart/mixed; boundary=zz\r\n\r\n\
--zz\r\nContent-Type: text/plain\r\n\r\nBody\r\n\
--zz\r\nContent-Type: application/pdf\r\nContent-Disposition: attachment; filename=\"invoice.pdf\"\r\n\r\nAAAA\r\n\
--zz\r\nContent-Type: application/octet-stream\r\nContent-Disposition: attachment\r\n\r\nBBBB\r\n\
--zz--\r\n";
    let normalized =
        pipeline::normalize_message(&raw("m.eml", data), &PipelineOptions::default()).unwrap();
    assert_eq!(
        normalized.record.attachment_filenames,
        vec!["invoice.pdf".to_string()]
    );
}

// ─── Test 5: Feature extraction is deterministic ────────────────────

#[test]
fn test_feature_extraction_deterministic() {
    let body = "URGENT: verify your account NOW at http://phish.example.net \
                or email help@phish.example.net";
    let a = FeatureVector::compute(body);
    let b = FeatureVector::compute(body);
    assert_eq!(a, b);
    assert!(a.urgency_keyword_count >= 3);
    assert_eq!(a.link_count, 1);
    assert_eq!(a.unique_domain_count, 1);
    assert_eq!(a.embedded_email_count, 1);
}

// ─── Test 6: A bad stream never blocks the batch ────────────────────

#[test]
fn test_bad_message_is_isolated() {
    let messages = vec![
        raw("good1.eml", b"From: a@b.com\r\nSubject: One\r\n\r\nFirst body\r\n"),
        raw("broken.eml", b""),
        raw("good2.eml", b"From: c@d.com\r\nSubject: Two\r\n\r\nSecond body\r\n"),
    ];
    let outcome = pipeline::normalize_batch(&messages, &PipelineOptions::default(), 0, None);

    assert_eq!(outcome.reports.len(), 3);
    match &outcome.reports[1] {
        MessageReport::Failed(f) => {
            assert_eq!(f.filename, "broken.eml");
            assert!(f.error.starts_with("Parse error:"));
            assert!(!f.analytics.is_phishing);
        }
        MessageReport::Parsed(_) => panic!("broken.eml should be error-tagged"),
    }
    match &outcome.reports[2] {
        MessageReport::Parsed(p) => assert_eq!(p.subject, "Two"),
        MessageReport::Failed(_) => panic!("good2.eml should parse"),
    }
}

// ─── Test 7: Short verdict list merges positionally ─────────────────

#[test]
fn test_short_verdict_list_leaves_tail_at_defaults() {
    let messages: Vec<RawMessage> = (0..3)
        .map(|i| {
            raw(
                &format!("m{i}.eml"),
                format!("From: u{i}@example.com\r\nSubject: S{i}\r\n\r\nBody {i}\r\n").as_bytes(),
            )
        })
        .collect();
    let mut outcome = pipeline::normalize_batch(&messages, &PipelineOptions::default(), 1, None);

    let verdicts: Vec<Verdict> = serde_json::from_str(
        r#"[{"verdict": "phishing", "confidence": "high"},
            {"verdict": "legitimate", "confidence": "low"}]"#,
    )
    .unwrap();
    pipeline::merge_verdicts(&mut outcome.reports, &outcome.record_indices, &verdicts);

    assert!(outcome.reports[0].analytics().is_phishing);
    assert_eq!(outcome.reports[0].analytics().confidence, "high");
    assert!(!outcome.reports[1].analytics().is_phishing);
    assert_eq!(outcome.reports[1].analytics().confidence, "low");
    // No verdict for the last record: safe defaults.
    assert!(!outcome.reports[2].analytics().is_phishing);
    assert!(outcome.reports[2].analytics().confidence.is_empty());
    assert!(outcome.reports[2].analytics().reasons.is_empty());
}

// ─── Test 8: Classifier unavailability never raises ─────────────────

#[test]
fn test_unreachable_classifier_defaults_all_verdicts() {
    let mut config = Config::default();
    config.classifier = ClassifierConfig {
        // Discard port: nothing is listening.
        endpoint: "http://127.0.0.1:9/predict".to_string(),
        timeout_secs: 1,
    };

    let messages = vec![
        raw("a.eml", b"From: a@b.com\r\nSubject: A\r\n\r\nBody A\r\n"),
        raw("b.eml", b"From: c@d.com\r\nSubject: B\r\n\r\nBody B\r\n"),
    ];
    let reports = pipeline::analyze_batch(&messages, &config, None);

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(!report.analytics().is_phishing);
        assert!(report.analytics().confidence.is_empty());
        assert!(report.analytics().reasons.is_empty());
    }
}

// ─── Test 9: Reading messages from disk ─────────────────────────────

#[test]
fn test_raw_message_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.eml");
    std::fs::write(&path, b"From: a@b.com\r\nSubject: Disk\r\n\r\nHi\r\n").unwrap();

    let message = RawMessage::from_path(&path).unwrap();
    assert_eq!(message.filename, "hello.eml");

    let normalized =
        pipeline::normalize_message(&message, &PipelineOptions::default()).unwrap();
    assert_eq!(normalized.record.subject, "Disk");
}

#[test]
fn test_raw_message_missing_file() {
    let err = RawMessage::from_path("/no/such/message.eml").unwrap_err();
    assert!(matches!(
        err,
        mailtriage::error::TriageError::FileNotFound(_)
    ));
}

// ─── Test 10: Report JSON matches the result boundary ───────────────

#[test]
fn test_report_json_shape() {
    let messages = vec![raw(
        "m.eml",
        b"From: Alice <alice@example.com>\r\nTo: bob@example.com\r\nSubject: Hello\r\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\r\n\r\nHi Bob\r\n",
    )];
    let outcome = pipeline::normalize_batch(&messages, &PipelineOptions::default(), 1, None);
    let json = serde_json::to_value(&outcome.reports).unwrap();

    let entry = &json[0];
    assert_eq!(entry["filename"], "m.eml");
    assert_eq!(entry["subject"], "Hello");
    assert_eq!(entry["from"], "Alice <alice@example.com>");
    assert_eq!(entry["to"], "bob@example.com");
    assert!(entry["date"].as_str().unwrap().starts_with("2024-01-04"));
    assert!(entry["preview_html"].as_str().unwrap().contains("Hi Bob"));
    assert_eq!(entry["analytics"]["spf"], "unknown");
    assert_eq!(entry["analytics"]["is_phishing"], false);
}
