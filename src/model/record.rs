//! Classifier-ready records and result-boundary report types.

use chrono::{DateTime, Utc};

use super::address::Identity;
use crate::features::FeatureVector;

/// One raw input message: an opaque, possibly malformed MIME byte stream
/// plus the filename it arrived under.
///
/// Created at ingestion, consumed once, never mutated.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Identifier carried through to the per-message report.
    pub filename: String,
    /// The raw RFC 5322/MIME bytes.
    pub data: Vec<u8>,
}

impl RawMessage {
    /// Read a message from a file, using the file name as its identifier.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                crate::error::TriageError::FileNotFound(path.to_path_buf())
            } else {
                crate::error::TriageError::io(path, e)
            }
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, data })
    }
}

/// The model-ready summary of one message.
///
/// Owned by the pipeline invocation that created it; immutable after
/// assembly. Classifier verdicts are merged onto the sibling
/// [`MessageReport`], never back into the record. The flat wire shape the
/// classifier expects is built at the dispatch boundary in
/// [`crate::classifier`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct NormalizedRecord {
    /// Resolved sender identity.
    pub sender: Identity,

    /// Resolved primary recipient identity.
    pub recipient: Identity,

    /// Decoded subject line, `"(no subject)"` when the header is absent.
    pub subject: String,

    /// Trimmed plain-text body (plain parts plus tag-stripped HTML parts).
    pub body_text: String,

    /// Attachment filenames in document order, duplicates preserved.
    pub attachment_filenames: Vec<String>,

    /// Heuristic signals, present only when the feature stage is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
}

/// Authentication and classification annotations attached to each report.
///
/// `spf`/`dkim`/`dmarc` are header-derived placeholders; no protocol
/// evaluation happens anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Analytics {
    pub spf: String,
    pub dkim: String,
    pub dmarc: String,
    pub is_phishing: bool,
    pub confidence: String,
    pub reasons: Vec<String>,
}

impl Default for Analytics {
    fn default() -> Self {
        Self {
            spf: "unknown".to_string(),
            dkim: "unknown".to_string(),
            dmarc: "unknown".to_string(),
            is_phishing: false,
            confidence: String::new(),
            reasons: Vec::new(),
        }
    }
}

/// One classifier verdict, index-aligned with the dispatched records.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Verdict {
    /// `"phishing"` or `"legitimate"` (the shorthand `"legit"` is tolerated).
    #[serde(default)]
    pub verdict: String,

    /// Absent confidence merges as `"medium"`.
    #[serde(default)]
    pub confidence: Option<String>,

    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Verdict {
    /// Whether this verdict flags the message as phishing.
    pub fn is_phishing(&self) -> bool {
        self.verdict.eq_ignore_ascii_case("phishing")
    }
}

/// Result-boundary entry for one input message.
///
/// Parsed inputs carry the preview payload and analytics; inputs that were
/// structurally unparseable carry an error string instead, so one malformed
/// message never hides the rest of the batch.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum MessageReport {
    Parsed(ParsedReport),
    Failed(FailedReport),
}

/// Report for a message that parsed far enough to normalize.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParsedReport {
    pub filename: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    /// Safe, renderable HTML preview of the message body.
    pub preview_html: String,
    pub analytics: Analytics,
}

/// Report for an input that was not a parseable MIME stream.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailedReport {
    pub filename: String,
    pub error: String,
    pub analytics: Analytics,
}

impl MessageReport {
    /// The filename this report belongs to.
    pub fn filename(&self) -> &str {
        match self {
            Self::Parsed(r) => &r.filename,
            Self::Failed(r) => &r.filename,
        }
    }

    /// The analytics annotation.
    pub fn analytics(&self) -> &Analytics {
        match self {
            Self::Parsed(r) => &r.analytics,
            Self::Failed(r) => &r.analytics,
        }
    }

    /// Mutable access to the analytics annotation.
    pub fn analytics_mut(&mut self) -> &mut Analytics {
        match self {
            Self::Parsed(r) => &mut r.analytics,
            Self::Failed(r) => &mut r.analytics,
        }
    }
}

/// Output of the record-extraction surface (no classifier involved).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractionSummary {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<NormalizedRecord>,
}
