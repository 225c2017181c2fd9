//! The per-message normalization pipeline and batch analysis driver.
//!
//! Each message is normalized independently (parse, identity resolution,
//! body selection, attachment listing, optional feature extraction); the
//! batch then makes a single classifier call and merges verdicts back onto
//! the per-message reports.

use std::sync::atomic::{AtomicUsize, Ordering};

use mail_parser::{Address, Message, MessageParser};
use tracing::{debug, warn};

use crate::classifier::ClassifierClient;
use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::features::FeatureVector;
use crate::model::address::Identity;
use crate::model::record::{
    Analytics, FailedReport, MessageReport, NormalizedRecord, ParsedReport, RawMessage, Verdict,
};
use crate::parser::mime;

/// Toggleable pipeline stages. Both default to off, reproducing the
/// baseline record shape; either can be enabled independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Compute a [`FeatureVector`] for each record.
    pub extract_features: bool,
    /// Read `Authentication-Results` header values into the analytics
    /// placeholders. Never performs SPF/DKIM/DMARC evaluation.
    pub authentication: bool,
}

impl PipelineOptions {
    /// Stage toggles as configured.
    pub fn from_config(config: &Config) -> Self {
        Self {
            extract_features: config.pipeline.extract_features,
            authentication: config.pipeline.authentication,
        }
    }
}

/// Everything the batch keeps for one successfully normalized message.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub record: NormalizedRecord,
    pub report: ParsedReport,
}

/// Outcome of normalizing a whole batch, before classification.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One report per input, in input order.
    pub reports: Vec<MessageReport>,
    /// Records for the inputs that parsed, in input order.
    pub records: Vec<NormalizedRecord>,
    /// Maps record position to its report index, so verdicts only ever
    /// land on the reports they were computed for.
    pub record_indices: Vec<usize>,
}

/// Normalize one raw message into a record and its report skeleton.
///
/// The only hard failure is a byte stream the MIME parser rejects outright;
/// every other irregularity degrades to an empty or default field.
pub fn normalize_message(
    raw: &RawMessage,
    options: &PipelineOptions,
) -> Result<NormalizedMessage> {
    let msg = MessageParser::default().parse(&raw.data).ok_or_else(|| {
        TriageError::UnparseableMessage {
            filename: raw.filename.clone(),
        }
    })?;

    let sender = resolve_participant(msg.from(), msg.header_raw("From"));
    let recipient = resolve_participant(msg.to(), msg.header_raw("To"));

    let subject = msg
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("(no subject)")
        .to_string();

    let body = mime::extract_body(&msg);
    let attachment_filenames = mime::attachment_names(&msg);

    let features = options
        .extract_features
        .then(|| FeatureVector::compute(&body.text));

    let mut analytics = Analytics::default();
    if options.authentication {
        apply_authentication_results(&msg, &mut analytics);
    }

    let date = msg.date().map(|d| d.to_rfc3339()).unwrap_or_default();

    let report = ParsedReport {
        filename: raw.filename.clone(),
        subject: subject.clone(),
        from: sender.display(),
        to: recipient.display(),
        date,
        preview_html: body.html,
        analytics,
    };

    let record = NormalizedRecord {
        sender,
        recipient,
        subject,
        body_text: body.text,
        attachment_filenames,
        features,
    };

    Ok(NormalizedMessage { record, report })
}

/// Resolve a participant, preferring the standards-parsed mailbox and
/// falling back to the raw-header resolution chain.
fn resolve_participant(parsed: Option<&Address<'_>>, raw: Option<&str>) -> Identity {
    if let Some(addr) = parsed.and_then(|a| a.first()) {
        if let Some(address) = addr.address() {
            return Identity::from_parts(addr.name(), address);
        }
    }
    raw.map(str::trim)
        .map(Identity::resolve)
        .unwrap_or_else(Identity::empty)
}

/// Copy `spf=`/`dkim=`/`dmarc=` result tokens out of an existing
/// `Authentication-Results` header. Values are reported verbatim
/// (lower-cased); absent methods keep their `"unknown"` placeholder.
fn apply_authentication_results(msg: &Message<'_>, analytics: &mut Analytics) {
    let Some(raw) = msg.header_raw("Authentication-Results") else {
        return;
    };
    for segment in raw.split(';') {
        if let Some(value) = method_result(segment, "spf") {
            analytics.spf = value;
        } else if let Some(value) = method_result(segment, "dkim") {
            analytics.dkim = value;
        } else if let Some(value) = method_result(segment, "dmarc") {
            analytics.dmarc = value;
        }
    }
}

/// Extract the result token of one authentication method from a header
/// segment such as `"spf=pass (sender ip is ...)"`.
fn method_result(segment: &str, method: &str) -> Option<String> {
    let rest = segment.trim().strip_prefix(method)?.strip_prefix('=')?;
    let value: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '(' && *c != ';')
        .collect();
    if value.is_empty() {
        None
    } else {
        Some(value.to_lowercase())
    }
}

/// Normalize a whole batch on a bounded worker pool.
///
/// Workers share only the read-only options; results are reassembled in
/// input order. `progress` receives `(processed, total)` as messages finish.
pub fn normalize_batch(
    messages: &[RawMessage],
    options: &PipelineOptions,
    worker_threads: usize,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> BatchOutcome {
    let total = messages.len();
    let workers = effective_workers(worker_threads, total);
    let done = AtomicUsize::new(0);

    let tick = |outcome| {
        if let Some(cb) = progress {
            cb(done.fetch_add(1, Ordering::Relaxed) + 1, total);
        }
        outcome
    };

    let per_message: Vec<Result<NormalizedMessage>> = if workers <= 1 {
        messages
            .iter()
            .map(|m| tick(normalize_message(m, options)))
            .collect()
    } else {
        let chunk_size = total.div_ceil(workers);
        debug!(total, workers, chunk_size, "normalizing batch");
        std::thread::scope(|scope| {
            let handles: Vec<_> = messages
                .chunks(chunk_size)
                .map(|chunk| {
                    let tick = &tick;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|m| tick(normalize_message(m, options)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().expect("normalization worker panicked"))
                .collect()
        })
    };

    let mut outcome = BatchOutcome::default();
    for (raw, normalized) in messages.iter().zip(per_message) {
        match normalized {
            Ok(NormalizedMessage { record, report }) => {
                outcome.record_indices.push(outcome.reports.len());
                outcome.records.push(record);
                outcome.reports.push(MessageReport::Parsed(report));
            }
            Err(e) => {
                warn!(filename = %raw.filename, error = %e, "skipping unparseable message");
                outcome.reports.push(MessageReport::Failed(FailedReport {
                    filename: raw.filename.clone(),
                    error: format!("Parse error: {e}"),
                    analytics: Analytics::default(),
                }));
            }
        }
    }
    outcome
}

/// Merge classifier verdicts onto the reports their records came from.
///
/// Verdict *i* belongs to record *i*; a short verdict list merges only as
/// many entries as were returned, and surplus verdicts are ignored.
pub fn merge_verdicts(
    reports: &mut [MessageReport],
    record_indices: &[usize],
    verdicts: &[Verdict],
) {
    for (verdict, &report_idx) in verdicts.iter().zip(record_indices) {
        let analytics = reports[report_idx].analytics_mut();
        analytics.is_phishing = verdict.is_phishing();
        analytics.confidence = verdict
            .confidence
            .clone()
            .unwrap_or_else(|| "medium".to_string());
        analytics.reasons = verdict.reasons.clone();
    }
}

/// Full batch analysis: normalize, classify once, merge.
///
/// Classifier unavailability is logged and recovered; the reports always
/// come back, at worst with default analytics.
pub fn analyze_batch(
    messages: &[RawMessage],
    config: &Config,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Vec<MessageReport> {
    let options = PipelineOptions::from_config(config);
    let mut outcome = normalize_batch(
        messages,
        &options,
        config.performance.worker_threads,
        progress,
    );

    if !outcome.records.is_empty() {
        match ClassifierClient::new(&config.classifier) {
            Ok(client) => {
                let verdicts = client.classify(&outcome.records);
                merge_verdicts(&mut outcome.reports, &outcome.record_indices, &verdicts);
            }
            Err(e) => {
                warn!(error = %e, "classifier client unavailable; keeping default analytics");
            }
        }
    }

    outcome.reports
}

/// Pool size: the configured count, or one worker per available core when
/// zero, never more than there are messages.
fn effective_workers(configured: usize, message_count: usize) -> usize {
    let base = if configured > 0 {
        configured
    } else {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    };
    base.clamp(1, message_count.max(1))
}
