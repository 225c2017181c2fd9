//! MIME body extraction: part-tree traversal, body selection, attachment
//! listing, and HTML-to-text conversion.

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};

/// Maximum nesting depth for multipart traversal. Parts nested deeper than
/// this (adversarial input) are ignored rather than recursed into.
const MAX_PART_DEPTH: usize = 10;

/// Preview payload used when a message has no decodable body at all.
pub const NO_CONTENT_PLACEHOLDER: &str = "<p>No content</p>";

/// Both renderings of a message body.
///
/// `text` feeds the classifier record; `html` is the independent preview
/// payload. The two may overlap: plain parts and tag-stripped HTML parts
/// both contribute to `text`.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBody {
    /// Trimmed plain-text rendering.
    pub text: String,
    /// Renderable HTML: the first HTML leaf, a preformatted wrapper of the
    /// plain text, or the no-content placeholder.
    pub html: String,
}

/// Select and combine the body renderings of a parsed message.
///
/// Walks every part in document order. Attachment-disposition parts are
/// skipped (unless the message is a bare single part, whose payload is the
/// body no matter how it is labelled). Every plain-text leaf is accumulated
/// into `text`, newline-joined; the first HTML leaf becomes the canonical
/// `html` and each HTML leaf also contributes its tag-stripped text.
pub fn extract_body(msg: &Message<'_>) -> ExtractedBody {
    let parts = collect_parts(msg);
    let single = parts.len() == 1;

    let mut text = String::new();
    let mut html: Option<String> = None;

    for part in &parts {
        if !single && is_attachment(part) {
            continue;
        }
        match &part.body {
            PartType::Text(t) => {
                text.push_str(t.as_ref());
                text.push('\n');
            }
            PartType::Html(h) => {
                if html.is_none() {
                    html = Some(h.as_ref().to_string());
                }
                text.push_str(&html_to_text(h.as_ref()));
                text.push('\n');
            }
            PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
                // Text-declared payload that the parser could not decode
                // (unrecognized charset label): decode it ourselves.
                let Some(ct) = part.content_type() else {
                    continue;
                };
                if !ct.ctype().eq_ignore_ascii_case("text") {
                    continue;
                }
                let charset = ct.attribute("charset");
                let decoded = decode_text_payload(bytes, charset);
                if ct
                    .subtype()
                    .is_some_and(|s| s.eq_ignore_ascii_case("html"))
                {
                    if html.is_none() {
                        html = Some(decoded.clone());
                    }
                    text.push_str(&html_to_text(&decoded));
                } else {
                    text.push_str(&decoded);
                }
                text.push('\n');
            }
            _ => {}
        }
    }

    let text = text.trim().to_string();
    let html = match html {
        Some(h) => h,
        None if !text.is_empty() => preformatted(&text),
        None => NO_CONTENT_PLACEHOLDER.to_string(),
    };

    ExtractedBody { text, html }
}

/// List attachment filenames in document order.
///
/// Only parts whose disposition is `attachment` and which declare a
/// filename are included; nameless attachments are silently skipped.
/// Duplicates are preserved.
pub fn attachment_names(msg: &Message<'_>) -> Vec<String> {
    collect_parts(msg)
        .into_iter()
        .filter(|p| is_attachment(p))
        .filter_map(|p| p.attachment_name().map(String::from))
        .collect()
}

/// Collect every part of the message in document order (parents before
/// children), using an explicit stack bounded by [`MAX_PART_DEPTH`].
fn collect_parts<'a>(msg: &'a Message<'a>) -> Vec<&'a MessagePart<'a>> {
    let mut parts = Vec::new();
    let mut stack: Vec<(&Message<'_>, usize, usize)> = vec![(msg, 0, 0)];

    while let Some((m, id, depth)) = stack.pop() {
        if depth > MAX_PART_DEPTH {
            continue;
        }
        let Some(part) = m.parts.get(id) else {
            continue;
        };
        parts.push(part);
        match &part.body {
            PartType::Multipart(children) => {
                for &child in children.iter().rev() {
                    stack.push((m, child, depth + 1));
                }
            }
            PartType::Message(nested) => {
                stack.push((nested, 0, depth + 1));
            }
            _ => {}
        }
    }

    parts
}

/// Whether a part's disposition marks it as an attachment.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .map(|cd| cd.ctype().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

/// Decode a text payload by its declared charset label, defaulting to
/// lossy UTF-8. Undecodable bytes become replacement characters.
fn decode_text_payload(bytes: &[u8], charset: Option<&str>) -> String {
    match charset.and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes())) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Wrap plain text in an escaped, whitespace-preserving block so it renders
/// losslessly as HTML.
pub fn preformatted(text: &str) -> String {
    format!(
        "<pre style='white-space: pre-wrap;'>{}</pre>",
        escape_html(text)
    )
}

/// Escape the HTML metacharacters `& < > " '`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Tags whose boundaries become line breaks in the text rendering.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "tr", "li", "ul", "ol", "table", "blockquote", "h1", "h2", "h3", "h4", "h5",
    "h6",
];

/// Convert HTML to plain text.
///
/// - Removes `<script>` and `<style>` blocks entirely
/// - Block-level tag boundaries become newlines
/// - Strips all remaining tags
/// - Decodes common HTML entities
/// - Collapses runs of blank lines
pub fn html_to_text(html: &str) -> String {
    let without_scripts = remove_tag_block(html, "script");
    let without_styles = remove_tag_block(&without_scripts, "style");

    let mut flat = String::with_capacity(without_styles.len());
    let mut rest = without_styles.as_str();

    while let Some(start) = rest.find('<') {
        flat.push_str(&rest[..start]);
        let tag_rest = &rest[start + 1..];
        match tag_rest.find('>') {
            Some(end) => {
                let name = tag_rest[..end]
                    .trim_start_matches('/')
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if BLOCK_TAGS.contains(&name.as_str()) {
                    flat.push('\n');
                }
                rest = &tag_rest[end + 1..];
            }
            None => {
                // Unterminated tag: drop the remainder.
                rest = "";
            }
        }
    }
    flat.push_str(rest);

    let decoded = decode_entities(&flat);

    // Collapse multiple blank lines and trim each line.
    let mut cleaned = String::with_capacity(decoded.len());
    let mut prev_was_blank = false;
    for line in decoded.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Decode the entities that commonly appear in mail bodies. `&amp;` is
/// decoded last so sequences like `&amp;lt;` stay literal.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&amp;", "&")
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitive.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    while let Some(start) = remaining.to_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        if let Some(end) = after.to_lowercase().find(&close) {
            remaining = &after[end + close.len()..];
        } else {
            // No closing tag: drop the rest.
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);
    result
}
