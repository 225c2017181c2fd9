//! Sender/recipient identity resolution (RFC 5322 §3.4, tolerant of
//! malformed headers).

use std::sync::LazyLock;

use regex::Regex;

/// Canonical `local@domain` shape used by the last-resort scan.
static ADDRESS_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid address pattern")
});

/// A resolved message participant.
///
/// # Examples
/// - `"Juan García <Juan@Ejemplo.com>"` → `display_name = Some("Juan García")`,
///   `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = None`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    /// Human-readable display name, when one is recoverable.
    pub display_name: Option<String>,
    /// The bare email address, lower-cased. Falls back to the raw header
    /// text when no address shape is recoverable; empty only for empty input.
    pub address: String,
}

impl Identity {
    /// An identity with no recoverable information.
    pub fn empty() -> Self {
        Self {
            display_name: None,
            address: String::new(),
        }
    }

    /// Build an identity from an already-parsed mailbox (name + address).
    pub fn from_parts(name: Option<&str>, address: &str) -> Self {
        let display_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        Self {
            display_name,
            address: address.trim().to_lowercase(),
        }
    }

    /// Resolve an identity from a raw header value.
    ///
    /// Ordered fallback chain, no step ever fails:
    /// 1. Isolate the first mailbox of a comma-joined list (quoted and
    ///    angle-bracketed commas do not split).
    /// 2. `Display Name <address>` form, accepted only when the bracketed
    ///    text contains `@`; the text outside the brackets, stripped of
    ///    quotes, becomes the display name.
    /// 3. A bare token containing `@` is taken verbatim as the address.
    /// 4. The first `local@domain`-shaped substring of the whole header.
    /// 5. The entire raw string, verbatim.
    ///
    /// The address is lower-cased on every path.
    pub fn resolve(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::empty();
        }

        let primary = first_mailbox(trimmed);

        if let Some(identity) = parse_angle_form(primary) {
            return identity;
        }

        // Bare address: a single token such as "user@example.com".
        if primary.contains('@') && !primary.contains(char::is_whitespace) {
            return Self {
                display_name: None,
                address: primary.to_lowercase(),
            };
        }

        // Scan the whole header for anything address-shaped.
        if let Some(m) = ADDRESS_SHAPE.find(trimmed) {
            return Self {
                display_name: None,
                address: m.as_str().to_lowercase(),
            };
        }

        // Nothing recoverable: keep the raw text so no information is lost.
        Self {
            display_name: None,
            address: trimmed.to_lowercase(),
        }
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} <{}>", name, self.address),
            None => self.address.clone(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Return the first mailbox of a comma-separated list.
///
/// Commas inside double quotes or angle brackets do not split:
/// `"Last, First" <a@b.com>, other@c.com` yields the quoted mailbox whole.
fn first_mailbox(raw: &str) -> &str {
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;

    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                let segment = raw[start..i].trim();
                if !segment.is_empty() {
                    return segment;
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = raw[start..].trim();
    if tail.is_empty() {
        raw.trim()
    } else {
        tail
    }
}

/// Parse the `Display Name <address>` form.
///
/// Returns `None` unless a bracket pair encloses something containing `@`,
/// so `"<weird>>not-an-email"` falls through to the later strategies.
fn parse_angle_form(segment: &str) -> Option<Identity> {
    let open = segment.rfind('<')?;
    let close = open + segment[open..].find('>')?;
    let candidate = segment[open + 1..close].trim();
    if candidate.is_empty() || !candidate.contains('@') {
        return None;
    }

    let mut name = String::new();
    name.push_str(segment[..open].trim());
    let after = segment[close + 1..].trim();
    if !after.is_empty() {
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(after);
    }
    let name = strip_quotes(&name);

    Some(Identity {
        display_name: if name.is_empty() { None } else { Some(name) },
        address: candidate.to_lowercase(),
    })
}

/// Strip surrounding double or single quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|t| t.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_name_and_address() {
        let id = Identity::resolve("John Doe <john@example.com>");
        assert_eq!(id.display_name.as_deref(), Some("John Doe"));
        assert_eq!(id.address, "john@example.com");
    }

    #[test]
    fn test_resolve_bare_address() {
        let id = Identity::resolve("user@example.com");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "user@example.com");
    }

    #[test]
    fn test_resolve_angle_only() {
        let id = Identity::resolve("<user@example.com>");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "user@example.com");
    }

    #[test]
    fn test_resolve_quoted_name() {
        let id = Identity::resolve("\"Last, First\" <user@example.com>");
        assert_eq!(id.display_name.as_deref(), Some("Last, First"));
        assert_eq!(id.address, "user@example.com");
    }

    #[test]
    fn test_resolve_lowercases_address() {
        let id = Identity::resolve("Alice <Alice@Example.COM>");
        assert_eq!(id.address, "alice@example.com");
        assert_eq!(id.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_resolve_first_mailbox_only() {
        let id = Identity::resolve("User One <a@b.com>, User Two <c@d.com>");
        assert_eq!(id.display_name.as_deref(), Some("User One"));
        assert_eq!(id.address, "a@b.com");
    }

    #[test]
    fn test_resolve_quoted_comma_not_a_separator() {
        let id = Identity::resolve("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(id.display_name.as_deref(), Some("Last, First"));
        assert_eq!(id.address, "a@b.com");
    }

    #[test]
    fn test_resolve_embedded_address_without_brackets() {
        let id = Identity::resolve("reply to john.doe@example.org please");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "john.doe@example.org");
    }

    #[test]
    fn test_resolve_malformed_brackets_falls_back_to_raw() {
        let id = Identity::resolve("<weird>>not-an-email");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "<weird>>not-an-email");
    }

    #[test]
    fn test_resolve_no_address_shape_keeps_raw() {
        let id = Identity::resolve("Mailer Daemon");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "mailer daemon");
    }

    #[test]
    fn test_resolve_empty() {
        let id = Identity::resolve("");
        assert_eq!(id, Identity::empty());
    }

    #[test]
    fn test_from_parts_blank_name_is_none() {
        let id = Identity::from_parts(Some("  "), "User@Example.com");
        assert_eq!(id.display_name, None);
        assert_eq!(id.address, "user@example.com");
    }

    #[test]
    fn test_display_with_and_without_name() {
        let named = Identity::from_parts(Some("Alice"), "alice@example.com");
        assert_eq!(named.display(), "Alice <alice@example.com>");
        let bare = Identity::from_parts(None, "alice@example.com");
        assert_eq!(bare.display(), "alice@example.com");
    }
}
