//! Browser fingerprint extraction.
//!
//! Derives a stable hash from identity-relevant request signals when the
//! client does not carry an explicit identity cookie. The extraction is a
//! pure function of the signals: missing headers collapse to empty strings
//! and are filtered before hashing, so two requests differing only in which
//! headers are *absent* versus *empty* produce the same fingerprint.

/// Delimiter joining signal values before hashing. Chosen so it cannot occur
/// inside a well-formed header value.
const SIGNAL_DELIMITER: &str = "###";

/// Identity-relevant attributes of an inbound request.
///
/// All fields are optional; an absent header and an empty header are
/// equivalent. The surrounding HTTP layer is responsible for pulling these
/// out of whatever request type it uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSignals {
    /// A previously issued identity cookie, if the client sent one.
    pub identity_cookie: Option<String>,
    /// The `User-Agent` header.
    pub user_agent: Option<String>,
    /// The `Accept-Language` header.
    pub accept_language: Option<String>,
    /// The `Sec-Ch-Ua` client-hint brand header.
    pub client_hints: Option<String>,
}

/// A hashed browser fingerprint plus its human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Fixed-length hex digest of the joined signals; the unique lookup key.
    pub browser_hash: String,
    /// Diagnostic summary of the raw signals. Stored, never parsed.
    pub browser_info: String,
}

/// Outcome of examining a request's identity signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The client presented an identity cookie; its value is the final
    /// identifier and the fingerprint pipeline is bypassed entirely.
    Existing(String),
    /// No cookie; identity must be resolved from the fingerprint.
    Fingerprint(Fingerprint),
}

/// Extracts the client identity signals into an [`Identity`].
///
/// A present, non-empty identity cookie wins outright. Otherwise the
/// user-agent, accept-language, and client-hint values are joined (empty
/// ones skipped) and digested with BLAKE3 into a 64-char hex `browser_hash`.
///
/// # Example
///
/// ```
/// use imprint::{extract, ClientSignals, Identity};
///
/// let signals = ClientSignals {
///     user_agent: Some("Mozilla/5.0".into()),
///     accept_language: Some("en-US".into()),
///     ..Default::default()
/// };
///
/// match extract(&signals) {
///     Identity::Fingerprint(fp) => assert_eq!(fp.browser_hash.len(), 64),
///     Identity::Existing(_) => unreachable!("no cookie was set"),
/// }
/// ```
pub fn extract(signals: &ClientSignals) -> Identity {
    match signals.identity_cookie.as_deref() {
        Some(cookie) if !cookie.is_empty() => return Identity::Existing(cookie.to_owned()),
        _ => {}
    }

    let ua = signals.user_agent.as_deref().unwrap_or_default();
    let lang = signals.accept_language.as_deref().unwrap_or_default();
    let hints = signals.client_hints.as_deref().unwrap_or_default();

    let source = [ua, lang, hints]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(SIGNAL_DELIMITER);

    let browser_hash = blake3::hash(source.as_bytes()).to_hex().to_string();
    let browser_info = format!("UA: {ua}, Lang: {lang}, Sec-Ch-Ua: {hints}");

    Identity::Fingerprint(Fingerprint {
        browser_hash,
        browser_info,
    })
}
