//! Hostname validation, normalization and scoping helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Hostname grammar: dot-separated labels of 1-63 alphanumeric/hyphen
/// characters (no leading or trailing hyphen), ending in an alphabetic TLD.
static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$")
        .expect("hostname pattern is valid")
});

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("filename pattern is valid"));

/// Check that a candidate string is a syntactically valid hostname.
pub fn validate_domain(candidate: &str) -> bool {
    HOSTNAME_RE.is_match(candidate)
}

/// Clean up a raw name as returned by a provider: trim, lowercase, drop the
/// root-label dot (`www.example.com.`) and a leading wildcard label
/// (`*.example.com` -> `example.com`).
pub fn normalize_candidate(raw: &str) -> String {
    let lowered = raw.trim().trim_end_matches('.').to_lowercase();
    match lowered.strip_prefix("*.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Strict suffix scoping: `candidate` is the root itself or ends with `.root`.
pub fn is_within_domain(candidate: &str, root: &str) -> bool {
    let candidate = candidate.to_ascii_lowercase();
    let root = root.trim().trim_end_matches('.').to_ascii_lowercase();
    if root.is_empty() {
        return false;
    }
    candidate == root || candidate.ends_with(&format!(".{}", root))
}

/// Normalize, validate and scope a raw name in one step.
pub fn accept_candidate(raw: &str, root: &str) -> Option<String> {
    let name = normalize_candidate(raw);
    if validate_domain(&name) && is_within_domain(&name, root) {
        Some(name)
    } else {
        None
    }
}

/// Replace characters that are not allowed in file names on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name, "_").into_owned()
}
