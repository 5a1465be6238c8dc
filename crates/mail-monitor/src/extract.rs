//! Candidate-link extraction from free-text message bodies.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("url regex compiles"));

/// Path/query markers that make a link look like an authentication link.
const AUTH_MARKERS: &[&str] = &[
    "magic", "verify", "confirm", "reset", "token", "auth", "login", "signin", "activate",
    "invite", "otp",
];

/// Pull candidate authentication links out of a message body.
///
/// The mailbox contract is "zero or more candidate link strings per poll";
/// this is the filter that turns arbitrary text into those candidates.
pub fn extract_auth_links(body: &str) -> Vec<String> {
    URL_RE
        .find_iter(body)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .filter(|url| {
            let lower = url.to_ascii_lowercase();
            AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_magic_link_in_plain_text() {
        let body = "Welcome!\n\nClick here to sign in:\nhttps://app.example.com/auth/magic?token=abc123\n\nThanks";
        let links = extract_auth_links(body);
        assert_eq!(
            links,
            vec!["https://app.example.com/auth/magic?token=abc123"]
        );
    }

    #[test]
    fn ignores_unrelated_links() {
        let body = "Read our blog at https://example.com/blog and https://example.com/pricing.";
        assert!(extract_auth_links(body).is_empty());
    }

    #[test]
    fn strips_trailing_punctuation() {
        let body = "Verify here: https://example.com/verify?t=1.";
        assert_eq!(extract_auth_links(body), vec!["https://example.com/verify?t=1"]);
    }

    #[test]
    fn multiple_candidates_per_body() {
        let body = "https://a.test/reset?t=1 or https://a.test/login";
        assert_eq!(extract_auth_links(body).len(), 2);
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(extract_auth_links("").is_empty());
    }
}
