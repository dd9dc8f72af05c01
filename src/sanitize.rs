//! Escaping and URL validation for feed-supplied strings.
//!
//! Everything a feed can author (titles, links, summaries) is untrusted and
//! passes through here before it reaches a render surface.

use tracing::warn;
use url::Url;

/// Default href for links whose URL fails validation.
pub const URL_FALLBACK: &str = "#";

/// Escapes the five HTML-special characters for safe text interpolation.
pub fn escape_html(text: &str) -> String {
    // '&' first so already-escaped output is not double-mangled.
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Returns `url` unchanged when it parses with an http or https scheme,
/// otherwise returns `fallback`. The accepted string is never re-encoded.
pub fn validate_url(url: &str, fallback: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => url.to_string(),
        Ok(parsed) => {
            warn!("rejected feed URL with scheme '{}'", parsed.scheme());
            fallback.to_string()
        }
        Err(_) => {
            warn!("rejected unparseable feed URL");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_specials() {
        assert_eq!(
            escape_html("<script>alert(\"xss\")</script>"),
            "&lt;script&gt;alert(&quot;xss&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("Tom & Jerry's"), "Tom &amp; Jerry&#39;s");
    }

    #[test]
    fn test_escape_html_ampersand_first() {
        // A pre-escaped entity gains exactly one more level of escaping.
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_escape_html_plain_text_untouched() {
        assert_eq!(escape_html("plain text 123"), "plain text 123");
        assert_eq!(escape_html(""), "");
    }

    #[test]
    fn test_validate_url_accepts_http_schemes() {
        let https = "https://example.com/post?id=1&x=%20y";
        assert_eq!(validate_url(https, "#"), https);
        assert_eq!(validate_url("http://example.com", "#"), "http://example.com");
    }

    #[test]
    fn test_validate_url_preserves_original_form() {
        // Accepted URLs must come back byte-for-byte, not normalized.
        let shouty = "HTTPS://Example.COM/Path";
        assert_eq!(validate_url(shouty, "#"), shouty);
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        assert_eq!(validate_url("javascript:alert(1)", "#"), "#");
        assert_eq!(validate_url("data:text/html,hi", "#"), "#");
        assert_eq!(validate_url("ftp://example.com/file", "#"), "#");
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        assert_eq!(validate_url("not a url", "#"), "#");
        assert_eq!(validate_url("", "#"), "#");
        assert_eq!(validate_url("//missing-scheme.com", "fallback"), "fallback");
    }
}
