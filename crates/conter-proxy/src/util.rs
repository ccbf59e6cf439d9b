//! Host and path helpers for the proxy listeners.

/// HTTP-01 challenge path prefix, reserved on the plaintext listener.
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// Extract the challenge token from a request path, when it is one.
pub fn extract_token(path: &str) -> Option<&str> {
    path.strip_prefix(ACME_CHALLENGE_PREFIX)
}

/// Strip the port suffix from a Host header value.
pub fn extract_domain(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((domain, port)) if port.chars().all(|c| c.is_ascii_digit()) => domain,
        _ => host,
    }
}

/// Rewrite an incoming request to the HTTPS scheme.
pub fn rewrite_to_https(host: &str, uri: &str) -> String {
    format!("https://{host}{uri}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_extraction() {
        assert_eq!(
            extract_token("/.well-known/acme-challenge/abc123"),
            Some("abc123")
        );
        assert_eq!(extract_token("/.well-known/acme-challenge/"), Some(""));
        assert_eq!(extract_token("/other/path"), None);
        assert_eq!(extract_token("/.well-known/acme-challenge"), None);
    }

    #[test]
    fn domain_extraction_strips_port() {
        assert_eq!(extract_domain("www.example.com:443"), "www.example.com");
        assert_eq!(extract_domain("www.example.com"), "www.example.com");
        assert_eq!(extract_domain("localhost:8080"), "localhost");
    }

    #[test]
    fn https_rewrite() {
        assert_eq!(
            rewrite_to_https("www.example.com", "/path?q=1"),
            "https://www.example.com/path?q=1"
        );
        assert_eq!(rewrite_to_https("www.example.com", ""), "https://www.example.com");
        assert_eq!(
            rewrite_to_https("www.example.com", "/pages/path/about.html"),
            "https://www.example.com/pages/path/about.html"
        );
    }
}
