//! Small helpers shared by the config, auth and drive modules.

/// Longest error body carried into a user-facing message.
const MAX_ERROR_BODY_CHARS: usize = 180;

/// Trimmed text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `http://` or `https://` followed by a host.
pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    rest.and_then(|rest| rest.split(['/', '?', '#']).next())
        .is_some_and(|host| !host.is_empty())
}

/// Single-line excerpt of a response body for error messages.
pub fn compact_text(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return collapsed;
    }
    let mut excerpt = collapsed
        .chars()
        .take(MAX_ERROR_BODY_CHARS - 3)
        .collect::<String>();
    excerpt.push_str("...");
    excerpt
}

pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_dropped() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \n ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" client-id ".to_string())),
            Some("client-id".to_string())
        );
    }

    #[test]
    fn http_urls_need_a_host() {
        assert!(is_http_url("http://localhost:8080"));
        assert!(is_http_url("https://www.googleapis.com/drive/v3"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("https:///path"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("localhost:3000"));
    }

    #[test]
    fn error_bodies_are_flattened_and_capped() {
        assert_eq!(compact_text("<h1>Bad\n  Gateway</h1>\n"), "<h1>Bad Gateway</h1>");

        let excerpt = compact_text(&"x".repeat(500));
        assert_eq!(excerpt.chars().count(), 180);
        assert!(excerpt.ends_with("..."));
    }
}
