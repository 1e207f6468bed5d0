/// Truncate a string to `max_chars` characters, appending "..." if truncated.
///
/// Counts characters rather than bytes, so message bodies with emoji or
/// non-Latin text never split inside a code point.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Mask a Slack token for logs, keeping only its type prefix (`xoxb-`).
pub fn redact_token(token: &str) -> String {
    match token.split_once('-') {
        Some((prefix, rest)) if !rest.is_empty() => format!("{prefix}-***"),
        _ => "***".to_string(),
    }
}
