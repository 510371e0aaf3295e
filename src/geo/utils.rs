/// Sentinel meaning "the caller's own public address"
pub const SELF_SENTINEL: &str = "my";

/// True for `my` and for an empty or blank address
pub fn is_self_sentinel(address: &str) -> bool {
    let address = address.trim();
    address.is_empty() || address == SELF_SENTINEL
}

/// Truncate string to at most `max_chars` characters, marking the cut with `...`
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Printable preview of a raw response body
pub fn payload_preview(body: &[u8], max_chars: usize) -> String {
    truncate_string(&String::from_utf8_lossy(body), max_chars)
}
