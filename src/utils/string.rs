//! UTF-8 safe string helpers.
//!
//! Every helper counts Unicode scalar values (chars) rather than bytes, so
//! slicing never panics on multibyte characters.

/// Suffix appended by [`truncate_string`].
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Default limit used by [`truncate_string`] callers that have no better bound.
pub const DEFAULT_TRUNCATE_LEN: usize = 1000;

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Cut `s` to at most `max_len` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let mut out = prefix_chars(s, max_len);
        out.push_str(TRUNCATION_MARKER);
        out
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_basic_ascii() {
        let s = "hello world";
        assert_eq!(preview(s, 5), "hello...");
        assert_eq!(preview(s, 20), "hello world");
    }

    #[test]
    fn preview_multibyte() {
        let s = "温度传感器读数正常，湿度偏高";
        let p = preview(s, 4);
        assert_eq!(p, "温度传感...");
    }

    #[test]
    fn truncate_short_string_unchanged() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("exact", 5), "exact");
    }

    #[test]
    fn truncate_long_string_gets_marker() {
        let long = "A".repeat(100);
        let truncated = truncate_string(&long, 50);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), 50 + TRUNCATION_MARKER.len());
    }
}
