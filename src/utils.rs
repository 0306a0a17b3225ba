use std::borrow::Cow;

/// Truncate a string to at most `max_bytes` bytes without splitting a multi-byte
/// character. Returns the original string if it already fits.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line excerpt of user or model text for log fields.
///
/// Newlines are flattened and anything past `max_bytes` is replaced by `…`.
pub fn preview(s: &str, max_bytes: usize) -> Cow<'_, str> {
    let cut = safe_truncate(s, max_bytes);
    let truncated = cut.len() < s.len();
    if !truncated && !cut.contains(['\n', '\r']) {
        return Cow::Borrowed(cut);
    }
    let mut out = cut.replace(['\n', '\r'], " ");
    if truncated {
        out.push('…');
    }
    Cow::Owned(out)
}
