//! Configuration value parsers

use std::time::Duration;

/// Parse a duration string like "500ms", "30s", "2m" or "1m30s".
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let mut total_ms: u64 = 0;
    let mut digits = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let num: u64 = digits
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;
        digits.clear();

        let unit_ms = match c {
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            's' => 1_000,
            'm' => 60_000,
            'h' => 3_600_000,
            _ => return Err(format!("Unknown duration unit: {}", c)),
        };
        total_ms = num
            .checked_mul(unit_ms)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| format!("Duration too large: {}", s))?;
    }

    if !digits.is_empty() {
        return Err(format!("Missing unit in duration: {}", s));
    }
    if total_ms == 0 {
        return Err(format!("Invalid duration: {}", s));
    }

    Ok(Duration::from_millis(total_ms))
}
