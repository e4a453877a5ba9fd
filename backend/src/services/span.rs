use chrono::Duration;

const MAX_MINUTES: i64 = 720;
const MAX_HOURS: i64 = 12;

/// Parse a cadence such as `"5m"` or `"2h"`.
///
/// Never fails: anything that is not `<digits><m|h>` falls back to one
/// minute, and magnitudes are clamped to 1..=720 minutes or 1..=12 hours.
pub fn parse_span(input: Option<&str>) -> Duration {
    let normalized = input.unwrap_or("").trim().to_lowercase();
    let normalized = if normalized.is_empty() {
        "1m"
    } else {
        normalized.as_str()
    };

    match split_span(normalized) {
        Some((qty, 'h')) => Duration::hours(qty.clamp(1, MAX_HOURS)),
        Some((qty, _)) => Duration::minutes(qty.clamp(1, MAX_MINUTES)),
        None => Duration::minutes(1),
    }
}

/// Canonical token for a parsed span, used in export filenames and titles.
pub fn span_label(step: Duration) -> String {
    if step.num_minutes() % 60 == 0 {
        format!("{}h", step.num_hours())
    } else {
        format!("{}m", step.num_minutes())
    }
}

fn split_span(s: &str) -> Option<(i64, char)> {
    let unit = s.chars().last()?;
    if unit != 'm' && unit != 'h' {
        return None;
    }
    let digits = &s[..s.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Overlong digit runs saturate instead of failing, then get clamped.
    let qty = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some((qty, unit))
}
