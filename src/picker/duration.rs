// 服务端下发的 Duration 字符串解析 ("3s", "1799.5s")

use once_cell::sync::Lazy;
use regex::Regex;

static SECONDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?s$").expect("static duration regex")
});

/// Parses `"<seconds>[.<fraction>]s"` into milliseconds (rounded).
/// Absent or malformed input yields `fallback_ms`.
pub fn parse_duration_ms(value: Option<&str>, fallback_ms: u64) -> u64 {
    let Some(value) = value else {
        return fallback_ms;
    };
    let Some(caps) = SECONDS_RE.captures(value.trim()) else {
        return fallback_ms;
    };

    let seconds: f64 = match caps[1].parse() {
        Ok(s) => s,
        Err(_) => return fallback_ms,
    };
    let fraction: f64 = caps
        .get(2)
        .and_then(|m| format!("0.{}", m.as_str()).parse().ok())
        .unwrap_or(0.0);

    ((seconds + fraction) * 1000.0).round() as u64
}
