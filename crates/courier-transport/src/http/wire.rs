//! Wire conventions shared by both sides of the HTTP binding.
//!
//! | Concern | Wire form |
//! |---------|-----------|
//! | Payload type | `Content-Type`, see [`content_type_to_wire`] |
//! | Timeout | `X-Dispatch-Timeout`, e.g. `1m30s` or `250ms` |
//! | Target address | `X-Dispatch-Address` |
//! | Credentials | HTTP basic auth |

use std::fmt::Write;
use std::time::Duration;

use courier_core::ContentType;

/// Header carrying the caller's timeout.
pub const TIMEOUT_HEADER: &str = "X-Dispatch-Timeout";

/// Header carrying the request address.
pub const ADDRESS_HEADER: &str = "X-Dispatch-Address";

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";
pub const X_PROTOBUF: &str = "application/x-protobuf";
pub const APPLICATION_JSON: &str = "application/json";

/// Maps a payload content type to its `Content-Type` value.
pub fn content_type_to_wire(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Bytes => OCTET_STREAM,
        ContentType::Text => TEXT_PLAIN,
        ContentType::Encoded => X_PROTOBUF,
        ContentType::Structured => APPLICATION_JSON,
    }
}

/// Maps a `Content-Type` value back to a payload content type.
///
/// Parameters such as `charset` are ignored. Anything unrecognized is
/// treated as raw bytes.
pub fn content_type_from_wire(value: &str) -> ContentType {
    let essence = value.split(';').next().unwrap_or_default().trim();

    if essence.eq_ignore_ascii_case(TEXT_PLAIN) {
        ContentType::Text
    } else if essence.eq_ignore_ascii_case(X_PROTOBUF) {
        ContentType::Encoded
    } else if essence.eq_ignore_ascii_case(APPLICATION_JSON) {
        ContentType::Structured
    } else {
        ContentType::Bytes
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

/// Writes `value / unit` with the fractional part trimmed of trailing zeros.
fn write_fraction(out: &mut String, value: u128, unit: u128) {
    let whole = value / unit;
    let rest = value % unit;
    let _ = write!(out, "{whole}");
    if rest != 0 {
        let width = unit.ilog10() as usize;
        let digits = format!("{rest:0width$}");
        let _ = write!(out, ".{}", digits.trim_end_matches('0'));
    }
}

/// Formats a duration the way the timeout header expects.
///
/// Sub-second values use a single unit (`1.5µs`, `250ms`); longer ones are
/// spelled out as hours, minutes and seconds (`1h2m3.5s`, `1m0s`).
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    let mut out = String::new();

    if nanos == 0 {
        out.push_str("0s");
    } else if nanos < NANOS_PER_MICRO {
        let _ = write!(out, "{nanos}ns");
    } else if nanos < NANOS_PER_MILLI {
        write_fraction(&mut out, nanos, NANOS_PER_MICRO);
        out.push_str("µs");
    } else if nanos < NANOS_PER_SEC {
        write_fraction(&mut out, nanos, NANOS_PER_MILLI);
        out.push_str("ms");
    } else {
        let hours = nanos / NANOS_PER_HOUR;
        let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MIN;
        let seconds = nanos % NANOS_PER_MIN;
        if hours > 0 {
            let _ = write!(out, "{hours}h{minutes}m");
        } else if minutes > 0 {
            let _ = write!(out, "{minutes}m");
        }
        write_fraction(&mut out, seconds, NANOS_PER_SEC);
        out.push('s');
    }
    out
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => NANOS_PER_MICRO,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SEC,
        "m" => NANOS_PER_MIN,
        "h" => NANOS_PER_HOUR,
        _ => return None,
    })
}

/// Parses a duration written as a sequence of `<number><unit>` terms.
///
/// Accepts the output of [`format_duration`] as well as forms like `1.5h`
/// or `2m30s`. A leading `+` is allowed; negative durations and unknown
/// units yield `None`. The bare string `0` is zero.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit = unit_nanos(unit)?;
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        total = total.checked_add(whole.checked_mul(unit)?)?;

        // Digits past nanosecond precision cannot change the result.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let scale = 10u128.pow(fraction.len() as u32);
            let digits: u128 = fraction.parse().ok()?;
            total = total.checked_add(digits.checked_mul(unit)? / scale)?;
        }
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_to_wire(ContentType::Bytes), "application/octet-stream");
        assert_eq!(content_type_to_wire(ContentType::Text), "text/plain");
        assert_eq!(content_type_to_wire(ContentType::Encoded), "application/x-protobuf");
        assert_eq!(content_type_to_wire(ContentType::Structured), "application/json");

        assert_eq!(content_type_from_wire("text/plain"), ContentType::Text);
        assert_eq!(content_type_from_wire("text/plain; charset=utf-8"), ContentType::Text);
        assert_eq!(content_type_from_wire("Application/JSON"), ContentType::Structured);
        assert_eq!(content_type_from_wire("application/x-protobuf"), ContentType::Encoded);
        assert_eq!(content_type_from_wire("image/png"), ContentType::Bytes);
        assert_eq!(content_type_from_wire(""), ContentType::Bytes);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_nanos(42)), "42ns");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(format_duration(Duration::from_millis(150)), "150ms");
        assert_eq!(format_duration(Duration::from_micros(2_250)), "2.25ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1s");
        assert_eq!(format_duration(Duration::from_millis(3_500)), "3.5s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m0s");
        assert_eq!(format_duration(Duration::from_millis(3_723_500)), "1h2m3.5s");
        assert_eq!(format_duration(Duration::from_secs(7_200)), "2h0m0s");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("150ms"), Some(Duration::from_millis(150)));
        assert_eq!(parse_duration("1h2m3.5s"), Some(Duration::from_millis(3_723_500)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("+2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("10µs"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration(".5s"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_duration_rejects() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("5 parsecs"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("."), None);
    }

    #[test]
    fn test_format_parses_back() {
        for duration in [
            Duration::from_nanos(7),
            Duration::from_micros(1_001),
            Duration::from_millis(59_999),
            Duration::from_secs(3_661),
        ] {
            assert_eq!(parse_duration(&format_duration(duration)), Some(duration));
        }
    }
}
