//! Text codec for [`Duration`] flag values.
//!
//! Accepts a sequence of decimal numbers, each with an optional fraction and
//! a unit suffix, such as `300ms`, `1.5s` or `1h30m`. Valid units are `ns`,
//! `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is also accepted.
//!
//! Rendering always produces text that [`parse`] reads back to the same
//! duration: `0s`, `1.5µs`, `300ms`, `2m0s`, `1h30m0s`.

use std::fmt::Write;
use std::time::Duration;

use crate::error::ValueError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parses duration text.
///
/// Negative durations are out of range because [`Duration`] is unsigned.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use flagtree_core::duration;
///
/// assert_eq!(duration::parse("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(duration::parse("1.5s").unwrap(), Duration::from_millis(1500));
/// assert!(duration::parse("12").is_err());
/// ```
pub fn parse(text: &str) -> Result<Duration, ValueError> {
    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(ValueError::Syntax);
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_frac) = match after_int.strip_prefix('.') {
            Some(tail) => {
                let frac_len = tail.bytes().take_while(u8::is_ascii_digit).count();
                tail.split_at(frac_len)
            }
            None => ("", after_int),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ValueError::Syntax);
        }

        let unit_len = after_frac
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_frac.len());
        let (unit, tail) = after_frac.split_at(unit_len);
        let scale = unit_scale(unit).ok_or(ValueError::Syntax)?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| ValueError::Range)?
        };
        let mut nanos = whole.checked_mul(scale).ok_or(ValueError::Range)?;

        // Digits past 1e-20 of a unit cannot contribute a nanosecond.
        let mut fraction: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in frac_part.bytes().take(20) {
            fraction = fraction * 10 + u128::from(digit - b'0');
            divisor *= 10;
        }
        nanos += fraction * scale / divisor;

        total = total.checked_add(nanos).ok_or(ValueError::Range)?;
        rest = tail;
    }

    if negative && total > 0 {
        return Err(ValueError::Range);
    }
    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| ValueError::Range)?;
    // Remainder is below 1e9 and always fits.
    let subsec = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, subsec))
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Renders a duration in canonical form.
///
/// ```
/// use std::time::Duration;
/// use flagtree_core::duration;
///
/// assert_eq!(duration::render(Duration::from_secs(5)), "5s");
/// assert_eq!(duration::render(Duration::from_secs(5400)), "1h30m0s");
/// assert_eq!(duration::render(Duration::from_millis(300)), "300ms");
/// ```
pub fn render(value: Duration) -> String {
    let nanos = value.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 3));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", fraction(nanos, 6));
    }

    let mut out = String::new();
    let total_secs = nanos / NANOS_PER_SEC;
    let hours = total_secs / 3_600;
    let minutes = (total_secs / 60) % 60;
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{}s", fraction(nanos % (60 * NANOS_PER_SEC), 9));
    out
}

/// Formats `value / 10^precision` with trailing fractional zeros removed.
fn fraction(value: u128, precision: u32) -> String {
    let scale = 10u128.pow(precision);
    let whole = value / scale;
    let rem = value % scale;
    if rem == 0 {
        return whole.to_string();
    }
    let digits = format!("{rem:0width$}", width = precision as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse("1m0.5s").unwrap(), Duration::from_millis(60_500));
        assert_eq!(parse("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse("2us").unwrap(), Duration::from_micros(2));
        assert_eq!(parse("2µs").unwrap(), Duration::from_micros(2));
        assert_eq!(parse(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_zero_forms() {
        assert_eq!(parse("0").unwrap(), Duration::ZERO);
        assert_eq!(parse("-0").unwrap(), Duration::ZERO);
        assert_eq!(parse("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_bad_syntax() {
        assert_eq!(parse(""), Err(ValueError::Syntax));
        assert_eq!(parse("5"), Err(ValueError::Syntax));
        assert_eq!(parse("5x"), Err(ValueError::Syntax));
        assert_eq!(parse("s"), Err(ValueError::Syntax));
        assert_eq!(parse("1.s.5"), Err(ValueError::Syntax));
    }

    #[test]
    fn test_parse_negative_is_out_of_range() {
        assert_eq!(parse("-5s"), Err(ValueError::Range));
    }

    #[test]
    fn test_render_forms() {
        assert_eq!(render(Duration::ZERO), "0s");
        assert_eq!(render(Duration::from_nanos(42)), "42ns");
        assert_eq!(render(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(render(Duration::from_micros(1_250)), "1.25ms");
        assert_eq!(render(Duration::from_secs(120)), "2m0s");
        assert_eq!(render(Duration::from_millis(3_723_500)), "1h2m3.5s");
    }

    #[test]
    fn test_render_parses_back() {
        for d in [
            Duration::from_nanos(7),
            Duration::from_nanos(1_001),
            Duration::from_micros(2_500),
            Duration::from_secs(5),
            Duration::from_millis(90_001),
            Duration::from_secs(86_400 * 3 + 1),
        ] {
            assert_eq!(parse(&render(d)).unwrap(), d);
        }
    }
}
