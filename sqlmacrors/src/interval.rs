//! Duration literals used as bucket widths: `5m`, `1h30m`, `20ms`, `1.5h`,
//! plus whole calendar units `12d`, `2w`, `3M`, `1y`.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("empty interval")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("invalid duration {0:?}: out of range")]
    Overflow(String),
    #[error("negative duration {0:?}")]
    Negative(String),
}

/// Parse an interval literal into a duration.
///
/// `d`, `w`, `M` and `y` are only accepted as `<integer><unit>` and use fixed
/// lengths (1d = 24h, 1w = 7d, 1M = 30d, 1y = 365d), so results never depend
/// on the wall clock.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    if input.is_empty() {
        return Err(IntervalError::Empty);
    }
    if let Some(days) = calendar_days(input) {
        let secs = days
            .checked_mul(SECONDS_PER_DAY)
            .ok_or_else(|| IntervalError::Overflow(input.to_string()))?;
        return Ok(Duration::from_secs(secs));
    }
    parse_duration(input)
}

fn calendar_days(input: &str) -> Option<u64> {
    let unit = input.chars().last()?;
    let days_per_unit = match unit {
        'd' => 1,
        'w' => 7,
        'M' => 30,
        'y' => 365,
        _ => return None,
    };
    let digits = &input[..input.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()?.checked_mul(days_per_unit)
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// `[-+]?([0-9]*(\.[0-9]*)?[a-z]+)+`, summed in nanoseconds.
fn parse_duration(input: &str) -> Result<Duration, IntervalError> {
    let invalid = || IntervalError::Invalid(input.to_string());
    let overflow = || IntervalError::Overflow(input.to_string());

    let mut rest = input;
    let mut negative = false;
    if let Some(stripped) = rest.strip_prefix('-') {
        negative = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let limit = i64::MAX as u64;
    let mut total: u64 = 0;
    while !rest.is_empty() {
        let first = rest.as_bytes()[0];
        if !(first == b'.' || first.is_ascii_digit()) {
            return Err(invalid());
        }

        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let whole: u64 = if int_len == 0 {
            0
        } else {
            rest[..int_len].parse().map_err(|_| invalid())?
        };
        rest = &rest[int_len..];

        let mut fraction: u64 = 0;
        let mut scale: f64 = 1.0;
        let mut frac_len = 0;
        if let Some(after_dot) = rest.strip_prefix('.') {
            frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            for digit in after_dot[..frac_len].bytes() {
                // Digits past u64 precision no longer change the result.
                if fraction < u64::MAX / 100 {
                    fraction = fraction * 10 + u64::from(digit - b'0');
                    scale *= 10.0;
                }
            }
            rest = &after_dot[frac_len..];
        }
        if int_len == 0 && frac_len == 0 {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        let per_unit = unit_nanos(unit).ok_or_else(|| IntervalError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let mut value = whole.checked_mul(per_unit).ok_or_else(overflow)?;
        if fraction > 0 {
            value += (fraction as f64 * (per_unit as f64 / scale)) as u64;
        }
        total = total.checked_add(value).ok_or_else(overflow)?;
        if total > limit {
            return Err(overflow());
        }
    }

    if negative && total > 0 {
        return Err(IntervalError::Negative(input.to_string()));
    }
    Ok(Duration::from_nanos(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(input: &str) -> f64 {
        parse_interval(input).unwrap().as_secs_f64()
    }

    #[test]
    fn parses_clock_units() {
        assert_eq!(secs("5m"), 300.0);
        assert_eq!(secs("1h30m"), 5_400.0);
        assert_eq!(secs("20ms"), 0.02);
        assert_eq!(secs("1.5h"), 5_400.0);
        assert_eq!(secs(".5s"), 0.5);
        assert_eq!(secs("0"), 0.0);
        assert_eq!(secs("+10s"), 10.0);
    }

    #[test]
    fn parses_calendar_units_with_fixed_lengths() {
        assert_eq!(secs("12d"), 1_036_800.0);
        assert_eq!(secs("2w"), 1_209_600.0);
        assert_eq!(secs("1M"), 2_592_000.0);
        assert_eq!(secs("1y"), 31_536_000.0);
    }

    #[test]
    fn rejects_malformed_literals() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("5"), Err(IntervalError::MissingUnit(_))));
        assert!(matches!(
            parse_interval("5x"),
            Err(IntervalError::UnknownUnit { .. })
        ));
        assert!(matches!(parse_interval("abc"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("1.5d"), Err(IntervalError::UnknownUnit { .. })));
        assert!(matches!(parse_interval("-5m"), Err(IntervalError::Negative(_))));
        assert!(matches!(
            parse_interval("9999999999999h"),
            Err(IntervalError::Overflow(_))
        ));
    }
}
