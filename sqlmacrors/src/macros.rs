//! Macro names and the evaluator behind each one.

use std::num::IntErrorKind;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::context::QueryContext;
use crate::error::{MacroError, Result};
use crate::interval::parse_interval;
use crate::predicate::{build_predicates, PredicateStyle};
use crate::time_range::{unix_nanos, unix_seconds, TimeRange};

/// Every macro the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Macro {
    Time,
    TimeEpoch,
    TimeFilter,
    TimeFrom,
    TimeTo,
    TimeGroup,
    TimeGroupAlias,
    UnixEpochFilter,
    UnixEpochNanoFilter,
    UnixEpochNanoFrom,
    UnixEpochNanoTo,
    UnixEpochGroup,
    UnixEpochGroupAlias,
    IsTimeFromOutsideThreshold,
    IsNull,
    ConstructPredicates,
}

impl Macro {
    pub const ALL: [Macro; 16] = [
        Macro::Time,
        Macro::TimeEpoch,
        Macro::TimeFilter,
        Macro::TimeFrom,
        Macro::TimeTo,
        Macro::TimeGroup,
        Macro::TimeGroupAlias,
        Macro::UnixEpochFilter,
        Macro::UnixEpochNanoFilter,
        Macro::UnixEpochNanoFrom,
        Macro::UnixEpochNanoTo,
        Macro::UnixEpochGroup,
        Macro::UnixEpochGroupAlias,
        Macro::IsTimeFromOutsideThreshold,
        Macro::IsNull,
        Macro::ConstructPredicates,
    ];

    /// Resolve a name as written after `$`. The `__` prefix is optional.
    pub fn lookup(name: &str) -> Option<Macro> {
        let bare = name.strip_prefix("__").unwrap_or(name);
        let found = match bare {
            "time" => Macro::Time,
            "timeEpoch" => Macro::TimeEpoch,
            "timeFilter" => Macro::TimeFilter,
            "timeFrom" => Macro::TimeFrom,
            "timeTo" => Macro::TimeTo,
            "timeGroup" | "timeBucket" => Macro::TimeGroup,
            "timeGroupAlias" | "timeBucketAlias" => Macro::TimeGroupAlias,
            "unixEpochFilter" => Macro::UnixEpochFilter,
            "unixEpochNanoFilter" => Macro::UnixEpochNanoFilter,
            "unixEpochNanoFrom" => Macro::UnixEpochNanoFrom,
            "unixEpochNanoTo" => Macro::UnixEpochNanoTo,
            "unixEpochGroup" => Macro::UnixEpochGroup,
            "unixEpochGroupAlias" => Macro::UnixEpochGroupAlias,
            "isTimeFromOutsideThreshold" => Macro::IsTimeFromOutsideThreshold,
            "isNull" => Macro::IsNull,
            "constructPredicates" => Macro::ConstructPredicates,
            _ => return None,
        };
        Some(found)
    }

    /// Canonical template name, including the `__` prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Macro::Time => "__time",
            Macro::TimeEpoch => "__timeEpoch",
            Macro::TimeFilter => "__timeFilter",
            Macro::TimeFrom => "__timeFrom",
            Macro::TimeTo => "__timeTo",
            Macro::TimeGroup => "__timeGroup",
            Macro::TimeGroupAlias => "__timeGroupAlias",
            Macro::UnixEpochFilter => "__unixEpochFilter",
            Macro::UnixEpochNanoFilter => "__unixEpochNanoFilter",
            Macro::UnixEpochNanoFrom => "__unixEpochNanoFrom",
            Macro::UnixEpochNanoTo => "__unixEpochNanoTo",
            Macro::UnixEpochGroup => "__unixEpochGroup",
            Macro::UnixEpochGroupAlias => "__unixEpochGroupAlias",
            Macro::IsTimeFromOutsideThreshold => "__isTimeFromOutsideThreshold",
            Macro::IsNull => "__isNull",
            Macro::ConstructPredicates => "__constructPredicates",
        }
    }

    /// The aliased form of a bucketing macro.
    pub fn aliased(self) -> Macro {
        match self {
            Macro::TimeGroup => Macro::TimeGroupAlias,
            Macro::UnixEpochGroup => Macro::UnixEpochGroupAlias,
            other => other,
        }
    }
}

/// Per-call inputs shared by all evaluators.
pub struct Evaluation<'a> {
    pub range: &'a TimeRange,
    pub context: &'a mut dyn QueryContext,
    pub now: DateTime<Utc>,
    pub timescaledb: bool,
    pub predicate_style: PredicateStyle,
}

impl Evaluation<'_> {
    /// Expand one macro. `name` is the spelling used in the template and only
    /// appears in error messages.
    pub fn evaluate(&mut self, mac: Macro, name: &str, args: &[String]) -> Result<String> {
        tracing::debug!(macro_name = mac.name(), ?args, "evaluating macro");
        let range = self.range;
        match mac {
            Macro::Time => Ok(format!("{} AS \"time\"", time_column(name, args)?)),
            Macro::TimeEpoch => Ok(format!(
                "extract(epoch from {}) as \"time\"",
                time_column(name, args)?
            )),
            Macro::TimeFilter => Ok(format!(
                "{} BETWEEN '{}' AND '{}'",
                time_column(name, args)?,
                range.from_rfc3339(),
                range.to_rfc3339()
            )),
            Macro::TimeFrom => Ok(format!("'{}'", range.from_rfc3339())),
            Macro::TimeTo => Ok(format!("'{}'", range.to_rfc3339())),
            Macro::TimeGroup => {
                let (column, interval) = self.bucket(name, args)?;
                let secs = interval.as_secs_f64();
                if self.timescaledb {
                    Ok(format!("time_bucket('{secs:.3}s',{column})"))
                } else {
                    let secs = format_seconds(secs);
                    Ok(format!("floor(extract(epoch from {column})/{secs})*{secs}"))
                }
            }
            Macro::UnixEpochGroup => {
                let (column, interval) = self.bucket(name, args)?;
                let secs = format_seconds(interval.as_secs_f64());
                Ok(format!("floor(({column})/{secs})*{secs}"))
            }
            Macro::TimeGroupAlias => {
                let group = self.evaluate(Macro::TimeGroup, Macro::TimeGroup.name(), args)?;
                Ok(format!("{group} AS \"time\""))
            }
            Macro::UnixEpochGroupAlias => {
                let group =
                    self.evaluate(Macro::UnixEpochGroup, Macro::UnixEpochGroup.name(), args)?;
                Ok(format!("{group} AS \"time\""))
            }
            Macro::UnixEpochFilter => {
                let column = time_column(name, args)?;
                Ok(format!(
                    "{column} >= {} AND {column} <= {}",
                    unix_seconds(&range.from),
                    unix_seconds(&range.to)
                ))
            }
            Macro::UnixEpochNanoFilter => {
                let column = time_column(name, args)?;
                Ok(format!(
                    "{column} >= {} AND {column} <= {}",
                    unix_nanos(&range.from),
                    unix_nanos(&range.to)
                ))
            }
            Macro::UnixEpochNanoFrom => Ok(unix_nanos(&range.from).to_string()),
            Macro::UnixEpochNanoTo => Ok(unix_nanos(&range.to).to_string()),
            Macro::IsTimeFromOutsideThreshold => {
                let [threshold] = args else {
                    return Err(MacroError::Arity(format!(
                        "expecting threshold argument of type int alone to be passed: passed arguments are [{}]",
                        args.join(" ")
                    )));
                };
                let days = scan_int(threshold).map_err(|reason| {
                    MacroError::Threshold(format!(
                        "unable to parse threshold '{threshold}': {reason}"
                    ))
                })?;
                let elapsed_hours = (self.now - range.from).num_hours();
                // A threshold too large to express in hours is never crossed
                // when positive and always crossed when negative.
                let outside = match days.checked_mul(24) {
                    Some(threshold_hours) => elapsed_hours > threshold_hours,
                    None => days < 0,
                };
                Ok(bool_literal(outside))
            }
            Macro::IsNull => Ok(bool_literal(args.iter().all(|arg| arg == "NULL"))),
            Macro::ConstructPredicates => build_predicates(self.predicate_style, args),
        }
    }

    /// Shared argument handling for the bucketing macros: column, interval and
    /// an optional fill spec forwarded to the query context.
    fn bucket<'args>(
        &mut self,
        name: &str,
        args: &'args [String],
    ) -> Result<(&'args str, Duration)> {
        if args.len() < 2 {
            return Err(MacroError::Arity(format!(
                "macro {name} needs time column and interval and optional fill value"
            )));
        }
        let interval = parse_interval(args[1].trim_matches('\''))
            .map_err(|_| MacroError::Interval(args[1].clone()))?;
        if let [_, _, fill] = args {
            self.context.set_fill_mode(interval, fill)?;
        }
        Ok((args[0].as_str(), interval))
    }
}

fn time_column<'a>(name: &str, args: &'a [String]) -> Result<&'a str> {
    args.first().map(String::as_str).ok_or_else(|| {
        MacroError::Arity(format!("missing time column argument for macro {name}"))
    })
}

fn bool_literal(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Shortest decimal that round-trips, switching to exponent form below 1e-4
/// and from 1e21 upwards (`300`, `0.02`, `2e-05`).
pub fn format_seconds(secs: f64) -> String {
    let magnitude = secs.abs();
    if secs != 0.0 && (magnitude < 1e-4 || magnitude >= 1e21) {
        let formatted = format!("{secs:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => formatted,
        };
    }
    format!("{secs}")
}

/// Read a leading integer the way a whitespace-separated scanner does:
/// optional sign, then digits; anything after the token is ignored.
///
/// Base prefixes are honoured (`0b101`, `0o17`, `0x1F`, and a bare leading
/// `0` for octal, so `010` is 8) and `_` may separate digits.
fn scan_int(input: &str) -> std::result::Result<i64, String> {
    let input = input.trim_start();
    if input.is_empty() {
        return Err("EOF".to_string());
    }
    let sign_len = usize::from(input.starts_with(['+', '-']));
    let rest = &input[sign_len..];
    let (prefix_len, radix) = match rest.as_bytes() {
        [] => return Err("unexpected EOF".to_string()),
        [b'0', b'b' | b'B', ..] => (2, 2),
        [b'0', b'o' | b'O', ..] => (2, 8),
        [b'0', b'x' | b'X', ..] => (2, 16),
        [b'0', ..] => (1, 8),
        _ => (0, 10),
    };
    let digit_len = rest[prefix_len..]
        .bytes()
        .take_while(|b| *b == b'_' || char::from(*b).is_digit(radix))
        .count();
    if prefix_len == 0 && digit_len == 0 {
        return Err("expected integer".to_string());
    }
    parse_int_token(&input[..sign_len + prefix_len + digit_len])
}

fn parse_int_token(token: &str) -> std::result::Result<i64, String> {
    let invalid = || format!("parsing {token:?}: invalid syntax");
    let sign = if token.starts_with('-') { "-" } else { "" };
    let body = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (radix, digits, prefixed) = match body.as_bytes() {
        [b'0', b'b' | b'B', _, ..] => (2, &body[2..], true),
        [b'0', b'o' | b'O', _, ..] => (8, &body[2..], true),
        [b'0', b'x' | b'X', _, ..] => (16, &body[2..], true),
        [b'0', ..] => (8, &body[1..], true),
        _ => (10, body, false),
    };
    if !underscores_between_digits(digits, prefixed) {
        return Err(invalid());
    }
    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return if prefixed { Ok(0) } else { Err(invalid()) };
    }
    i64::from_str_radix(&format!("{sign}{digits}"), radix).map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            format!("parsing {token:?}: value out of range")
        }
        _ => invalid(),
    })
}

/// `_` may only follow a digit or a base prefix, and may not end the number.
fn underscores_between_digits(digits: &str, prefixed: bool) -> bool {
    let mut after_digit = prefixed;
    let mut trailing_underscore = false;
    for c in digits.chars() {
        if c == '_' {
            if !after_digit {
                return false;
            }
            after_digit = false;
            trailing_underscore = true;
        } else {
            after_digit = true;
            trailing_underscore = false;
        }
    }
    !trailing_underscore
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_prefixed_bare_and_alias_names() {
        assert_eq!(Macro::lookup("__timeGroup"), Some(Macro::TimeGroup));
        assert_eq!(Macro::lookup("timeGroup"), Some(Macro::TimeGroup));
        assert_eq!(Macro::lookup("timeBucket"), Some(Macro::TimeGroup));
        assert_eq!(Macro::lookup("isNull"), Some(Macro::IsNull));
        assert_eq!(Macro::lookup("nope"), None);
        for mac in Macro::ALL {
            assert_eq!(Macro::lookup(mac.name()), Some(mac));
        }
    }

    #[test]
    fn seconds_render_like_shortest_float() {
        assert_eq!(format_seconds(300.0), "300");
        assert_eq!(format_seconds(0.02), "0.02");
        assert_eq!(format_seconds(1_036_800.0), "1036800");
        assert_eq!(format_seconds(0.00002), "2e-05");
        assert_eq!(format_seconds(0.0), "0");
    }

    #[test]
    fn scan_int_mirrors_scanner_errors() {
        assert_eq!(scan_int("30"), Ok(30));
        assert_eq!(scan_int("-2"), Ok(-2));
        assert_eq!(scan_int("7days"), Ok(7));
        assert_eq!(scan_int(""), Err("EOF".to_string()));
        assert_eq!(scan_int("-"), Err("unexpected EOF".to_string()));
        assert_eq!(scan_int("erfewg"), Err("expected integer".to_string()));
    }

    #[test]
    fn scan_int_honours_base_prefixes() {
        assert_eq!(scan_int("0x1F"), Ok(31));
        assert_eq!(scan_int("010"), Ok(8));
        assert_eq!(scan_int("08"), Ok(0));
        assert_eq!(scan_int("0b101"), Ok(5));
        assert_eq!(scan_int("-0o17"), Ok(-15));
        assert_eq!(scan_int("0"), Ok(0));
        assert_eq!(scan_int("1_000"), Ok(1000));
        assert_eq!(
            scan_int("0x"),
            Err("parsing \"0x\": invalid syntax".to_string())
        );
        assert_eq!(
            scan_int("1__0"),
            Err("parsing \"1__0\": invalid syntax".to_string())
        );
        assert_eq!(
            scan_int("99999999999999999999"),
            Err("parsing \"99999999999999999999\": value out of range".to_string())
        );
    }
}
