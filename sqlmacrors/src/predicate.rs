//! `IN (...)` predicate construction for dashboard variable filters.
//!
//! Each macro argument is a `key: values` group. Two grammars exist for the
//! value part, chosen per engine:
//!
//! - literal list: `"region: 'eu','us'"`
//! - query string: `"region: var-region=eu&var-region=us"`
//!
//! A group keyed `exclude_values` lists values to drop from every other group.
//! Values are matched against it as written: in a literal list the bare token
//! `NULL` is excluded by default but the quoted string `'NULL'` is not. Query
//! string exclusions are taken verbatim, and a repeated `exclude_values` group
//! replaces the earlier one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{MacroError, Result};

pub const EXCLUDE_VALUES_KEY: &str = "exclude_values";

/// Grammar of the value part of a predicate group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateStyle {
    LiteralList,
    #[default]
    QueryString,
}

impl PredicateStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateStyle::LiteralList => "literal_list",
            PredicateStyle::QueryString => "query_string",
        }
    }

    /// Values dropped when the call has no `exclude_values` group.
    fn default_exclusions(&self) -> HashSet<String> {
        match self {
            PredicateStyle::LiteralList => ["NULL", ""].iter().map(|v| v.to_string()).collect(),
            PredicateStyle::QueryString => HashSet::new(),
        }
    }

    fn exclusion_entry(&self, entry: &str) -> String {
        match self {
            PredicateStyle::LiteralList => entry.trim().to_string(),
            PredicateStyle::QueryString => entry.to_string(),
        }
    }

    fn shape_error(&self, arg: &str) -> MacroError {
        match self {
            PredicateStyle::LiteralList => MacroError::Predicate(
                "error in parsing arguments: not wrapped in double quotes".to_string(),
            ),
            PredicateStyle::QueryString => MacroError::Predicate(format!(
                "error in parsing argument: {arg} not in key value pair format"
            )),
        }
    }

    /// Candidate value lists for one group, before exclusions.
    fn candidate_lists(&self, raw_values: &str) -> Result<Vec<Vec<String>>> {
        match self {
            PredicateStyle::LiteralList => Ok(vec![raw_values
                .split(',')
                .map(|v| v.trim().to_string())
                .collect()]),
            PredicateStyle::QueryString => Ok(parse_query(raw_values)?
                .into_iter()
                .map(|(_, values)| values)
                .collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateGroup {
    pub key: String,
    pub raw_values: String,
}

/// Build the combined predicate for the given arguments.
///
/// Returns `true` for an empty-paren call and when every value is excluded.
pub fn build_predicates(style: PredicateStyle, args: &[String]) -> Result<String> {
    if matches!(args, [only] if only.is_empty()) {
        return Ok("true".to_string());
    }

    let mut exclusions: Option<HashSet<String>> = None;
    let mut groups = Vec::new();
    for arg in args {
        let parts: Vec<&str> = arg.split(':').collect();
        let [key, raw_values] = parts.as_slice() else {
            return Err(style.shape_error(arg));
        };
        let key = key.trim();
        let raw_values = raw_values.trim();
        if key == EXCLUDE_VALUES_KEY {
            exclusions = Some(
                raw_values
                    .split(',')
                    .map(|v| style.exclusion_entry(v))
                    .collect(),
            );
        } else {
            groups.push(PredicateGroup {
                key: key.to_string(),
                raw_values: raw_values.to_string(),
            });
        }
    }
    let exclusions = exclusions.unwrap_or_else(|| style.default_exclusions());
    tracing::debug!(
        style = style.as_str(),
        groups = groups.len(),
        exclusions = exclusions.len(),
        "building predicates"
    );

    let mut predicates = Vec::new();
    for group in &groups {
        for values in style.candidate_lists(&group.raw_values)? {
            let included: Vec<String> = values
                .into_iter()
                .filter(|v| !exclusions.contains(v))
                .collect();
            if !included.is_empty() {
                predicates.push(format!("{} in ({})", group.key, escape_values(&included)));
            }
        }
    }

    if predicates.is_empty() {
        return Ok("true".to_string());
    }
    Ok(predicates.join(" and "))
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('\'')
}

/// Quote one value as a SQL string literal.
///
/// Surrounding single quotes are stripped first, then every remaining quote is
/// doubled exactly once.
pub fn escape_sql_value(value: &str) -> String {
    format!("'{}'", unquote(value).replace('\'', "''"))
}

pub fn escape_values(values: &[String]) -> String {
    values
        .iter()
        .map(|v| escape_sql_value(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse `a=1&a=2&b` into `[("a", ["1", "2"]), ("b", [""])]`, keeping the
/// order in which parameters first appear.
pub fn parse_query(query: &str) -> Result<Vec<(String, Vec<String>)>> {
    let mut params: Vec<(String, Vec<String>)> = Vec::new();
    let mut first_error = None;
    for segment in query.split('&') {
        if segment.is_empty() {
            continue;
        }
        if segment.contains(';') {
            first_error.get_or_insert_with(|| {
                MacroError::QueryParams("invalid semicolon separator in query".to_string())
            });
            continue;
        }
        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
        let decoded = validate_escapes(key)
            .and_then(|_| validate_escapes(value))
            .map(|_| (decode_component(key), decode_component(value)));
        let (key, value) = match decoded {
            Ok(pair) => pair,
            Err(err) => {
                first_error.get_or_insert(err);
                continue;
            }
        };
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => params.push((key, vec![value])),
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(params),
    }
}

/// Every `%` must start a two-digit hex escape.
fn validate_escapes(component: &str) -> Result<()> {
    let bytes = component.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let valid = idx + 2 < bytes.len()
                && bytes[idx + 1].is_ascii_hexdigit()
                && bytes[idx + 2].is_ascii_hexdigit();
            if !valid {
                let end = (idx + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[idx..end]);
                return Err(MacroError::QueryParams(format!(
                    "invalid URL escape {escape:?}"
                )));
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    Ok(())
}

fn decode_component(component: &str) -> String {
    url::form_urlencoded::parse(format!("k={component}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
