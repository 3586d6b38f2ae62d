use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ResolvedEngineConfig;
use crate::context::QueryContext;
use crate::error::{MacroError, Result};
use crate::lexer::{parse_args, parse_args_with, FieldReader};
use crate::macros::{Evaluation, Macro};
use crate::predicate::PredicateStyle;
use crate::time_range::TimeRange;

static MACRO_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$([_a-zA-Z0-9]+)\(([^\)]*)\)").expect("macro call pattern is valid")
});

/// Placeholder left in the working buffer for calls that failed.
const ERROR_SENTINEL: &str = "macro_error()";

/// One `$name(args)` occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCall {
    pub name: String,
    pub raw_args: String,
    pub full_match: String,
    pub offset: usize,
}

impl MacroCall {
    /// Byte offset just past the closing parenthesis.
    pub fn end(&self) -> usize {
        self.offset + self.full_match.len()
    }
}

/// Find every macro call in `sql`, left to right, without overlaps.
pub fn find_calls(sql: &str) -> Vec<MacroCall> {
    MACRO_CALL
        .captures_iter(sql)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(MacroCall {
                name: caps.get(1)?.as_str().to_string(),
                raw_args: caps.get(2)?.as_str().to_string(),
                full_match: whole.as_str().to_string(),
                offset: whole.start(),
            })
        })
        .collect()
}

/// Expands macro calls in SQL templates.
///
/// An engine is built once per datasource and shared freely: it only holds
/// the dialect settings, so concurrent `interpolate` calls need no locking.
#[derive(Debug, Clone)]
pub struct MacroEngine {
    timescaledb: bool,
    predicate_style: PredicateStyle,
    span: Option<tracing::Span>,
}

impl Default for MacroEngine {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MacroEngine {
    pub fn new(timescaledb: bool) -> Self {
        Self {
            timescaledb,
            predicate_style: PredicateStyle::default(),
            span: None,
        }
    }

    pub fn from_config(config: &ResolvedEngineConfig) -> Self {
        Self::new(config.timescaledb).with_predicate_style(config.predicate_style)
    }

    pub fn with_predicate_style(mut self, style: PredicateStyle) -> Self {
        self.predicate_style = style;
        self
    }

    /// Parent span for everything the engine logs. Without one, each call
    /// opens its own `macros` debug span.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn timescaledb(&self) -> bool {
        self.timescaledb
    }

    pub fn predicate_style(&self) -> PredicateStyle {
        self.predicate_style
    }

    pub fn find_calls(&self, sql: &str) -> Vec<MacroCall> {
        find_calls(sql)
    }

    /// Check a template without expanding it.
    ///
    /// Fails on the first unknown macro name or on arguments with bare or
    /// unbalanced double quotes, which `interpolate` would read leniently.
    pub fn validate(&self, sql: &str) -> Result<Vec<MacroCall>> {
        let reader = FieldReader::strict();
        let calls = find_calls(sql);
        for call in &calls {
            Macro::lookup(&call.name)
                .ok_or_else(|| MacroError::UnknownMacro(call.name.clone()))?;
            parse_args_with(&reader, &call.raw_args)?;
        }
        Ok(calls)
    }

    /// Replace every macro call in `sql`.
    ///
    /// All calls are evaluated even after a failure; the first error wins and
    /// no partially expanded SQL is returned.
    pub fn interpolate(
        &self,
        context: &mut dyn QueryContext,
        range: &TimeRange,
        sql: &str,
    ) -> Result<String> {
        self.interpolate_at(context, range, sql, Utc::now())
    }

    /// `interpolate` with an explicit current time for threshold checks.
    pub fn interpolate_at(
        &self,
        context: &mut dyn QueryContext,
        range: &TimeRange,
        sql: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let span = self.span.clone().unwrap_or_else(|| {
            tracing::debug_span!(
                "macros",
                timescaledb = self.timescaledb,
                predicate_style = self.predicate_style.as_str()
            )
        });
        let _entered = span.enter();

        let mut eval = Evaluation {
            range,
            context,
            now,
            timescaledb: self.timescaledb,
            predicate_style: self.predicate_style,
        };
        let mut expanded = String::with_capacity(sql.len());
        let mut first_error: Option<MacroError> = None;
        let mut last = 0;
        for call in find_calls(sql) {
            expanded.push_str(&sql[last..call.offset]);
            last = call.end();
            match self.expand(&mut eval, sql, &call) {
                Ok(fragment) => expanded.push_str(&fragment),
                Err(err) => {
                    tracing::debug!(
                        macro_name = call.name.as_str(),
                        args = call.raw_args.as_str(),
                        error = %err,
                        "macro expansion failed"
                    );
                    first_error.get_or_insert(err);
                    expanded.push_str(ERROR_SENTINEL);
                }
            }
        }
        expanded.push_str(&sql[last..]);

        match first_error {
            Some(err) => Err(err),
            None => Ok(expanded),
        }
    }

    fn expand(&self, eval: &mut Evaluation<'_>, sql: &str, call: &MacroCall) -> Result<String> {
        let args = parse_args(&call.raw_args)?;
        let mac = Macro::lookup(&call.name)
            .ok_or_else(|| MacroError::UnknownMacro(call.name.clone()))?;
        // Templates written before the alias macro existed rely on
        // `$__timeGroup(...),` inside a select list producing `AS "time"`.
        // A `)` after the call (e.g. inside `OVER (ORDER BY ...)`) does not.
        let mac = if mac == Macro::TimeGroup && sql[call.end()..].starts_with(',') {
            mac.aliased()
        } else {
            mac
        };
        eval.evaluate(mac, &call.name, &args)
    }
}
