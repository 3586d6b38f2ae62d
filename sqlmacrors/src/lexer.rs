//! Splits the text between a macro's parentheses into trimmed arguments.
//!
//! Arguments are one comma-separated record. Fields may be wrapped in double
//! quotes so they can carry commas; template authors routinely leave stray
//! quotes inside values (`"var1: '2/2" Z"Z'"`), so the engine reads with
//! lenient quote handling where only `"` followed by `,` or end of input closes
//! a quoted field.

use crate::error::{MacroError, Result};

/// Comma-separated record reader.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader {
    lazy_quotes: bool,
    trim_leading_space: bool,
}

impl Default for FieldReader {
    fn default() -> Self {
        Self::lenient()
    }
}

impl FieldReader {
    /// Reader used for macro arguments.
    pub fn lenient() -> Self {
        Self {
            lazy_quotes: true,
            trim_leading_space: true,
        }
    }

    /// Reader that rejects bare and unbalanced quotes. Expansion never uses
    /// it; `MacroEngine::validate` does, to flag sloppy quoting at save time.
    pub fn strict() -> Self {
        Self {
            lazy_quotes: false,
            trim_leading_space: true,
        }
    }

    /// Read the first record of `input`. An unquoted newline ends the record.
    pub fn read_record(&self, input: &str) -> Result<Vec<String>> {
        let column = |rest: &str| input.len() - rest.len() + 1;
        let mut fields = Vec::new();
        let mut rest = input;

        loop {
            if self.trim_leading_space {
                rest = rest.trim_start_matches(|c: char| c.is_whitespace() && c != '\n');
            }

            let Some(mut body) = rest.strip_prefix('"') else {
                let end = rest.find([',', '\n']).unwrap_or(rest.len());
                let field = &rest[..end];
                if !self.lazy_quotes {
                    if let Some(idx) = field.find('"') {
                        return Err(parse_error(
                            column(&rest[idx..]),
                            "bare \" in non-quoted-field",
                        ));
                    }
                }
                fields.push(field.to_string());
                match rest[end..].strip_prefix(',') {
                    Some(next) => {
                        rest = next;
                        continue;
                    }
                    None => return Ok(fields),
                }
            };

            let mut field = String::new();
            loop {
                let Some(idx) = body.find('"') else {
                    if !self.lazy_quotes {
                        return Err(parse_error(
                            column(body) + body.len(),
                            "extraneous or missing \" in quoted-field",
                        ));
                    }
                    field.push_str(body);
                    fields.push(field);
                    return Ok(fields);
                };
                field.push_str(&body[..idx]);
                body = &body[idx + 1..];
                match body.chars().next() {
                    Some('"') => {
                        field.push('"');
                        body = &body[1..];
                    }
                    Some(',') => {
                        fields.push(field);
                        rest = &body[1..];
                        break;
                    }
                    None | Some('\n') => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(_) if self.lazy_quotes => field.push('"'),
                    Some(_) => {
                        return Err(parse_error(
                            column(body) - 1,
                            "extraneous or missing \" in quoted-field",
                        ));
                    }
                }
            }
        }
    }
}

fn parse_error(column: usize, reason: &str) -> MacroError {
    MacroError::ArgumentParse(format!("parse error on line 1, column {column}: {reason}"))
}

/// Split raw macro parameters with the lenient reader.
///
/// Empty (or all-whitespace) parameters yield a single empty argument, which
/// evaluators treat as "called with empty parens".
pub fn parse_args(params: &str) -> Result<Vec<String>> {
    parse_args_with(&FieldReader::lenient(), params)
}

pub fn parse_args_with(reader: &FieldReader, params: &str) -> Result<Vec<String>> {
    let params = params.trim().replace('\n', "");
    if params.is_empty() {
        return Ok(vec![String::new()]);
    }
    let mut args = reader.read_record(&params)?;
    for arg in args.iter_mut() {
        *arg = arg.trim().to_string();
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_yield_single_empty_argument() {
        assert_eq!(parse_args("").unwrap(), vec![""]);
        assert_eq!(parse_args("  \n ").unwrap(), vec![""]);
    }

    #[test]
    fn splits_and_trims_plain_fields() {
        assert_eq!(
            parse_args("time_column , '5m'").unwrap(),
            vec!["time_column", "'5m'"]
        );
        assert_eq!(parse_args("a,,b,").unwrap(), vec!["a", "", "b", ""]);
    }

    #[test]
    fn strips_embedded_newlines() {
        assert_eq!(
            parse_args("time_column,\n  '5m',\n  NULL").unwrap(),
            vec!["time_column", "'5m'", "NULL"]
        );
    }

    #[test]
    fn quoted_fields_keep_commas_and_doubled_quotes() {
        assert_eq!(
            parse_args(r#""a, b", "say ""hi""""#).unwrap(),
            vec!["a, b", r#"say "hi""#]
        );
    }

    #[test]
    fn lazy_quotes_keep_stray_quotes_inside_values() {
        assert_eq!(
            parse_args(r#""var1: '1/2" ZZ AAA','1/4' XX AAA','3/8'", "var2:NULL""#).unwrap(),
            vec![r#"var1: '1/2" ZZ AAA','1/4' XX AAA','3/8'"#, "var2:NULL"]
        );
        assert_eq!(parse_args(r#"ab"c, d"#).unwrap(), vec![r#"ab"c"#, "d"]);
    }

    #[test]
    fn lazy_quotes_accept_unterminated_quoted_field() {
        assert_eq!(parse_args(r#""abc, def"#).unwrap(), vec!["abc, def"]);
    }

    #[test]
    fn strict_reader_rejects_unbalanced_quotes() {
        let strict = FieldReader::strict();
        let err = parse_args_with(&strict, r#"ab"c"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parse error on line 1, column 3: bare \" in non-quoted-field"
        );
        assert!(parse_args_with(&strict, r#""abc"#).is_err());
        assert!(parse_args_with(&strict, r#""a"b""#).is_err());
        assert_eq!(
            parse_args_with(&strict, r#""a,b", c"#).unwrap(),
            vec!["a,b", "c"]
        );
    }
}
