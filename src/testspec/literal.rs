//! Literal argument parsing
//!
//! A test line is a comma-separated list of literals (`1, "a", [2, 3]`).
//! The line is wrapped in brackets and read as a JSON array; each top-level
//! element is then rendered back to a canonical string.

use serde_json::{Number, Value};

use crate::common::{Error, LineError, Result};

/// One row of test data: ordered canonical literal strings
pub type TestCase = Vec<String>;

/// Parse a single line into its canonical literals
///
/// A blank line yields an empty row.
pub fn parse_line(line: &str) -> Result<TestCase> {
    parse_row(line).map_err(|reason| {
        Error::TestData(vec![LineError {
            line: 1,
            text: line.to_string(),
            reason,
        }])
    })
}

/// Outcome of parsing a multi-line field without giving up on bad lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldParse {
    /// Non-empty rows that parsed, in input order
    pub rows: Vec<TestCase>,
    /// Every line that failed
    pub failures: Vec<LineError>,
}

impl FieldParse {
    /// Rows if every line parsed, otherwise all failures at once
    pub fn into_result(self) -> Result<Vec<TestCase>> {
        if self.failures.is_empty() {
            Ok(self.rows)
        } else {
            Err(Error::TestData(self.failures))
        }
    }
}

/// Parse a blob line by line, keeping both good rows and failures
pub fn parse_field_partial(blob: &str) -> FieldParse {
    let mut parsed = FieldParse::default();
    for (idx, line) in blob.split('\n').enumerate() {
        match parse_row(line) {
            Ok(row) if row.is_empty() => {}
            Ok(row) => parsed.rows.push(row),
            Err(reason) => parsed.failures.push(LineError {
                line: idx + 1,
                text: line.to_string(),
                reason,
            }),
        }
    }
    parsed
}

/// Parse a blob into rows, failing with every bad line if any
pub fn parse_field(blob: &str) -> Result<Vec<TestCase>> {
    let parsed = parse_field_partial(blob);
    if !parsed.failures.is_empty() {
        tracing::debug!(
            failed = parsed.failures.len(),
            parsed = parsed.rows.len(),
            "Test data has malformed lines"
        );
    }
    parsed.into_result()
}

/// Parse one line, returning the parser message on failure
pub(crate) fn parse_row(line: &str) -> std::result::Result<TestCase, String> {
    let wrapped = format!("[{}]", line);
    let values: Vec<Value> = serde_json::from_str(&wrapped).map_err(describe)?;
    Ok(values.iter().map(render).collect())
}

/// Render a literal in canonical form
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render).collect::<Vec<_>>().join(", ")
        ),
        Value::Number(n) => render_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Object(_) => value.to_string(),
    }
}

/// Integral floats print without a fraction (`1.0` -> `1`)
fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => render_float(f),
        _ => n.to_string(),
    }
}

/// Shortest round-trip digits, switching to exponent form below 1e-6 and
/// from 1e21 up (`1e+21`, `2.5e-10`)
fn render_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let scientific = format!("{:e}", f.abs());
    let Some((mantissa, exp)) = scientific.split_once('e') else {
        return f.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return f.to_string();
    };

    let digits = mantissa.replace('.', "");
    let k = digits.len() as i32;
    // Decimal point position relative to the digit string
    let n = exp + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{}.{}", int, frac)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let (lead, rest) = digits.split_at(1);
        let sign = if exp < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{}e{}{}", lead, sign, exp.abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, sign, exp.abs())
        }
    };

    if f < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Strip serde_json's position suffix and report a column in the caller's line
fn describe(e: serde_json::Error) -> String {
    let message = e.to_string();
    let base = match message.rfind(" at line ") {
        Some(idx) => &message[..idx],
        None => message.as_str(),
    };
    // Column 1 is the wrapping bracket
    format!("{} at column {}", base, e.column().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_simple() {
        assert_eq!(parse_line("1, 2").unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn test_parse_line_nested_array() {
        assert_eq!(parse_line("[1,2], 3").unwrap(), vec!["[1, 2]", "3"]);
        assert_eq!(
            parse_line("[[1, [2]], []], \"x\"").unwrap(),
            vec!["[[1, [2]], []]", "\"x\""]
        );
    }

    #[test]
    fn test_parse_line_canonical_scalars() {
        assert_eq!(
            parse_line("\"hi\", 1.0, 2.5, -3, true, null").unwrap(),
            vec!["\"hi\"", "1", "2.5", "-3", "true", "null"]
        );
        assert_eq!(
            parse_line("1e21, 1e-7, 2.5e-10, -1.5e300").unwrap(),
            vec!["1e+21", "1e-7", "2.5e-10", "-1.5e+300"]
        );
        assert_eq!(
            parse_line("1e20, 0.000001, 123.456, -0.0, 12.5e3").unwrap(),
            vec!["100000000000000000000", "0.000001", "123.456", "0", "12500"]
        );
    }

    #[test]
    fn test_parse_line_blank_is_empty() {
        assert!(parse_line("").unwrap().is_empty());
        assert!(parse_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_line_malformed() {
        let err = parse_line("1, 'a'").unwrap_err();
        assert_eq!(err.line_errors().len(), 1);
        assert_eq!(err.line_errors()[0].text, "1, 'a'");
    }

    #[test]
    fn test_parse_field_rows() {
        assert_eq!(
            parse_field("1,2\n3,6").unwrap(),
            vec![vec!["1", "2"], vec!["3", "6"]]
        );
    }

    #[test]
    fn test_parse_field_skips_blank_lines() {
        assert_eq!(
            parse_field("1\n\n2\r\n\n").unwrap(),
            vec![vec!["1"], vec!["2"]]
        );
    }

    #[test]
    fn test_parse_field_collects_every_failure() {
        let parsed = parse_field_partial("1\n2,\n3\n[4\n5");
        assert_eq!(parsed.rows, vec![vec!["1"], vec!["3"], vec!["5"]]);
        let lines: Vec<usize> = parsed.failures.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![2, 4]);

        let err = parse_field("1\n2,\n3\n[4\n5").unwrap_err();
        assert_eq!(err.line_errors().len(), 2);
    }
}
