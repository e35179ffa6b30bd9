//! Built-in output filters

use std::fmt::{Display, Write};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::eval::ExecutionError;
use super::value::Value;

/// Apply the filter `name` to `input`
pub(crate) fn apply(name: &str, input: Value, args: &[Value]) -> Result<Value, ExecutionError> {
    let value = match name {
        "upcase" => Value::String(input.to_string().to_uppercase()),
        "downcase" => Value::String(input.to_string().to_lowercase()),
        "capitalize" => Value::String(capitalize(&input.to_string())),
        "strip" => Value::String(input.to_string().trim().to_string()),
        "append" => Value::String(format!("{}{}", input, required(name, args)?)),
        "prepend" => Value::String(format!("{}{}", required(name, args)?, input)),
        "default" => {
            if input.is_empty() || matches!(input, Value::Bool(false)) {
                required(name, args)?.clone()
            } else {
                input
            }
        }
        "size" => Value::Int(input.size().unwrap_or(0) as i64),
        "join" => {
            let separator = args.first().map(Value::to_string);
            let separator = separator.as_deref().unwrap_or(" ");
            match input {
                Value::List(items) => Value::String(
                    items
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(separator),
                ),
                other => other,
            }
        }
        "first" => match input {
            Value::List(items) => items.into_iter().next().unwrap_or_default(),
            Value::String(s) => s.chars().next().map(String::from).into(),
            _ => Value::Nil,
        },
        "last" => match input {
            Value::List(mut items) => items.pop().unwrap_or_default(),
            Value::String(s) => s.chars().last().map(String::from).into(),
            _ => Value::Nil,
        },
        "date" => {
            let format = required(name, args)?.to_string();
            match format_date(&input, &format)? {
                Some(text) => Value::String(text),
                None => input,
            }
        }
        _ => {
            return Err(ExecutionError::UnknownFilter {
                name: name.to_string(),
            })
        }
    };
    Ok(value)
}

fn required<'a>(filter: &str, args: &'a [Value]) -> Result<&'a Value, ExecutionError> {
    args.first().ok_or_else(|| ExecutionError::FilterArgument {
        filter: filter.to_string(),
        message: "expected an argument".to_string(),
    })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a date, datetime or unix timestamp with a strftime pattern
///
/// Returns `None` when the input is not recognisable as a date.
fn format_date(input: &Value, format: &str) -> Result<Option<String>, ExecutionError> {
    let text = match input {
        Value::Int(seconds) => {
            return match DateTime::from_timestamp(*seconds, 0) {
                Some(dt) => render(dt.format(format)).map(Some),
                None => Ok(None),
            };
        }
        Value::String(s) => s.trim(),
        _ => return Ok(None),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return render(dt.format(format)).map(Some);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return render(dt.format(format)).map(Some);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return render(date.format(format)).map(Some);
    }
    Ok(None)
}

fn render(formatted: impl Display) -> Result<String, ExecutionError> {
    let mut out = String::new();
    write!(out, "{}", formatted).map_err(|_| ExecutionError::FilterArgument {
        filter: "date".to_string(),
        message: "invalid format string".to_string(),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(name: &str, input: impl Into<Value>, args: &[Value]) -> Value {
        apply(name, input.into(), args).expect("Filter should succeed")
    }

    #[test]
    fn test_string_filters() {
        assert_eq!(run("upcase", "abc", &[]), Value::from("ABC"));
        assert_eq!(run("downcase", "ABC", &[]), Value::from("abc"));
        assert_eq!(run("capitalize", "élan vital", &[]), Value::from("Élan vital"));
        assert_eq!(run("strip", "  x \n", &[]), Value::from("x"));
        assert_eq!(run("append", "a", &["b".into()]), Value::from("ab"));
        assert_eq!(run("prepend", "a", &["b".into()]), Value::from("ba"));
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(run("default", Value::Nil, &["x".into()]), Value::from("x"));
        assert_eq!(run("default", "", &["x".into()]), Value::from("x"));
        assert_eq!(run("default", "y", &["x".into()]), Value::from("y"));
        assert_eq!(run("default", 0, &["x".into()]), Value::Int(0));
    }

    #[test]
    fn test_list_filters() {
        let list = Value::from(vec!["a", "b", "c"]);
        assert_eq!(run("size", list.clone(), &[]), Value::Int(3));
        assert_eq!(run("join", list.clone(), &[", ".into()]), Value::from("a, b, c"));
        assert_eq!(run("join", list.clone(), &[]), Value::from("a b c"));
        assert_eq!(run("first", list.clone(), &[]), Value::from("a"));
        assert_eq!(run("last", list, &[]), Value::from("c"));
        assert_eq!(run("first", Value::List(Vec::new()), &[]), Value::Nil);
    }

    #[test]
    fn test_date_filter() {
        assert_eq!(
            run("date", "1976-03-31", &["%d/%m/%Y".into()]),
            Value::from("31/03/1976")
        );
        assert_eq!(
            run("date", "1976-03-31T08:15:00", &["%H:%M".into()]),
            Value::from("08:15")
        );
        assert_eq!(
            run("date", "2024-01-02T03:04:05+00:00", &["%Y".into()]),
            Value::from("2024")
        );
        assert_eq!(run("date", 0, &["%Y".into()]), Value::from("1970"));
        assert_eq!(run("date", "soon", &["%Y".into()]), Value::from("soon"));
    }

    #[test]
    fn test_missing_argument() {
        let err = apply("append", Value::from("a"), &[]).unwrap_err();
        assert!(matches!(err, ExecutionError::FilterArgument { .. }));
    }

    #[test]
    fn test_unknown_filter() {
        let err = apply("shout", Value::Nil, &[]).unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownFilter { name } if name == "shout"));
    }
}
