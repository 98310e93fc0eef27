//! Filters and tests registered by the sandbox.
use std::fmt::Write;
use std::sync::OnceLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use minijinja::value::{Value, ValueKind};
use minijinja::{Error, ErrorKind};
use regex::Regex;

use crate::undefined::is_defined;

/// The key under which TOML date-times are serialized.
const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

fn invalid_date() -> Error {
    Error::new(ErrorKind::InvalidOperation, "Invalid date format")
}

enum Moment {
    Zoned(DateTime<chrono::FixedOffset>),
    Naive(NaiveDateTime),
    Date(NaiveDate),
}

fn parse_moment(s: &str) -> Option<Moment> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Moment::Zoned(dt));
    }
    let naive = s.strip_suffix('Z').unwrap_or(s);
    for pattern in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, pattern) {
            return Some(Moment::Naive(dt));
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .map(Moment::Date)
}

fn date_source(value: &Value) -> Option<String> {
    match value.kind() {
        ValueKind::String => value.as_str().map(str::to_string),
        ValueKind::Map => value
            .get_attr(TOML_DATETIME_KEY)
            .ok()
            .and_then(|x| x.as_str().map(str::to_string)),
        _ => None,
    }
}

/// Formats an ISO-8601 date or date-time with a strftime pattern.
///
/// ```jinja
/// {{ "2024-03-01T09:30:00Z"|date("%d.%m.%Y %H:%M") }}
/// ```
///
/// Anything that is not a string or a TOML date-time, and any string that
/// does not parse, fails with `Invalid date format`.  So does a pattern that
/// needs fields the value does not have, such as `%H` on a plain date.
pub fn date(value: &Value, format: Option<&str>) -> Result<String, Error> {
    let format = format.unwrap_or("%Y-%m-%d");
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|x| matches!(x, Item::Error)) {
        return Err(invalid_date());
    }
    let source = date_source(value).ok_or_else(invalid_date)?;
    let moment = parse_moment(&source).ok_or_else(invalid_date)?;
    let mut rv = String::new();
    let items = items.iter();
    match moment {
        Moment::Zoned(dt) => write!(rv, "{}", dt.format_with_items(items)),
        Moment::Naive(dt) => write!(rv, "{}", dt.format_with_items(items)),
        Moment::Date(d) => write!(rv, "{}", d.format_with_items(items)),
    }
    .map_err(|_| invalid_date())?;
    Ok(rv)
}

fn unsafe_markup() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)<script|javascript:|data:|vbscript:|on\w+\s*=").ok())
        .as_ref()
}

/// Marks a value as safe after checking it for dangerous markup.
///
/// Script tags, script-like URL schemes and inline event handlers are
/// rejected instead of passed through.
pub fn safe(value: &Value) -> Result<Value, Error> {
    let text = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    match unsafe_markup() {
        Some(pattern) if !pattern.is_match(&text) => Ok(Value::from_safe_string(text)),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            "HTML content contains potentially unsafe elements",
        )),
    }
}

/// Returns the default if the value is undefined or hollow.
///
/// With `boolean` set the default also replaces falsy values.
pub fn default(value: &Value, other: Option<Value>, boolean: Option<bool>) -> Value {
    if !is_defined(value) || (boolean.unwrap_or(false) && !value.is_true()) {
        other.unwrap_or_else(|| Value::from(""))
    } else {
        value.clone()
    }
}

/// Checks if a value is defined.
pub fn is_defined_test(value: &Value) -> bool {
    is_defined(value)
}

/// Checks if a value is undefined.
pub fn is_undefined_test(value: &Value) -> bool {
    !is_defined(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_inputs() {
        let fmt = Some("%Y/%m/%d %H:%M");
        assert_eq!(
            date(&Value::from("2024-03-01T09:30:00Z"), fmt).unwrap(),
            "2024/03/01 09:30"
        );
        assert_eq!(
            date(&Value::from("2024-03-01T09:30:00+09:00"), fmt).unwrap(),
            "2024/03/01 09:30"
        );
        assert_eq!(
            date(&Value::from("2024-03-01 09:30:15.250"), fmt).unwrap(),
            "2024/03/01 09:30"
        );
        assert_eq!(date(&Value::from("2024-03-01"), None).unwrap(), "2024-03-01");
        let toml = Value::from_iter([(TOML_DATETIME_KEY, "1979-05-27T07:32:00Z")]);
        assert_eq!(date(&toml, None).unwrap(), "1979-05-27");
    }

    #[test]
    fn test_date_failures() {
        for value in [
            Value::from(()),
            Value::from(42),
            Value::from("yesterday"),
            Value::UNDEFINED,
        ] {
            assert_eq!(
                date(&value, None).unwrap_err().detail(),
                Some("Invalid date format")
            );
        }
        assert!(date(&Value::from("2024-03-01"), Some("%H:%M")).is_err());
        assert!(date(&Value::from("2024-03-01"), Some("%Q")).is_err());
    }

    #[test]
    fn test_safe() {
        let value = safe(&Value::from("<b>bold</b>")).unwrap();
        assert!(value.is_safe());
        for bad in [
            "<SCRIPT>alert(1)</SCRIPT>",
            "<a href=\"javascript:x()\">",
            "<img src=data:image/png>",
            "<div onclick = \"x()\">",
        ] {
            assert_eq!(
                safe(&Value::from(bad)).unwrap_err().detail(),
                Some("HTML content contains potentially unsafe elements")
            );
        }
    }
}
