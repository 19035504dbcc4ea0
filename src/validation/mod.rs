//! Field validators and the aggregate validation pass.
//!
//! Each `check_*` function is pure: raw JSON in, normalized value or a
//! single reason out. [`Validator`] runs them over a request body and keeps
//! every failure, so a client sees all rejected fields in one response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors, NON_FIELD_ERRORS};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is a valid regex"));

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";

/// Create and PUT validate the whole representation; PATCH only what was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    Partial,
}

/// A validated input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Column change for an update: `None` keeps the stored value,
    /// `Some(None)` clears it. A full update clears omitted fields.
    pub fn into_change(self, mode: Mode) -> Option<Option<T>> {
        match self {
            Field::Value(v) => Some(Some(v)),
            Field::Null => Some(None),
            Field::Absent => match mode {
                Mode::Full => Some(None),
                Mode::Partial => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Slug,
}

impl Pattern {
    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Slug => SLUG_RE.is_match(value),
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Pattern::Slug => {
                "Enter a valid \u{201c}slug\u{201d} consisting of letters, numbers, underscores or hyphens."
            }
        }
    }
}

/// Constraint descriptor for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub required: bool,
    pub nullable: bool,
    pub max_length: Option<usize>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub pattern: Option<Pattern>,
}

impl FieldRule {
    pub const fn required() -> Self {
        Self {
            required: true,
            nullable: false,
            max_length: None,
            min_value: None,
            max_value: None,
            pattern: None,
        }
    }

    pub const fn optional() -> Self {
        Self {
            required: false,
            nullable: true,
            ..Self::required()
        }
    }

    pub const fn max_length(self, max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..self
        }
    }

    pub const fn range(self, min_value: i64, max_value: i64) -> Self {
        Self {
            min_value: Some(min_value),
            max_value: Some(max_value),
            ..self
        }
    }

    pub const fn pattern(self, pattern: Pattern) -> Self {
        Self {
            pattern: Some(pattern),
            ..self
        }
    }

    pub const fn not_null(self) -> Self {
        Self { nullable: false, ..self }
    }
}

/// Shared presence handling: absent, null, or a value to check further.
fn presence<'v>(raw: Option<&'v Value>, rule: &FieldRule, mode: Mode) -> Result<Option<&'v Value>, Option<String>> {
    match raw {
        None if rule.required && mode == Mode::Full => Err(Some(REQUIRED.to_string())),
        None => Err(None),
        Some(Value::Null) if !rule.nullable => Err(Some(NOT_NULL.to_string())),
        Some(Value::Null) => Ok(None),
        Some(v) => Ok(Some(v)),
    }
}

macro_rules! resolve_presence {
    ($raw:expr, $rule:expr, $mode:expr) => {
        match presence($raw, $rule, $mode) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(Field::Null),
            Err(None) => return Ok(Field::Absent),
            Err(Some(reason)) => return Err(reason),
        }
    };
}

/// Trimmed string, with blank, length and pattern checks.
pub fn check_string(raw: Option<&Value>, rule: &FieldRule, mode: Mode) -> Result<Field<String>, String> {
    let value = resolve_presence!(raw, rule, mode);
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err("Not a valid string.".to_string()),
    };

    if text.is_empty() && rule.required {
        return Err(NOT_BLANK.to_string());
    }
    if let Some(max) = rule.max_length {
        if text.chars().count() > max {
            return Err(format!("Ensure this field has no more than {} characters.", max));
        }
    }
    if let Some(pattern) = rule.pattern {
        if !text.is_empty() && !pattern.matches(&text) {
            return Err(pattern.message().to_string());
        }
    }
    Ok(Field::Value(text))
}

/// Whole number given as a JSON number or numeric string, with range checks.
pub fn check_integer(raw: Option<&Value>, rule: &FieldRule, mode: Mode) -> Result<Field<i64>, String> {
    let value = resolve_presence!(raw, rule, mode);
    let invalid = || "A valid integer is required.".to_string();

    let number: i128 = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i as i128
            } else if let Some(u) = n.as_u64() {
                u as i128
            } else {
                let f = n.as_f64().ok_or_else(invalid)?;
                if f.fract() != 0.0 || !f.is_finite() || f.abs() > 1e30 {
                    return Err(invalid());
                }
                f as i128
            }
        }
        Value::String(s) => s.trim().parse::<i128>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if let Some(min) = rule.min_value {
        if number < min as i128 {
            return Err(format!("Ensure this value is greater than or equal to {}.", min));
        }
    }
    let max = rule.max_value.unwrap_or(i64::MAX);
    if number > max as i128 {
        return Err(format!("Ensure this value is less than or equal to {}.", max));
    }
    if number < i64::MIN as i128 {
        return Err(invalid());
    }
    Ok(Field::Value(number as i64))
}

/// UUID given as a string.
pub fn check_uuid(raw: Option<&Value>, rule: &FieldRule, mode: Mode) -> Result<Field<Uuid>, String> {
    let value = resolve_presence!(raw, rule, mode);
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(Field::Value)
        .ok_or_else(|| "Must be a valid UUID.".to_string())
}

/// Integer primary key of a related record.
pub fn check_pk(raw: Option<&Value>, rule: &FieldRule, mode: Mode) -> Result<Field<i64>, String> {
    let value = resolve_presence!(raw, rule, mode);
    match value {
        Value::Number(n) if n.is_i64() => Ok(Field::Value(n.as_i64().unwrap_or_default())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Field::Value)
            .map_err(|_| format!("Incorrect type. Expected pk value, received {}.", json_type(value))),
        other => Err(format!("Incorrect type. Expected pk value, received {}.", json_type(other))),
    }
}

pub fn invalid_pk(pk: impl std::fmt::Display) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", pk)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Aggregate validation pass over one request body.
pub struct Validator<'a> {
    body: &'a Map<String, Value>,
    mode: Mode,
    errors: FieldErrors,
}

impl<'a> Validator<'a> {
    pub fn new(body: &'a Value, mode: Mode) -> Result<Self, ApiError> {
        match body {
            Value::Object(map) => Ok(Self {
                body: map,
                mode,
                errors: FieldErrors::new(),
            }),
            other => Err(ApiError::field(
                NON_FIELD_ERRORS,
                format!("Invalid data. Expected a dictionary, but got {}.", json_type(other)),
            )),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.body.get(name)
    }

    pub fn string(&mut self, name: &str, rule: &FieldRule) -> Field<String> {
        let outcome = check_string(self.raw(name), rule, self.mode);
        self.record(name, outcome)
    }

    pub fn integer(&mut self, name: &str, rule: &FieldRule) -> Field<i64> {
        let outcome = check_integer(self.raw(name), rule, self.mode);
        self.record(name, outcome)
    }

    pub fn uuid(&mut self, name: &str, rule: &FieldRule) -> Field<Uuid> {
        let outcome = check_uuid(self.raw(name), rule, self.mode);
        self.record(name, outcome)
    }

    pub fn pk(&mut self, name: &str, rule: &FieldRule) -> Field<i64> {
        let outcome = check_pk(self.raw(name), rule, self.mode);
        self.record(name, outcome)
    }

    pub fn error(&mut self, name: &str, reason: impl Into<String>) {
        self.errors.entry(name.to_string()).or_default().push(reason.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    fn record<T>(&mut self, name: &str, outcome: Result<Field<T>, String>) -> Field<T> {
        match outcome {
            Ok(field) => field,
            Err(reason) => {
                self.error(name, reason);
                Field::Absent
            }
        }
    }
}
