//! Named validation rules applied to record fields before writes.

use crate::config::ValidationRule;
use crate::error::AppError;
use crate::model::Record;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full record. Required fields must be present and non-null.
    pub fn validate(record: &Record, rules: &HashMap<String, ValidationRule>) -> Result<(), AppError> {
        for (col, rule) in rules {
            let val = record.value(col);
            if rule.required == Some(true) && val.map_or(true, Value::is_null) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present (update deltas). Required is not enforced for missing fields.
    pub fn validate_partial(record: &Record, rules: &HashMap<String, ValidationRule>) -> Result<(), AppError> {
        for (col, v) in record.scalars() {
            if let Some(rule) = rules.get(col) {
                if rule.required == Some(true) && v.is_null() {
                    return Err(AppError::Validation(format!("{} is required", col)));
                }
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::Validation(format!("{} must be at most {} characters", col, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::Validation(format!("{} must be at least {} characters", col, min)));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    let n = as_number(v);
    if let (Some(min), Some(n)) = (rule.minimum, n) {
        if n < min {
            return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, n) {
        if n > max {
            return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
        }
    }
    Ok(())
}

/// Form input arrives as strings; numeric rules accept numeric text.
fn as_number(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::String(s), Value::Number(m)) | (Value::Number(m), Value::String(s)) => {
            s.parse::<f64>().ok() == m.as_f64()
        }
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let ok = match format.to_lowercase().as_str() {
        "email" => v.as_str().map_or(true, |s| {
            s.len() >= 3 && s.split_once('@').map_or(false, |(u, d)| !u.is_empty() && !d.is_empty())
        }),
        "uuid" => v.as_str().map_or(true, |s| uuid::Uuid::parse_str(s).is_ok()),
        "numeric" => as_number(v).is_some(),
        "integer" => v.is_i64() || v.is_u64() || v.as_str().map_or(false, |s| s.trim().parse::<i64>().is_ok()),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} must be a valid {}", col, format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(col: &str, rule: ValidationRule) -> HashMap<String, ValidationRule> {
        HashMap::from([(col.to_string(), rule)])
    }

    #[test]
    fn required_field_missing_or_null() {
        let r = rules(
            "title",
            ValidationRule {
                required: Some(true),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&Record::new(), &r).is_err());
        let rec = Record::from_iter([("title", Value::Null)]);
        assert!(RequestValidator::validate(&rec, &r).is_err());
        let rec = Record::from_iter([("title", json!("x"))]);
        assert!(RequestValidator::validate(&rec, &r).is_ok());
    }

    #[test]
    fn partial_ignores_missing_required() {
        let r = rules(
            "title",
            ValidationRule {
                required: Some(true),
                ..Default::default()
            },
        );
        let rec = Record::from_iter([("body", json!("x"))]);
        assert!(RequestValidator::validate_partial(&rec, &r).is_ok());
    }

    #[test]
    fn lengths_count_characters() {
        let r = rules(
            "name",
            ValidationRule {
                max_length: Some(3),
                ..Default::default()
            },
        );
        let rec = Record::from_iter([("name", json!("äöü"))]);
        assert!(RequestValidator::validate(&rec, &r).is_ok());
        let rec = Record::from_iter([("name", json!("abcd"))]);
        assert!(matches!(RequestValidator::validate(&rec, &r), Err(AppError::Validation(_))));
    }

    #[test]
    fn formats_and_ranges() {
        let r = rules(
            "email",
            ValidationRule {
                format: Some("email".into()),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&Record::from_iter([("email", json!("a@b"))]), &r).is_ok());
        assert!(RequestValidator::validate(&Record::from_iter([("email", json!("@b"))]), &r).is_err());

        let r = rules(
            "score",
            ValidationRule {
                minimum: Some(1.0),
                maximum: Some(5.0),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&Record::from_iter([("score", json!("3"))]), &r).is_ok());
        assert!(RequestValidator::validate(&Record::from_iter([("score", json!(6))]), &r).is_err());
    }

    #[test]
    fn allowed_compares_numbers_loosely() {
        let r = rules(
            "status",
            ValidationRule {
                allowed: Some(vec![json!(1), json!(2)]),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&Record::from_iter([("status", json!("2"))]), &r).is_ok());
        assert!(RequestValidator::validate(&Record::from_iter([("status", json!(3))]), &r).is_err());
    }
}
