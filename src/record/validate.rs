//! Attribute map validation against a template's declared parameters.

use crate::error::{EngineError, EngineResult};
use crate::naming::ParameterType;
use crate::template::ResourceParameter;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Validate an attribute map: every key must name a declared parameter and
/// every value must satisfy the parameter's type and pattern. Missing keys
/// are fine (partial records); explicit nulls clear the column. Returns the
/// matched (parameter, value) pairs in declaration order.
pub fn validate_attributes<'a>(
    parameters: &'a [ResourceParameter],
    attributes: &HashMap<String, Value>,
) -> EngineResult<Vec<(&'a ResourceParameter, Value)>> {
    let by_name: HashMap<&str, &ResourceParameter> = parameters
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();
    for key in attributes.keys() {
        if !by_name.contains_key(key.as_str()) {
            return Err(EngineError::Validation(format!(
                "unknown parameter: '{}'",
                key
            )));
        }
    }
    let mut out = Vec::new();
    for parameter in parameters {
        let Some(value) = attributes.get(&parameter.name) else {
            continue;
        };
        if !value.is_null() {
            check_value(parameter, value)?;
        }
        out.push((parameter, value.clone()));
    }
    Ok(out)
}

fn check_value(parameter: &ResourceParameter, value: &Value) -> EngineResult<()> {
    match &parameter.param_type {
        ParameterType::ShortText | ParameterType::LongText => {
            let s = expect_str(parameter, value)?;
            if parameter.param_type == ParameterType::ShortText && s.len() > 255 {
                return Err(EngineError::Validation(format!(
                    "'{}' must be at most 255 characters",
                    parameter.name
                )));
            }
            if let Some(pattern) = &parameter.pattern {
                let re = Regex::new(pattern)
                    .map_err(|e| EngineError::InvalidPattern(e.to_string()))?;
                if !re.is_match(s) {
                    return Err(EngineError::Validation(format!(
                        "'{}' does not match the required pattern",
                        parameter.name
                    )));
                }
            }
        }
        ParameterType::Integer => {
            if value.as_i64().is_none() {
                return Err(type_error(parameter, "an integer"));
            }
        }
        ParameterType::Decimal => {
            if value.as_f64().is_none() {
                return Err(type_error(parameter, "a number"));
            }
        }
        ParameterType::Boolean => {
            if !value.is_boolean() {
                return Err(type_error(parameter, "a boolean"));
            }
        }
        ParameterType::DateTime => {
            let s = expect_str(parameter, value)?;
            chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|_| type_error(parameter, "an RFC 3339 timestamp"))?;
        }
        ParameterType::Photo | ParameterType::Document => {
            expect_str(parameter, value)?;
        }
        ParameterType::Relation { .. } => {
            if value.as_i64().is_none() {
                return Err(type_error(parameter, "a record id"));
            }
        }
    }
    Ok(())
}

fn expect_str<'v>(parameter: &ResourceParameter, value: &'v Value) -> EngineResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| type_error(parameter, "a string"))
}

fn type_error(parameter: &ResourceParameter, expected: &str) -> EngineError {
    EngineError::Validation(format!("'{}' must be {}", parameter.name, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, param_type: ParameterType, pattern: Option<&str>) -> ResourceParameter {
        ResourceParameter {
            id: 1,
            template_id: 1,
            name: name.to_string(),
            column_name: name.to_string(),
            param_type,
            pattern: pattern.map(str::to_string),
        }
    }

    fn attrs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let params = vec![param("plate", ParameterType::ShortText, None)];
        let err = validate_attributes(&params, &attrs(&[("color", json!("red"))])).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn partial_maps_are_permitted() {
        let params = vec![
            param("plate", ParameterType::ShortText, None),
            param("seats", ParameterType::Integer, None),
        ];
        let out = validate_attributes(&params, &attrs(&[("seats", json!(4))])).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0.name, "seats");
    }

    #[test]
    fn pattern_is_enforced_on_text() {
        let params = vec![param(
            "plate",
            ParameterType::ShortText,
            Some("^[A-Z]{2}[0-9]{4}[A-Z]{2}$"),
        )];
        assert!(validate_attributes(&params, &attrs(&[("plate", json!("AA1234BB"))])).is_ok());
        assert!(validate_attributes(&params, &attrs(&[("plate", json!("nope"))])).is_err());
    }

    #[test]
    fn value_types_follow_declared_types() {
        let params = vec![
            param("seats", ParameterType::Integer, None),
            param("price", ParameterType::Decimal, None),
            param("active", ParameterType::Boolean, None),
            param("serviced_at", ParameterType::DateTime, None),
        ];
        assert!(validate_attributes(
            &params,
            &attrs(&[
                ("seats", json!(4)),
                ("price", json!(9.5)),
                ("active", json!(true)),
                ("serviced_at", json!("2024-03-01T10:00:00Z")),
            ])
        )
        .is_ok());
        assert!(validate_attributes(&params, &attrs(&[("seats", json!("four"))])).is_err());
        assert!(validate_attributes(&params, &attrs(&[("active", json!(1))])).is_err());
        assert!(validate_attributes(&params, &attrs(&[("serviced_at", json!("yesterday"))])).is_err());
    }

    #[test]
    fn explicit_null_clears_a_column() {
        let params = vec![param("plate", ParameterType::ShortText, Some("^[A-Z]+$"))];
        let out = validate_attributes(&params, &attrs(&[("plate", Value::Null)])).unwrap();
        assert_eq!(out[0].1, Value::Null);
    }

    #[test]
    fn relation_values_must_be_ids() {
        let params = vec![param(
            "owner_ref",
            ParameterType::Relation { template_id: 2 },
            None,
        )];
        assert!(validate_attributes(&params, &attrs(&[("owner_ref", json!(17))])).is_ok());
        assert!(validate_attributes(&params, &attrs(&[("owner_ref", json!("17"))])).is_err());
    }
}
