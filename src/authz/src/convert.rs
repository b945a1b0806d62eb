//! Value conversion between serde_json::Value and HostValue

use crate::error::{PolarError, Result};
use crate::value::HostValue;
use serde_json::Value as JsonValue;

/// Convert serde_json::Value to HostValue
pub fn json_to_host(value: &JsonValue) -> HostValue {
    match value {
        JsonValue::Null => HostValue::Null,
        JsonValue::Bool(b) => HostValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                HostValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                // u64 beyond i64::MAX lands here too
                HostValue::Float(f)
            } else {
                HostValue::Null
            }
        }
        JsonValue::String(s) => HostValue::String(s.clone()),
        JsonValue::Array(arr) => HostValue::List(arr.iter().map(json_to_host).collect()),
        JsonValue::Object(obj) => HostValue::Map(
            obj.iter()
                .map(|(k, v)| (k.clone(), json_to_host(v)))
                .collect(),
        ),
    }
}

/// Convert HostValue to serde_json::Value
///
/// Instances and variables have no JSON form and produce a `Marshal` error.
/// Non-finite floats become `null`.
pub fn host_to_json(value: &HostValue) -> Result<JsonValue> {
    Ok(match value {
        HostValue::Null => JsonValue::Null,
        HostValue::Boolean(b) => JsonValue::Bool(*b),
        HostValue::Integer(i) => JsonValue::Number((*i).into()),
        HostValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        HostValue::String(s) => JsonValue::String(s.clone()),
        HostValue::List(items) => {
            JsonValue::Array(items.iter().map(host_to_json).collect::<Result<_>>()?)
        }
        HostValue::Map(fields) => {
            let mut json_obj = serde_json::Map::new();
            for (k, v) in fields {
                json_obj.insert(k.clone(), host_to_json(v)?);
            }
            JsonValue::Object(json_obj)
        }
        HostValue::Instance(instance) => {
            return Err(PolarError::Marshal(format!(
                "cannot convert instance of {} to JSON",
                instance.type_name()
            )))
        }
        HostValue::Variable(name) => {
            return Err(PolarError::Marshal(format!(
                "unbound variable `{}` has no JSON value",
                name
            )))
        }
    })
}

impl From<JsonValue> for HostValue {
    fn from(value: JsonValue) -> Self {
        json_to_host(&value)
    }
}

impl HostValue {
    pub fn to_json(&self) -> Result<JsonValue> {
        host_to_json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let value = json!({
            "name": "alice",
            "age": 30,
            "score": 0.5,
            "roles": ["admin", "user"],
            "manager": null,
            "active": true
        });
        let host = HostValue::from(value.clone());
        assert_eq!(host.to_json().unwrap(), value);
    }

    #[test]
    fn test_instances_have_no_json_form() {
        #[derive(Debug)]
        struct Opaque;
        impl crate::value::PolarObject for Opaque {
            fn get_field(&self, _name: &str) -> Option<HostValue> {
                None
            }
        }
        let value = HostValue::Instance(crate::value::Instance::new(Opaque));
        assert!(matches!(value.to_json(), Err(PolarError::Marshal(_))));
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(HostValue::Float(f64::NAN).to_json().unwrap(), JsonValue::Null);
    }
}
