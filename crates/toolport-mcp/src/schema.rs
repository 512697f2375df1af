//! Tool parameter schemas.
//!
//! A [`ParamSchema`] is an ordered list of named, typed fields. It renders to
//! the JSON Schema advertised in `tools/list` and coerces the raw arguments
//! of a `tools/call` request into [`Params`] before the handler runs, so a
//! handler only ever sees arguments of the declared types with defaults
//! filled in, deserialized into its own parameter struct.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use toolport_core::{Error, Result};

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Accepts any JSON value.
    Any,
}

impl ParamType {
    fn json_type(self) -> Option<&'static str> {
        match self {
            ParamType::String => Some("string"),
            ParamType::Integer => Some("integer"),
            ParamType::Number => Some("number"),
            ParamType::Boolean => Some("boolean"),
            ParamType::Object => Some("object"),
            ParamType::Array => Some("array"),
            ParamType::Any => None,
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: String,
    pub ty: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub allowed: Option<Vec<String>>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

/// Ordered set of parameters accepted by a tool.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: ParamField) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Add a required parameter.
    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(ParamField {
            name: name.to_string(),
            ty,
            description: description.to_string(),
            required: true,
            default: None,
            allowed: None,
            minimum: None,
            maximum: None,
        })
    }

    /// Add an optional parameter without a default.
    pub fn optional(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(ParamField {
            name: name.to_string(),
            ty,
            description: description.to_string(),
            required: false,
            default: None,
            allowed: None,
            minimum: None,
            maximum: None,
        })
    }

    /// Add an optional parameter filled with `default` when absent.
    pub fn with_default(
        self,
        name: &str,
        ty: ParamType,
        description: &str,
        default: impl Into<Value>,
    ) -> Self {
        self.push(ParamField {
            name: name.to_string(),
            ty,
            description: description.to_string(),
            required: false,
            default: Some(default.into()),
            allowed: None,
            minimum: None,
            maximum: None,
        })
    }

    /// Restrict the most recently added parameter to a set of string values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    /// Bound the most recently added numeric parameter, inclusive.
    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.minimum = Some(minimum);
            field.maximum = Some(maximum);
        }
        self
    }

    /// Lower bound only, for counts and ids.
    pub fn at_least(mut self, minimum: i64) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.minimum = Some(minimum);
        }
        self
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = Map::new();
            if let Some(ty) = field.ty.json_type() {
                prop.insert("type".to_string(), Value::String(ty.to_string()));
            }
            prop.insert(
                "description".to_string(),
                Value::String(field.description.clone()),
            );
            if let Some(allowed) = &field.allowed {
                prop.insert(
                    "enum".to_string(),
                    Value::Array(allowed.iter().cloned().map(Value::String).collect()),
                );
            }
            if let Some(minimum) = field.minimum {
                prop.insert("minimum".to_string(), Value::from(minimum));
            }
            if let Some(maximum) = field.maximum {
                prop.insert("maximum".to_string(), Value::from(maximum));
            }
            if let Some(default) = &field.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(prop));

            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// Validate and coerce raw arguments against the schema.
    ///
    /// `null` counts as absent, defaults are applied, undeclared arguments
    /// are dropped. The first offending field is reported.
    pub fn coerce(&self, raw: Option<Value>) -> Result<Params> {
        let mut input = match raw {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(Error::validation(
                    "arguments",
                    format!("expected an object, got {}", kind_of(&other)),
                ))
            }
        };

        let mut values = Map::new();
        for field in &self.fields {
            let value = match input.remove(&field.name) {
                None | Some(Value::Null) => None,
                Some(v) => Some(coerce_value(field, v)?),
            };

            match (value, &field.default) {
                (Some(v), _) => {
                    values.insert(field.name.clone(), v);
                }
                (None, Some(default)) => {
                    values.insert(field.name.clone(), default.clone());
                }
                (None, None) if field.required => {
                    return Err(Error::validation(&field.name, "is required"));
                }
                (None, None) => {}
            }
        }

        if !input.is_empty() {
            let ignored: Vec<&String> = input.keys().collect();
            tracing::debug!(ignored = ?ignored, "Dropping undeclared arguments");
        }

        Ok(Params { values })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_value(field: &ParamField, value: Value) -> Result<Value> {
    let mismatch = |value: &Value| {
        Error::validation(
            &field.name,
            format!(
                "expected {}, got {}",
                field.ty.json_type().unwrap_or("any"),
                kind_of(value)
            ),
        )
    };

    let coerced = match (field.ty, value) {
        (ParamType::Any, v) => v,
        (ParamType::String, Value::String(s)) => Value::String(s),
        (ParamType::String, Value::Number(n)) => Value::String(n.to_string()),
        (ParamType::String, Value::Bool(b)) => Value::String(b.to_string()),
        (ParamType::Integer, Value::Number(n)) => match integer_of(&n) {
            Some(i) => Value::Number(i.into()),
            None => return Err(mismatch(&Value::Number(n))),
        },
        (ParamType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Number(i.into()),
            Err(_) => {
                return Err(Error::validation(
                    &field.name,
                    format!("expected integer, got '{}'", s),
                ))
            }
        },
        (ParamType::Number, Value::Number(n)) => Value::Number(n),
        (ParamType::Number, Value::String(s)) => {
            match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => {
                    return Err(Error::validation(
                        &field.name,
                        format!("expected number, got '{}'", s),
                    ))
                }
            }
        }
        (ParamType::Boolean, Value::Bool(b)) => Value::Bool(b),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => {
                return Err(Error::validation(
                    &field.name,
                    format!("expected boolean, got '{}'", s),
                ))
            }
        },
        (ParamType::Object, v @ Value::Object(_)) => v,
        (ParamType::Array, v @ Value::Array(_)) => v,
        (_, other) => return Err(mismatch(&other)),
    };

    if let (Some(allowed), Value::String(s)) = (&field.allowed, &coerced) {
        if !allowed.iter().any(|a| a == s) {
            return Err(Error::validation(
                &field.name,
                format!("must be one of {}, got '{}'", allowed.join(", "), s),
            ));
        }
    }

    if let Some(n) = coerced.as_f64() {
        let out_of_range = match (field.minimum, field.maximum) {
            (Some(min), Some(max)) if n < min as f64 || n > max as f64 => {
                Some(format!("must be between {} and {}", min, max))
            }
            (Some(min), None) if n < min as f64 => Some(format!("must be at least {}", min)),
            (None, Some(max)) if n > max as f64 => Some(format!("must be at most {}", max)),
            _ => None,
        };
        if let Some(message) = out_of_range {
            return Err(Error::validation(&field.name, message));
        }
    }

    Ok(coerced)
}

fn integer_of(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

/// Arguments after schema coercion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: Map<String, Value>,
}

impl Params {
    /// Raw access to a value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Required string parameter.
    pub fn str(&self, name: &str) -> Result<&str> {
        self.opt_str(name)
            .ok_or_else(|| Error::validation(name, "is required"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Deserialize all parameters into a typed struct.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(Value::Object(self.values))
            .map_err(|e| Error::validation("arguments", e.to_string()))
    }
}
