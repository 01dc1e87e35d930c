use anyhow::{Context, Error, bail, ensure};
use std::collections::BTreeMap;
use toml::{Table, Value};

/// A single optional entity option accepted by a platform.
#[derive(Clone, Debug)]
pub struct SchemaField {
    pub key: &'static str,
    pub kind: FieldKind,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    /// Free-form text.
    Text,
    /// Text restricted to a fixed set of values.
    OneOf(&'static [&'static str]),
    /// Number coerced to float, bounds inclusive.
    Float { min: f64, max: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Text(String),
    Float(f64),
}

/// Entity options that passed validation against a platform schema.
#[derive(Debug, Default, PartialEq)]
pub struct ValidatedOptions(BTreeMap<&'static str, OptionValue>);

impl ValidatedOptions {
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            OptionValue::Text(s) => Some(s),
            OptionValue::Float(_) => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            OptionValue::Float(n) => Some(*n),
            OptionValue::Text(_) => None,
        }
    }
}

pub fn validate(schema: &[SchemaField], options: &Table) -> Result<ValidatedOptions, Error> {
    let mut validated = BTreeMap::new();
    for (key, value) in options {
        let Some(field) = schema.iter().find(|field| field.key == key) else {
            bail!("Unknown option {key}");
        };
        let value = validate_value(&field.kind, value).with_context(|| format!("Invalid {key}"))?;
        validated.insert(field.key, value);
    }
    Ok(ValidatedOptions(validated))
}

fn validate_value(kind: &FieldKind, value: &Value) -> Result<OptionValue, Error> {
    match kind {
        FieldKind::Text => match value {
            Value::String(s) => Ok(OptionValue::Text(s.clone())),
            other => bail!("Expected string, got {}", other.type_str()),
        },
        FieldKind::OneOf(allowed) => match value {
            Value::String(s) => {
                ensure!(allowed.contains(&s.as_str()), "Value {s:?} is not allowed");
                Ok(OptionValue::Text(s.clone()))
            }
            other => bail!("Expected string, got {}", other.type_str()),
        },
        FieldKind::Float { min, max } => {
            let n = coerce_float(value)?;
            ensure!(
                (*min..=*max).contains(&n),
                "Value {n} is out of range [{min}, {max}]"
            );
            Ok(OptionValue::Float(n))
        }
    }
}

fn coerce_float(value: &Value) -> Result<f64, Error> {
    match value {
        Value::Float(n) => Ok(*n),
        Value::Integer(n) => Ok(*n as f64),
        Value::String(s) => s.trim().parse().context("Failed to parse number"),
        other => bail!("Expected number, got {}", other.type_str()),
    }
}
