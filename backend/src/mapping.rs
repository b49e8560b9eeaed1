//! Declarative schemas turning loosely typed records into model inputs.
//!
//! A [`Schema`] is an ordered list of `(name, type)` fields. Used as a feature
//! mapping it yields one typed row per record, in field order; used as a
//! parameter mapping it yields keyword arguments, falling back to model
//! attributes for anything the record does not carry.

use std::collections::{BTreeMap, HashSet};

use ndarray::Array2;
use serde_json::Value;

use crate::error::{SchemaError, ServiceError};
use crate::inference::Model;
use crate::models::{FeatureValue, Field, FieldType, Record};

/// N records by F features.
pub type FeatureBatch = Array2<FeatureValue>;

/// Keyword parameters for a predict call. A missing key means "not passed".
pub type Params = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Schema { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Typed feature row for one record. Every field must be present.
    pub fn sample(&self, record: &Record) -> Result<Vec<FeatureValue>, ServiceError> {
        self.fields
            .iter()
            .map(|field| {
                let raw = record.get(&field.name).ok_or_else(|| {
                    ServiceError::bad_request(format!("missing feature '{}'", field.name))
                })?;
                convert(field, raw)
            })
            .collect()
    }

    pub fn samples(&self, records: &[Record]) -> Result<FeatureBatch, ServiceError> {
        let mut cells = Vec::with_capacity(records.len() * self.fields.len());
        for record in records {
            cells.extend(self.sample(record)?);
        }
        Ok(Array2::from_shape_vec((records.len(), self.fields.len()), cells)?)
    }

    /// Keyword parameters from `record`, defaulting to model attributes.
    pub fn params(&self, model: &dyn Model, record: &Record) -> Result<Params, ServiceError> {
        let mut params = Params::new();
        for field in &self.fields {
            let value = match record.get(&field.name) {
                Some(raw) => Some(convert(field, raw)?.into()),
                None => model.attribute(&field.name),
            };
            if let Some(value) = value {
                params.insert(field.name.clone(), value);
            }
        }
        Ok(params)
    }
}

/// Convert one raw value according to the field type.
pub fn convert(field: &Field, raw: &Value) -> Result<FeatureValue, ServiceError> {
    let converted = match field.ty {
        FieldType::Str => match raw {
            Value::String(s) => Some(FeatureValue::Str(s.clone())),
            Value::Null => None,
            other => Some(FeatureValue::Str(other.to_string())),
        },
        FieldType::Int => to_int(raw).map(FeatureValue::Int),
        FieldType::Float => to_float(raw).map(FeatureValue::Float),
        FieldType::Bool => Some(FeatureValue::Bool(is_true(raw))),
    };
    converted.ok_or_else(|| {
        ServiceError::bad_request(format!(
            "invalid value {} for feature '{}' of type {}",
            raw,
            field.name,
            field.ty.as_str()
        ))
    })
}

fn to_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

// NaN and infinities have no JSON form, so they are rejected rather than
// passed on as null.
fn to_float(raw: &Value) -> Option<f64> {
    let parsed = match raw {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite())
}

// Only the literal "true" token counts; "1", "yes" and "on" do not.
fn is_true(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
