use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// One input record: feature/parameter name to raw value.
pub type Record = Map<String, Value>;

/// Service metadata merged into successful envelopes.
pub type ServiceMetadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        }
    }
}

/// Named, typed field. Written as a `["name", "type"]` pair in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, FieldType)", into = "(String, FieldType)")]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            ty,
        }
    }
}

impl From<(String, FieldType)> for Field {
    fn from((name, ty): (String, FieldType)) -> Self {
        Field { name, ty }
    }
}

impl From<Field> for (String, FieldType) {
    fn from(field: Field) -> Self {
        (field.name, field.ty)
    }
}

/// A converted feature cell. Columns of a batch may hold different variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<FeatureValue> for Value {
    fn from(value: FeatureValue) -> Self {
        match value {
            FeatureValue::Str(s) => Value::String(s),
            FeatureValue::Int(i) => Value::from(i),
            FeatureValue::Float(f) => Value::from(f),
            FeatureValue::Bool(b) => Value::Bool(b),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Str(s.to_string())
    }
}

impl From<i64> for FeatureValue {
    fn from(i: i64) -> Self {
        FeatureValue::Int(i)
    }
}

impl From<f64> for FeatureValue {
    fn from(f: f64) -> Self {
        FeatureValue::Float(f)
    }
}

impl From<bool> for FeatureValue {
    fn from(b: bool) -> Self {
        FeatureValue::Bool(b)
    }
}

/// Records to predict on. The variant alone decides how the result is shaped.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Record(Record),
    Batch(Vec<Record>),
}

impl Input {
    pub fn records(&self) -> &[Record] {
        match self {
            Input::Record(record) => std::slice::from_ref(record),
            Input::Batch(records) => records,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Input::Record(_))
    }
}

/// Transport-agnostic prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub input: Input,
    /// Source of keyword parameters.
    pub args: Record,
}

impl PredictRequest {
    /// A single record that also carries its parameters (GET query args).
    pub fn single(record: Record) -> Self {
        PredictRequest {
            args: record.clone(),
            input: Input::Record(record),
        }
    }

    pub fn batch(records: Vec<Record>, args: Record) -> Self {
        PredictRequest {
            input: Input::Batch(records),
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub status: Status,
    pub error_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub service: ServiceMetadata,
}

impl Metadata {
    /// Keys of the envelope itself; service metadata cannot override them.
    const RESERVED: [&'static str; 3] = ["status", "error_code", "error_message"];

    pub fn ok(mut service: ServiceMetadata) -> Self {
        for key in Self::RESERVED {
            service.remove(key);
        }
        Metadata {
            status: Status::Ok,
            error_code: 0,
            error_message: None,
            service,
        }
    }

    pub fn error(err: &ServiceError) -> Self {
        Metadata {
            status: Status::Error,
            error_code: err.code(),
            error_message: Some(err.report()),
            service: ServiceMetadata::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Envelope {
    pub fn success(result: Value, service: ServiceMetadata) -> Self {
        Envelope {
            metadata: Metadata::ok(service),
            result: Some(result),
        }
    }

    pub fn error(err: &ServiceError) -> Self {
        Envelope {
            metadata: Metadata::error(err),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use serde_json::json;

    #[test]
    fn fields_deserialize_from_pairs() {
        let fields: Vec<Field> =
            serde_json::from_value(json!([["sepal length", "float"], ["active", "bool"]])).unwrap();
        assert_eq!(
            fields,
            vec![
                Field::new("sepal length", FieldType::Float),
                Field::new("active", FieldType::Bool),
            ]
        );
    }

    #[test]
    fn success_envelope_merges_service_metadata() {
        let mut service = ServiceMetadata::new();
        service.insert("service_name".into(), json!("iris"));
        service.insert("service_version".into(), json!("0.1"));
        let envelope = Envelope::success(json!("class1"), service);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "metadata": {
                    "status": "OK",
                    "error_code": 0,
                    "service_name": "iris",
                    "service_version": "0.1",
                },
                "result": "class1",
            })
        );
    }

    #[test]
    fn service_metadata_cannot_override_status() {
        let mut service = ServiceMetadata::new();
        service.insert("status".into(), json!("custom"));
        service.insert("error_code".into(), json!(7));
        service.insert("error_message".into(), json!("nope"));
        service.insert("service_name".into(), json!("iris"));

        let text = serde_json::to_string(&Envelope::success(json!(1), service)).unwrap();
        assert_eq!(text.matches("\"status\"").count(), 1);
        assert_eq!(
            serde_json::from_str::<Value>(&text).unwrap(),
            json!({
                "metadata": {"status": "OK", "error_code": 0, "service_name": "iris"},
                "result": 1,
            })
        );
    }

    #[test]
    fn error_envelope_has_no_result() {
        let err = ServiceError::from(PredictError::with_code("mymessage", 123));
        assert_eq!(
            serde_json::to_value(Envelope::error(&err)).unwrap(),
            json!({
                "metadata": {
                    "status": "ERROR",
                    "error_code": 123,
                    "error_message": "mymessage",
                },
            })
        );
    }

    #[test]
    fn single_input_is_a_batch_of_one() {
        let mut record = Record::new();
        record.insert("a".into(), json!("1"));
        let input = Input::Record(record.clone());
        assert_eq!(input.records(), &[record.clone()]);
        assert!(input.is_single());
        assert!(!Input::Batch(vec![record]).is_single());
    }
}
