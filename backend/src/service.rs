//! Prediction dispatcher shared by the HTTP and stream adapters.
//!
//! One call turns a [`PredictRequest`] into an [`Envelope`] and a status code:
//! features and parameters are mapped, the model is invoked, its output is
//! shaped, and every failure is classified into caller input (400), a
//! model-declared [`PredictError`](crate::error::PredictError) (500 with the
//! model's code), or anything else (500, code -1).

use log::{error, warn};
use serde_json::Value;

use crate::config::PredictServiceConfig;
use crate::error::{SchemaError, ServiceError};
use crate::inference::Model;
use crate::mapping::Schema;
use crate::models::{Envelope, PredictRequest, ServiceMetadata};

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub envelope: Envelope,
    pub status: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PredictService {
    mapping: Schema,
    params: Schema,
    predict_proba: bool,
    service_metadata: ServiceMetadata,
}

impl PredictService {
    pub fn new(mapping: Schema, params: Schema) -> Self {
        PredictService {
            mapping,
            params,
            ..Default::default()
        }
    }

    pub fn from_config(
        config: &PredictServiceConfig,
        service_metadata: ServiceMetadata,
    ) -> Result<Self, SchemaError> {
        Ok(Self::new(
            Schema::new(config.mapping.clone())?,
            Schema::new(config.params.clone())?,
        )
        .with_predict_proba(config.predict_proba)
        .with_service_metadata(service_metadata))
    }

    pub fn with_predict_proba(mut self, predict_proba: bool) -> Self {
        self.predict_proba = predict_proba;
        self
    }

    pub fn with_service_metadata(mut self, service_metadata: ServiceMetadata) -> Self {
        self.service_metadata = service_metadata;
        self
    }

    pub fn mapping(&self) -> &Schema {
        &self.mapping
    }

    pub fn handle(&self, model: &dyn Model, request: &PredictRequest) -> Response {
        self.respond(self.run(model, request))
    }

    /// Predict and shape the result, without building an envelope.
    pub fn run(&self, model: &dyn Model, request: &PredictRequest) -> Result<Value, ServiceError> {
        let records = request.input.records();
        let features = self.mapping.samples(records)?;
        let params = self.params.params(model, &request.args)?;

        if self.predict_proba {
            let proba = model.predict_proba(&features, &params)?;
            let first = proba
                .rows()
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::internal("predict_proba returned no rows"))?;
            return Ok(Value::from(first.to_vec()));
        }

        let output = model.predict(&features, &params)?;
        if request.input.is_single() && output.len() == 1 {
            let mut values = output.into_values();
            return Ok(values.remove(0));
        }
        if request.input.is_single() {
            return Err(ServiceError::internal(format!(
                "expected one prediction for a single record, got {}",
                output.len()
            )));
        }
        Ok(Value::Array(output.into_values()))
    }

    /// Wrap a result into its envelope and status, logging failures.
    pub fn respond(&self, result: Result<Value, ServiceError>) -> Response {
        match result {
            Ok(value) => Response {
                envelope: Envelope::success(value, self.service_metadata.clone()),
                status: 200,
            },
            Err(err) => {
                match &err {
                    ServiceError::BadRequest(_) => warn!("Bad request: {}", err),
                    ServiceError::Predict(e) => error!("Prediction failed ({}): {}", e.code, e),
                    other => error!("Unexpected error: {}: {}", other.kind(), other),
                }
                Response {
                    status: err.status(),
                    envelope: Envelope::error(&err),
                }
            }
        }
    }
}
