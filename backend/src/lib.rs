//! Prediction serving: typed feature/parameter mapping, a dispatcher that
//! wraps model output in a JSON envelope, and HTTP and line-stream adapters
//! in front of it.

pub mod alive;
pub mod config;
pub mod error;
pub mod inference;
pub mod mapping;
pub mod models;
pub mod server;
pub mod service;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{PredictError, ServiceError};
pub use inference::{ActiveModel, Model, ModelPersister, OnnxModel, Output};
pub use mapping::{FeatureBatch, Params, Schema};
pub use models::{Envelope, FeatureValue, Field, FieldType, Input, PredictRequest, Record};
pub use service::{PredictService, Response};
pub use stream::PredictStream;
