use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, bail};
use log::info;
use ndarray::Array2;
use serde_json::{json, Value};
use tract_onnx::prelude::*;

use crate::alive::ProcessStore;
use crate::mapping::{FeatureBatch, Params};
use crate::models::FeatureValue;

/// What a predict call returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// One JSON value per record: scalars, strings or whole structures.
    Values(Vec<Value>),
    /// One numeric row per record.
    Matrix(Array2<f64>),
}

impl Output {
    pub fn len(&self) -> usize {
        match self {
            Output::Values(values) => values.len(),
            Output::Matrix(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-record JSON values; matrix rows become arrays of numbers.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Output::Values(values) => values,
            Output::Matrix(m) => m.rows().into_iter().map(|row| Value::from(row.to_vec())).collect(),
        }
    }
}

/// A fitted model as seen by the serving layer.
pub trait Model: Send + Sync {
    fn predict(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Output>;

    fn predict_proba(&self, _features: &FeatureBatch, _params: &Params) -> anyhow::Result<Array2<f64>> {
        bail!("model does not support predict_proba")
    }

    /// Named attribute, used as a parameter default.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Description reported by the liveness endpoint.
    fn metadata(&self) -> Value {
        json!({})
    }
}

/// Source of the model to serve.
pub trait ModelPersister: Send + Sync {
    fn read(&self) -> anyhow::Result<Arc<dyn Model>>;
}

/// Persister holding the model currently in service.
pub struct ActiveModel {
    current: RwLock<Option<Arc<dyn Model>>>,
    store: Arc<ProcessStore>,
}

impl ActiveModel {
    pub fn new(store: Arc<ProcessStore>) -> Self {
        ActiveModel {
            current: RwLock::new(None),
            store,
        }
    }

    /// Swap in a new model; requests already running keep the old one.
    pub fn replace(&self, model: Arc<dyn Model>) {
        self.store.insert("model", model.metadata());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(model);
        info!("Active model replaced");
    }
}

impl ModelPersister for ActiveModel {
    fn read(&self) -> anyhow::Result<Arc<dyn Model>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| anyhow!("no model loaded"))
    }
}

/// Binary classifier exported to ONNX: `1 x n_features` f32 in, one logit out.
pub struct OnnxModel {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    n_features: usize,
    pub threshold: f32,
    source: String,
}

impl OnnxModel {
    pub fn load<P: AsRef<Path>>(model_path: P, n_features: usize, threshold: f32) -> TractResult<Self> {
        let source = model_path.as_ref().display().to_string();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, n_features)),
            )?
            .into_optimized()?
            .into_runnable()?;

        info!("ONNX model loaded from {} ({} features)", source, n_features);
        Ok(Self {
            model,
            n_features,
            threshold,
            source,
        })
    }

    fn probabilities(&self, features: &FeatureBatch) -> anyhow::Result<Vec<f32>> {
        if features.ncols() != self.n_features {
            bail!(
                "expected {} features, got {}",
                self.n_features,
                features.ncols()
            );
        }
        features
            .rows()
            .into_iter()
            .map(|row| -> anyhow::Result<f32> {
                let values = row.iter().map(to_f32).collect::<anyhow::Result<Vec<f32>>>()?;
                let input_tensor = Tensor::from_shape(&[1, self.n_features], values.as_slice())?;
                let outputs = self.model.run(tvec!(input_tensor.into()))?;
                let logit: f32 = *outputs[0]
                    .to_array_view::<f32>()?
                    .iter()
                    .next()
                    .ok_or_else(|| anyhow!("model produced no output"))?;
                Ok(sigmoid(logit))
            })
            .collect()
    }

    fn threshold_from(&self, params: &Params) -> f32 {
        params
            .get("threshold")
            .and_then(Value::as_f64)
            .map(|t| t as f32)
            .unwrap_or(self.threshold)
    }
}

impl Model for OnnxModel {
    fn predict(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Output> {
        let threshold = self.threshold_from(params);
        let labels = self
            .probabilities(features)?
            .into_iter()
            .map(|p| Value::from(i64::from(p >= threshold)))
            .collect();
        Ok(Output::Values(labels))
    }

    fn predict_proba(&self, features: &FeatureBatch, _params: &Params) -> anyhow::Result<Array2<f64>> {
        let probabilities = self.probabilities(features)?;
        let cells = probabilities
            .iter()
            .flat_map(|&p| [1.0 - f64::from(p), f64::from(p)])
            .collect();
        Ok(Array2::from_shape_vec((probabilities.len(), 2), cells)?)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "threshold" => Some(json!(self.threshold)),
            "n_features" => Some(json!(self.n_features)),
            _ => None,
        }
    }

    fn metadata(&self) -> Value {
        json!({
            "source": self.source,
            "n_features": self.n_features,
            "threshold": self.threshold,
        })
    }
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

fn to_f32(value: &FeatureValue) -> anyhow::Result<f32> {
    match value {
        FeatureValue::Float(f) => Ok(*f as f32),
        FeatureValue::Int(i) => Ok(*i as f32),
        FeatureValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        FeatureValue::Str(s) => s
            .parse()
            .map_err(|_| anyhow!("feature value {:?} is not numeric", s)),
    }
}
