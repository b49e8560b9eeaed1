//! In-crate fake model for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ndarray::Array2;
use serde_json::Value;

use crate::error::PredictError;
use crate::inference::{Model, Output};
use crate::mapping::{FeatureBatch, Params};

#[derive(Debug, Clone)]
pub enum Behavior {
    Fixed(Output),
    PerRow(Value),
    Fail(PredictError),
    Broken(String),
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Fixed(Output::Values(Vec::new()))
    }
}

#[derive(Debug, Default)]
pub struct FakeModel {
    pub behavior: Behavior,
    pub proba: Option<Array2<f64>>,
    pub attributes: BTreeMap<String, Value>,
    pub calls: Mutex<Vec<(FeatureBatch, Params)>>,
}

impl FakeModel {
    pub fn returning(values: Vec<Value>) -> Self {
        Self::with_behavior(Behavior::Fixed(Output::Values(values)))
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        FakeModel {
            behavior,
            ..Default::default()
        }
    }

    pub fn with_proba(mut self, proba: Array2<f64>) -> Self {
        self.proba = Some(proba);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn calls(&self) -> Vec<(FeatureBatch, Params)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, features: &FeatureBatch, params: &Params) {
        self.calls.lock().unwrap().push((features.clone(), params.clone()));
    }
}

impl Model for FakeModel {
    fn predict(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Output> {
        self.record(features, params);
        match &self.behavior {
            Behavior::Fixed(output) => Ok(output.clone()),
            Behavior::PerRow(value) => Ok(Output::Values(vec![value.clone(); features.nrows()])),
            Behavior::Fail(err) => Err(err.clone().into()),
            Behavior::Broken(msg) => Err(anyhow::anyhow!("{}", msg)),
        }
    }

    fn predict_proba(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Array2<f64>> {
        self.record(features, params);
        self.proba
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model does not support predict_proba"))
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}
