use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use ndarray::Array2;
use predict_serve::alive::ProcessStore;
use predict_serve::server::AppState;
use predict_serve::{
    ActiveModel, FeatureBatch, Model, Output, Params, PredictError, PredictService,
};
use serde_json::{Map, Value};

/// Scripted model recording every predict call.
#[derive(Default)]
pub struct ScriptedModel {
    pub output: Vec<Value>,
    pub proba: Option<Array2<f64>>,
    pub error: Option<PredictError>,
    pub attributes: Map<String, Value>,
    pub calls: Mutex<Vec<(FeatureBatch, Params)>>,
}

impl ScriptedModel {
    pub fn returning(output: Vec<Value>) -> Self {
        ScriptedModel {
            output,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(FeatureBatch, Params)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Model for ScriptedModel {
    fn predict(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Output> {
        self.calls.lock().unwrap().push((features.clone(), params.clone()));
        match &self.error {
            Some(err) => Err(err.clone().into()),
            None => Ok(Output::Values(self.output.clone())),
        }
    }

    fn predict_proba(&self, features: &FeatureBatch, params: &Params) -> anyhow::Result<Array2<f64>> {
        self.calls.lock().unwrap().push((features.clone(), params.clone()));
        self.proba.clone().ok_or_else(|| anyhow!("no probabilities"))
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

pub fn state(service: PredictService, model: Option<Arc<ScriptedModel>>) -> AppState {
    let process_store = Arc::new(ProcessStore::default());
    let persister = Arc::new(ActiveModel::new(process_store.clone()));
    if let Some(model) = model {
        persister.replace(model);
    }
    AppState {
        service: Arc::new(service),
        persister,
        process_store,
        service_metadata: Map::new(),
        alive_required: vec!["model".to_string()],
    }
}
