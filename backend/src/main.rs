use std::io;
use std::sync::Arc;

use anyhow::Context;
use log::info;
use predict_serve::alive::ProcessStore;
use predict_serve::config::Config;
use predict_serve::server::{self, AppState};
use predict_serve::{ActiveModel, OnnxModel, PredictService, PredictStream};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let config = Config::load()?;
    let process_store = Arc::new(ProcessStore::default());
    let persister = Arc::new(ActiveModel::new(process_store.clone()));

    let service = PredictService::from_config(&config.predict_service, config.service_metadata.clone())
        .context("invalid predict_service mapping")?;
    let model = OnnxModel::load(&config.model.path, service.mapping().len(), config.model.threshold)
        .with_context(|| format!("loading model {}", config.model.path.display()))?;
    persister.replace(Arc::new(model));
    let service = Arc::new(service);

    match std::env::args().nth(1).as_deref() {
        Some("stream") => {
            info!("Listening for prediction lines on stdin");
            let stream = PredictStream::new(service, persister);
            stream.listen(io::stdin().lock(), io::stdout().lock(), io::stderr().lock())
        }
        Some("serve") | None => {
            let state = AppState {
                service,
                persister,
                process_store,
                service_metadata: config.service_metadata.clone(),
                alive_required: config.alive.process_store_required.clone(),
            };
            actix_web::rt::System::new().block_on(server::run(state, &config.server))?;
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown command '{other}', expected 'serve' or 'stream'"),
    }
}
