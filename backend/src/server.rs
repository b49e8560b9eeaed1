use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::{Method, StatusCode};
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

use crate::alive::{self, ProcessStore};
use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::inference::ModelPersister;
use crate::models::{Metadata, PredictRequest, Record, ServiceMetadata};
use crate::service::{PredictService, Response};

/// Shared, read-mostly context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictService>,
    pub persister: Arc<dyn ModelPersister>,
    pub process_store: Arc<ProcessStore>,
    pub service_metadata: ServiceMetadata,
    pub alive_required: Vec<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").to(predict))
        .route("/alive", web::get().to(alive));
}

async fn predict(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let model = match state.persister.read() {
        Ok(model) => model,
        Err(e) => {
            let err = ServiceError::from(e);
            error!("Could not read model: {}", err);
            return json_response(500, &Metadata::error(&err));
        }
    };

    let request = match extract_request(&req, &body) {
        Ok(request) => request,
        Err(err) => return envelope_response(state.service.respond(Err(err))),
    };

    let service = state.service.clone();
    match web::block(move || service.handle(model.as_ref(), &request)).await {
        Ok(response) => envelope_response(response),
        Err(e) => {
            let err = ServiceError::internal(format!("prediction task failed: {e}"));
            envelope_response(state.service.respond(Err(err)))
        }
    }
}

async fn alive(state: web::Data<AppState>) -> HttpResponse {
    let (body, status) = alive::report(
        &state.process_store,
        &state.alive_required,
        &state.service_metadata,
    );
    json_response(status, &body)
}

/// GET: query args are the record and its parameters. POST: the JSON body
/// is a list of records, parameters still come from the query args.
fn extract_request(req: &HttpRequest, body: &[u8]) -> Result<PredictRequest, ServiceError> {
    let args = query_args(req)?;
    let method = req.method();
    if method == Method::GET {
        return Ok(PredictRequest::single(args));
    }
    if method != Method::POST {
        return Err(ServiceError::bad_request(format!("unsupported method {method}")));
    }

    let records = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(ServiceError::bad_request(format!(
                    "expected a JSON object per record, got {other}"
                ))),
            })
            .collect::<Result<Vec<Record>, _>>()?,
        Ok(_) => return Err(ServiceError::bad_request("expected a JSON list of records")),
        Err(e) => return Err(ServiceError::bad_request(format!("invalid JSON body: {e}"))),
    };
    Ok(PredictRequest::batch(records, args))
}

fn query_args(req: &HttpRequest) -> Result<Record, ServiceError> {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map_err(|e| ServiceError::bad_request(e.to_string()))?;
    Ok(query
        .into_inner()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect())
}

fn envelope_response(response: Response) -> HttpResponse {
    json_response(response.status, &response.envelope)
}

fn json_response<T: Serialize>(status: u16, body: &T) -> HttpResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(body)
}

pub async fn run(state: AppState, server: &ServerConfig) -> std::io::Result<()> {
    let bind_address = server.bind_address();
    info!("Serving predictions on http://{}", bind_address);
    info!("Workers: {}", server.workers);
    info!("   GET  /predict?<feature>=<value>...");
    info!("   POST /predict   (JSON list of records)");
    info!("   GET  /alive");

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .app_data(data.clone())
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
            .configure(configure)
            .default_service(web::route().to(|| async {
                let err = ServiceError::bad_request("endpoint not found");
                HttpResponse::NotFound().json(Metadata::error(&err))
            }))
    })
    .workers(server.workers)
    .bind(&bind_address)?
    .run()
    .await
}
