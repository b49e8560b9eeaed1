//! Line protocol over stdin/stdout/stderr.
//!
//! Every input line is a JSON array of records and yields exactly one output
//! line: the compact JSON result, or `[]` when the line failed. Failures are
//! described on the error stream. A line reading `EXIT` (or end of input)
//! stops the loop.

use std::io::{BufRead, Write};
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use crate::error::ServiceError;
use crate::inference::{Model, ModelPersister};
use crate::models::{PredictRequest, Record};
use crate::service::PredictService;

const EXIT: &str = "EXIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Running,
    Exiting,
}

pub struct PredictStream {
    service: Arc<PredictService>,
    persister: Arc<dyn ModelPersister>,
}

impl PredictStream {
    pub fn new(service: Arc<PredictService>, persister: Arc<dyn ModelPersister>) -> Self {
        PredictStream { service, persister }
    }

    pub fn listen<R, W, E>(&self, mut input: R, mut output: W, mut errors: E) -> anyhow::Result<()>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        let model = self.persister.read()?;
        let mut state = StreamState::Running;
        let mut buf = Vec::new();

        while state == StreamState::Running {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                state = StreamState::Exiting;
                continue;
            }

            let result = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim_end_matches(['\r', '\n']) == EXIT => {
                    state = StreamState::Exiting;
                    continue;
                }
                Ok(line) => self.process_line(model.as_ref(), line),
                Err(e) => Err(ServiceError::bad_request(format!(
                    "input line is not valid UTF-8: {e}"
                ))),
            };

            match result {
                Ok(result) => {
                    serde_json::to_writer(&mut output, &result)?;
                    output.write_all(b"\n")?;
                }
                Err(err) => {
                    debug!("Stream line failed: {}: {}", err.kind(), err);
                    output.write_all(b"[]\n")?;
                    writeln!(
                        errors,
                        "Error while processing input row: {}{}: {} ({})",
                        String::from_utf8_lossy(&buf),
                        err.kind(),
                        err,
                        err.code()
                    )?;
                    errors.flush()?;
                }
            }
            output.flush()?;
        }

        info!("Prediction stream exiting");
        Ok(())
    }

    /// Predict on one line. Parameters come from the line's first record.
    pub fn process_line(&self, model: &dyn Model, line: &str) -> Result<Value, ServiceError> {
        let records: Vec<Record> = serde_json::from_str(line)
            .map_err(|e| ServiceError::bad_request(format!("invalid input line: {e}")))?;
        let args = records.first().cloned().unwrap_or_default();
        self.service.run(model, &PredictRequest::batch(records, args))
    }
}
