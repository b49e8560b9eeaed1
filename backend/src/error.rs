use thiserror::Error;

/// Failure raised on purpose by a model to tell the caller why no prediction
/// could be made. Message and code reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PredictError {
    pub message: String,
    pub code: i64,
}

impl PredictError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(message, -1)
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        PredictError {
            message: message.into(),
            code,
        }
    }
}

/// Invalid feature or parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or incomplete caller input.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("{0:#}")]
    Model(anyhow::Error),

    #[error("{0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BadRequest",
            ServiceError::Predict(_) => "PredictError",
            ServiceError::Model(_) => "ModelError",
            ServiceError::Shape(_) => "ShapeError",
            ServiceError::Internal(_) => "InternalError",
            ServiceError::Io(_) => "IoError",
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ServiceError::Predict(e) => e.code,
            _ => -1,
        }
    }

    /// HTTP status the failure maps to.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            _ => 500,
        }
    }

    /// Text placed in `error_message`.
    pub fn report(&self) -> String {
        match self {
            ServiceError::BadRequest(msg) => format!("BadRequest: ({msg})"),
            ServiceError::Predict(e) => e.message.clone(),
            other => format!("{}: {}", other.kind(), other),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PredictError>() {
            Ok(e) => ServiceError::Predict(e),
            Err(err) => ServiceError::Model(err),
        }
    }
}
