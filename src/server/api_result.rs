use crate::lookup::LookupError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// JSON error body: `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorReport {
    pub error: String,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

impl From<&LookupError> for ErrorReport {
    fn from(error: &LookupError) -> Self {
        Self::new(error.client_message())
    }
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorReport::from(&self))).into_response()
    }
}

#[derive(Debug, Clone)]
pub enum HttpError {
    Timeout { error: ErrorReport },
    Internal { error: ErrorReport },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            Self::Timeout { error } => (StatusCode::REQUEST_TIMEOUT, Json(error)).into_response(),
            Self::Internal { error } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
        }
    }
}
