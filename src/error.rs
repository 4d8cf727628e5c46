use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The seat is already recorded for this artist. Callers pick another seat.
    #[error("seat {seat_id} is already sold for {artist_slug}")]
    SeatUnavailable { seat_id: String, artist_slug: String },

    /// No inventory left for the event.
    #[error("event {event_id} is sold out")]
    EventSoldOut { event_id: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SeatUnavailable { .. } => "seat_unavailable",
            EngineError::EventSoldOut { .. } => "event_sold_out",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(_) => "not_found",
            EngineError::Store(_) => "store_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::SeatUnavailable { .. } | EngineError::EventSoldOut { .. } => {
                StatusCode::CONFLICT
            }
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Store(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        EngineError::Store(e.to_string())
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(e: validator::ValidationErrors) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
