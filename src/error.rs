use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown time slot: {0}")]
    InvalidSlot(String),

    #[error("Please sign in first")]
    AuthenticationRequired,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("Database Error. {0}")]
    Store(String),
}

impl From<ValidationErrors> for BookingError {
    fn from(errors: ValidationErrors) -> Self {
        BookingError::Validation(errors.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match self {
            BookingError::Validation(_) | BookingError::InvalidSlot(_) => StatusCode::BAD_REQUEST,
            BookingError::AuthenticationRequired | BookingError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
