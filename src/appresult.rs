use axum::{http::StatusCode, response::{IntoResponse, Response}};
use tracing::error;

use crate::rooms::RoomError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0.downcast_ref::<RoomError>() {
            Some(RoomError::NotFound(_)) => (StatusCode::NOT_FOUND, self.0.to_string()).into_response(),
            Some(RoomError::Closed(_)) => (StatusCode::GONE, self.0.to_string()).into_response(),
            _ => {
                error!(error = ?self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}\n\n{}", self.0, self.0.backtrace()),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
