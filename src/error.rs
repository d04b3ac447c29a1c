use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("{0}")]
  Validation(String),

  #[error("user already has a referral")]
  DuplicateReferral,

  #[error("unknown or inactive affiliate code")]
  InvalidCode,

  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("receipt verification failed: {0}")]
  ExternalValidation(String),

  #[error("invalid webhook signature")]
  InvalidSignature,

  #[error(transparent)]
  Db(#[from] sea_orm::DbErr),

  #[error("billing provider unreachable: {0}")]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Validation(_) | Error::InvalidCode => StatusCode::BAD_REQUEST,
      Error::DuplicateReferral => StatusCode::CONFLICT,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::ExternalValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Error::InvalidSignature => StatusCode::UNAUTHORIZED,
      Error::Db(_) | Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }

    let body = json::json!({ "success": false, "error": self.to_string() });
    (status, Json(body)).into_response()
  }
}
