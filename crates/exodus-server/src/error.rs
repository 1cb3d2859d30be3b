//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing or malformed bearer token")]
  MissingToken,
  #[error("unknown bearer token")]
  InvalidToken,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let mut res = (
      StatusCode::UNAUTHORIZED,
      Json(json!({ "error": self.to_string() })),
    )
      .into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Bearer realm=\"exodus\""),
    );
    res
  }
}
