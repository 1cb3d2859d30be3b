//! Bearer-token authorization.
//!
//! The server never stores tokens, only their SHA-256 digests (lowercase
//! hex). A request is authorized when the digest of its bearer token is one
//! of the configured digests.

use std::{collections::HashSet, sync::Arc};

use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Digests of the bearer tokens accepted by this server instance.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
  token_digests: HashSet<String>,
}

impl AuthConfig {
  pub fn new<I, T>(digests: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    Self {
      token_digests: digests
        .into_iter()
        .map(|d| d.as_ref().trim().to_ascii_lowercase())
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool { self.token_digests.is_empty() }

  fn accepts(&self, token: &str) -> bool { self.token_digests.contains(&digest_token(token)) }
}

/// SHA-256 of the token, hex-encoded.
pub fn digest_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Mint a new random token: 32 bytes from the OS RNG, hex-encoded.
pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Verify the `Authorization: Bearer <token>` header.
pub fn verify_bearer(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let token = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or(Error::MissingToken)?;

  if config.accepts(token) {
    Ok(())
  } else {
    Err(Error::InvalidToken)
  }
}

/// Middleware rejecting every request without a valid bearer token.
pub async fn require_bearer(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  if let Err(e) = verify_bearer(req.headers(), &config) {
    tracing::warn!(method = %req.method(), uri = %req.uri(), error = %e, "rejected request");
    return Err(e);
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, header};

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn digest_is_sha256_hex() {
    assert_eq!(
      digest_token("abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn generated_tokens_are_distinct_hex() {
    let a = generate_token();
    let b = generate_token();
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
  }

  #[test]
  fn accepts_configured_token() {
    let config = AuthConfig::new([digest_token("secret")]);
    assert!(verify_bearer(&headers("Bearer secret"), &config).is_ok());
  }

  #[test]
  fn digests_are_case_insensitive() {
    let config = AuthConfig::new([digest_token("secret").to_uppercase()]);
    assert!(verify_bearer(&headers("Bearer secret"), &config).is_ok());
  }

  #[test]
  fn rejects_unknown_token() {
    let config = AuthConfig::new([digest_token("secret")]);
    assert!(matches!(
      verify_bearer(&headers("Bearer wrong"), &config),
      Err(Error::InvalidToken)
    ));
  }

  #[test]
  fn rejects_missing_or_other_scheme() {
    let config = AuthConfig::new([digest_token("secret")]);
    assert!(matches!(
      verify_bearer(&HeaderMap::new(), &config),
      Err(Error::MissingToken)
    ));
    assert!(matches!(
      verify_bearer(&headers("Basic dXNlcjpzZWNyZXQ="), &config),
      Err(Error::MissingToken)
    ));
    assert!(matches!(
      verify_bearer(&headers("Bearer "), &config),
      Err(Error::MissingToken)
    ));
  }

  #[test]
  fn empty_config_rejects_everything() {
    let config = AuthConfig::default();
    assert!(config.is_empty());
    assert!(verify_bearer(&headers("Bearer secret"), &config).is_err());
  }
}
