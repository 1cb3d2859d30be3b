//! Identities: actors on a domain, addressed as `name@domain`.

use chrono::{DateTime, Utc};

use crate::{Error, Result, json::IdentityDocument};

/// A persisted identity. The fully-qualified name is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub id:         i64,
  pub name:       String,
  pub domain:     String,
  pub created_at: DateTime<Utc>,
}

impl Identity {
  /// The fully-qualified name, `name@domain`.
  pub fn fqn(&self) -> String { format!("{}@{}", self.name, self.domain) }

  pub fn document(&self) -> IdentityDocument {
    IdentityDocument {
      id:     self.id,
      name:   self.name.clone(),
      domain: self.domain.clone(),
      fqn:    self.fqn(),
    }
  }
}

/// Input to [`crate::store::ResourceStore::create_identity`].
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub name:   String,
  pub domain: String,
}

impl NewIdentity {
  pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
    Self { name: name.into(), domain: domain.into() }
  }

  /// Both parts must be non-empty and free of `@` and whitespace, otherwise
  /// the fqn would not split back into the same pair.
  pub fn validate(&self) -> Result<()> {
    validate_part("name", &self.name)?;
    validate_part("domain", &self.domain)
  }
}

fn validate_part(field: &str, value: &str) -> Result<()> {
  if value.is_empty() {
    return Err(Error::Validation(format!("identity {field} is empty")));
  }
  if value.contains('@') || value.chars().any(char::is_whitespace) {
    return Err(Error::Validation(format!(
      "identity {field} {value:?} contains '@' or whitespace"
    )));
  }
  Ok(())
}

/// Split an fqn on its last `@` into `(name, domain)`.
pub fn parse_fqn(fqn: &str) -> Result<(&str, &str)> {
  fqn
    .rsplit_once('@')
    .ok_or_else(|| Error::Validation(format!("{fqn:?} is not of the form name@domain")))
}
