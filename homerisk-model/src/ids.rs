use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Deterministic job identifier.
///
/// A `JobId` is the first 32 hex characters of the SHA-256 digest of the
/// normalized address text, so the same identity always maps to the same id.
/// The derivation lives in `homerisk-core`; this type only guards the shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub const LEN: usize = 32;

    /// Wrap an already-derived id, validating its shape.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        if raw.len() != Self::LEN
            || !raw.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(ModelError::InvalidJobId(raw));
        }
        Ok(JobId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_hex_of_expected_length() {
        let id = JobId::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(id.as_str().len(), JobId::LEN);
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!(JobId::parse("abc").is_err());
        assert!(JobId::parse("0123456789ABCDEF0123456789ABCDEF").is_err());
        assert!(JobId::parse("zzzz56789abcdef0123456789abcdef0").is_err());
    }
}
