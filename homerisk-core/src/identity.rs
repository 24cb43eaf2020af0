use homerisk_model::JobId;
use sha2::{Digest, Sha256};

/// Derive the deterministic job identity for an address.
///
/// Contract: the id is a pure function of the normalized address text.
/// Normalization lowercases and strips every non-alphanumeric character;
/// the id is the first 32 hex characters of the SHA-256 digest of that
/// text. Two submissions with the same normalized text always map
/// to the same job. Geo coordinates deliberately do not participate:
/// rounding them would merge near-duplicate submissions but can conflate
/// distinct adjacent properties, which is the worse failure mode for a risk
/// report tied to one location.
pub fn compute_identity(address: &str) -> JobId {
    let normalized: String = address
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let digest = Sha256::digest(normalized.as_bytes());
    let hex = hex::encode(digest);
    // 64 lowercase hex chars truncated to 32 always satisfies the JobId shape.
    JobId::parse(&hex[..JobId::LEN]).expect("sha256 hex prefix is a valid job id")
}
