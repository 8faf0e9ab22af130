//! Deterministic record ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable id of a stats row. Rows sharing civilization, bracket and time
/// bucket share an id, so a repeated daily insert shows up as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// First 16 hex chars of SHA-256 over the `|`-joined identity fields.
    pub(crate) fn from_identity(fields: &[&str]) -> Self {
        let digest = Sha256::digest(fields.join("|").as_bytes());
        Self(hex::encode(&digest[..8]))
    }
}
