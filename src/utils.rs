use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;

use crate::errors::{DomainError, DomainResult};

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Generate a locally unique record id: `local_<unix-millis>_<9 base36 chars>`.
pub fn generate_local_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_ALPHABET[rng.random_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("local_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Fixed-width UTC timestamp, so stored values sort lexicographically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(field: &str, raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Internal(format!("Bad timestamp in {}: {} ({})", field, raw, e)))
}
