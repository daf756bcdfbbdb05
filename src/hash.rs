use sha2::{Digest, Sha256};

use crate::types::ElementKind;

/// Separator for every hashed list: tag fragments and identity keys alike.
pub const HASH_DELIMITER: &str = "|";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of `parts` joined by [`HASH_DELIMITER`], in the order given.
pub fn joined_sha256<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(HASH_DELIMITER);
    sha256_hex(joined.as_bytes())
}

/// The identity fingerprint over already-ordered `(kind, id)` pairs.
pub fn id_list_hash<I>(identities: I) -> String
where
    I: IntoIterator<Item = (ElementKind, i64)>,
{
    let keys: Vec<String> = identities
        .into_iter()
        .map(|(kind, id)| format!("{kind}:{id}"))
        .collect();
    joined_sha256(&keys)
}
