use sha1::{Digest, Sha1};

/// Computes SHA-1 of `data` and returns the lowercase hex digest.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
