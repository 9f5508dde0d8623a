use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Raw token entropy in bytes (256 bits).
const TOKEN_BYTES: usize = 32;

/// A freshly issued invitation token.
///
/// `raw` goes into the invitation email and is shown exactly once;
/// only `digest` is ever persisted.
pub struct IssuedToken {
    pub raw: String,
    pub digest: String,
}

pub fn issue_token() -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let raw = to_hex(&bytes);
    let digest = digest(&raw);
    IssuedToken { raw, digest }
}

/// SHA-256 of the raw token, hex encoded. This is the lookup key stored in
/// `user_invitations.token_digest`.
pub fn digest(raw: &str) -> String {
    to_hex(&Sha256::digest(raw.as_bytes()))
}

pub fn is_expired(expiry: OffsetDateTime, now: OffsetDateTime) -> bool {
    now >= expiry
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
