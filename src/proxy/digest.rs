//! Nonce generation and the `md5(nonce:password)` proof of password.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use rand::RngExt;
use subtle::ConstantTimeEq;

/// Random bytes behind each nonce; encodes to 44 base64 characters.
const NONCE_BYTES: usize = 33;

/// Fresh per-connection nonce. Base64 never contains `(` or `)`, so it is safe
/// inside the greeting's parenthesized suffix.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; NONCE_BYTES] = std::array::from_fn(|_| rng.random());
    STANDARD.encode(bytes)
}

/// Lowercase hex MD5 of `<nonce>:<password>`.
pub fn digest(nonce: &str, password: &str) -> String {
    let hash = Md5::digest(format!("{}:{}", nonce, password).as_bytes());
    format!("{:x}", hash)
}

/// Compare a client-supplied digest against the expected one in constant time.
pub fn verify(nonce: &str, password: &str, candidate: &str) -> bool {
    let expected = digest(nonce, password);
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
