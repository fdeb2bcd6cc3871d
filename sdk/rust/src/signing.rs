//! HMAC-SHA256 payload signing
//!
//! The sender signs the raw (uncompressed) JSON body with a shared key and
//! attaches the lowercase hex digest in the [`HASH_HEADER`] header. The
//! receiver recomputes the digest and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded body signature
pub const HASH_HEADER: &str = "HashSHA256";

/// Sign `body` with `key`, returning the lowercase hex digest
pub fn sign(key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a received signature against the expected digest of `body`
pub fn verify(key: &str, body: &[u8], received: &str) -> bool {
    let expected = sign(key, body);
    let received = received.trim().to_ascii_lowercase();
    if expected.len() != received.len() {
        return false;
    }
    expected.as_bytes().ct_eq(received.as_bytes()).into()
}
