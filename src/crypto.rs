use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check a hex-encoded HMAC-SHA256 `signature` of `body`.
///
/// The comparison runs in constant time.
pub fn is_valid_signature(signature: &str, body: &[u8], secret: &str) -> bool {
    let decoded = match hex::decode(signature.trim()) {
        Ok(d) => d,
        Err(_) => return false,
    };

    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut hmac) => {
            hmac.update(body);
            hmac.verify_slice(&decoded).is_ok()
        }
        Err(_) => false,
    }
}

/// Compute the hex-encoded HMAC-SHA256 of `body`.
#[cfg(test)]
pub(crate) fn sign(body: &[u8], secret: &str) -> String {
    let mut hmac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    hmac.update(body);
    hex::encode(hmac.finalize().into_bytes())
}
