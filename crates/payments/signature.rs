use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

fn keyed(secret: &str, payload: &[u8]) -> Option<HmacSha512> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(mac)
}

/// Hex HMAC-SHA-512 of the raw payload, as sent in the webhook signature header.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Option<String> {
    keyed(secret, payload).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against the raw payload bytes.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    keyed(secret, payload).is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}
