//! Razorpay checkout signature primitives.
//!
//! Razorpay signs a completed checkout as
//! `hex(HMAC_SHA256(key_secret, "<order_id>|<payment_id>"))`.
//! Verification must happen server-side with the key secret; a client can
//! otherwise replay arbitrary payment ids.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is not valid hex")]
    Malformed,

    #[error("Signature does not match")]
    Mismatch,
}

fn payment_mac(secret: &str, order_id: &str, payment_id: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac
}

/// Compute the checkout signature for an order/payment pair.
pub fn sign_payment(secret: &str, order_id: &str, payment_id: &str) -> String {
    hex::encode(payment_mac(secret, order_id, payment_id).finalize().into_bytes())
}

/// Verify a checkout signature in constant time.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let expected = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
    payment_mac(secret, order_id, payment_id)
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
