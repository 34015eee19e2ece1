//! HMAC-SHA256 authenticity checks for payment captures and webhooks.
//!
//! Two distinct secrets are in play: the gateway key secret signs
//! `"<order_id>|<payment_id>"` on the client checkout callback, and the
//! webhook secret signs the raw webhook body. Signatures travel as lowercase
//! hex and are compared in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

pub(crate) fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn verify(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = keyed(secret);
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

fn payment_message(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Signature the gateway hands the client after a successful checkout
pub fn sign_payment(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    sign(key_secret, payment_message(order_id, payment_id).as_bytes())
}

pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> bool {
    verify(
        key_secret,
        payment_message(order_id, payment_id).as_bytes(),
        signature_hex,
    )
}

/// Signature over a raw webhook body
pub fn sign_webhook(webhook_secret: &str, body: &[u8]) -> String {
    sign(webhook_secret, body)
}

/// Verify a webhook body exactly as received; re-serialized JSON will not match
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature_hex: &str) -> bool {
    verify(webhook_secret, body, signature_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_signature_accepts_own_output() {
        let sig = sign_payment("key_secret", "order_1", "pay_1");
        assert!(verify_payment_signature("key_secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_payment_signature_binds_both_ids() {
        let sig = sign_payment("key_secret", "order_1", "pay_1");
        assert!(!verify_payment_signature("key_secret", "order_2", "pay_1", &sig));
        assert!(!verify_payment_signature("key_secret", "order_1", "pay_2", &sig));
        assert!(!verify_payment_signature("other_secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(!verify_payment_signature("k", "o", "p", "not-hex"));
        assert!(!verify_payment_signature("k", "o", "p", ""));
        assert!(!verify_webhook_signature("k", b"{}", "abcd"));
    }

    #[test]
    fn test_webhook_signature_covers_raw_bytes() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign_webhook("whsec", body);
        assert!(verify_webhook_signature("whsec", body, &sig));
        assert!(verify_webhook_signature("whsec", body, &sig.to_uppercase()));

        let reformatted = br#"{ "event": "payment.captured" }"#;
        assert!(!verify_webhook_signature("whsec", reformatted, &sig));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign_webhook("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
