// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook authenticity check (`X-Twilio-Signature`).
//!
//! The gateway signs each callback with HMAC-SHA1 over the full callback
//! URL followed by every form parameter as `key` + `value`, sorted by key,
//! keyed with the account auth token, base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

type HmacSha1 = Hmac<Sha1>;

fn signed_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Some(mac)
}

/// Compute the expected signature for a callback.
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Option<String> {
    let mac = signed_mac(auth_token, url, params)?;
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a received signature.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    let Ok(received) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    signed_mac(auth_token, url, params)
        .is_some_and(|mac| mac.verify_slice(&received).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params() -> Vec<(String, String)> {
        vec![
            ("CallSid".into(), "CA1234567890ABCDE".into()),
            ("Caller".into(), "+12349013030".into()),
            ("Digits".into(), "1234".into()),
            ("From".into(), "+12349013030".into()),
            ("To".into(), "+18005551212".into()),
        ]
    }

    const URL: &str = "https://example.com/myapp.php?foo=1&bar=2";

    #[test]
    fn signature_is_base64_sha1_digest() {
        let sig = compute_signature("12345", URL, &params()).unwrap();
        let raw = STANDARD.decode(&sig).unwrap();
        assert_eq!(raw.len(), 20);
        assert!(verify_signature("12345", URL, &params(), &sig));
        assert!(verify_signature("12345", URL, &params(), &format!(" {sig} ")));
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let mut reversed = params();
        reversed.reverse();
        assert_eq!(
            compute_signature("12345", URL, &params()),
            compute_signature("12345", URL, &reversed)
        );
        assert!(compute_signature("12345", URL, &params()).is_some());
    }

    #[test]
    fn tampering_is_detected() {
        let sig = compute_signature("12345", URL, &params()).unwrap();
        let mut tampered = params();
        tampered[0].1 = "CAother".into();
        assert!(!verify_signature("12345", URL, &tampered, &sig));
        assert!(!verify_signature("wrong-token", URL, &params(), &sig));
        assert!(!verify_signature("12345", "https://example.com/other", &params(), &sig));
        assert!(!verify_signature("12345", URL, &params(), "not base64!"));
    }

    proptest! {
        #[test]
        fn computed_signatures_always_verify(
            token in "[a-f0-9]{32}",
            values in proptest::collection::vec(("[A-Za-z]{1,12}", "[ -~]{0,24}"), 0..8),
        ) {
            let params: Vec<(String, String)> = values;
            let url = "https://careline.example/v1/telephony/status";
            let sig = compute_signature(&token, url, &params).unwrap();
            prop_assert!(verify_signature(&token, url, &params, &sig));
        }
    }
}
