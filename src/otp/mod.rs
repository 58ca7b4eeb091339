pub mod issuer;
pub mod verifier;

pub use issuer::OtpIssuer;
pub use verifier::{OtpVerifier, VerifyOutcome};

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const OTP_LEN: usize = 6;

/// Generate a fixed-length numeric passcode from the thread-local CSPRNG.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Only the hash of the active code is ever stored.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a submitted code against the stored hash.
pub fn code_matches(submitted: &str, stored_hash: &str) -> bool {
    let submitted_hash = hash_code(submitted);
    submitted_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_six_ascii_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_is_deterministic_and_opaque() {
        let code = "123456";
        assert_eq!(hash_code(code), hash_code(code));
        assert_ne!(hash_code(code), code);
        assert_eq!(hash_code(code).len(), 64);
    }

    #[test]
    fn matches_only_the_right_code() {
        let stored = hash_code("123456");
        assert!(code_matches("123456", &stored));
        assert!(!code_matches("123457", &stored));
        assert!(!code_matches("", &stored));
    }
}
