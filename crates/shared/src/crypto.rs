//! Cryptographic utilities for idempotency key hashing and OTP generation.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a 4-digit trip-start OTP.
///
/// The range excludes leading zeros so the code survives naive integer
/// round-trips in client apps.
pub fn generate_otp() -> String {
    let code: u16 = rand::thread_rng().gen_range(1000..=9999);
    code.to_string()
}
