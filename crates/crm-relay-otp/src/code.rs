//! One-time code and nonce generation.

use rand::Rng;

/// Number of digits in a verification code.
pub const CODE_LEN: usize = 6;

/// Generate a uniformly random 6-digit verification code.
///
/// Returns a string of exactly 6 digits (000000-999999).
pub fn generate_verification_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(0..1_000_000);
    format!("{:06}", code)
}

/// Random per-challenge nonce, 8 bytes hex-encoded.
pub fn generate_nonce() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// True when `code` is exactly [`CODE_LEN`] ASCII digits.
pub fn is_verification_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
