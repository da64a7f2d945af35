//! One-time exchange code generation and verification.
//!
//! Codes are 6 decimal digits, generated from the thread-local CSPRNG. Only a salted Blake2b
//! digest of the code is ever persisted; verification re-derives the digest from the candidate
//! code and compares it to the stored one in constant time.
use blake2::{Blake2b512, Digest};
use cm_common::Secret;
use constant_time_eq::constant_time_eq;
use rand::{thread_rng, Rng};

pub const OTP_LENGTH: usize = 6;

/// Generates a fresh 6-digit exchange code. Leading zeroes are preserved.
pub fn generate_code() -> Secret<String> {
    let code: u32 = thread_rng().gen_range(0..1_000_000);
    Secret::new(format!("{code:06}"))
}

/// A random 16-byte salt, hex-encoded. One salt per token.
pub fn new_salt() -> String {
    let salt: [u8; 16] = thread_rng().gen();
    hex::encode(salt)
}

/// The salted digest that gets stored in place of the plaintext code.
pub fn hash_code(salt: &str, code: &str) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a candidate code against the stored digest without leaking timing information about
/// how many bytes matched.
pub fn verify_code(salt: &str, stored_hash: &str, candidate: &str) -> bool {
    let candidate_hash = hash_code(salt, candidate);
    constant_time_eq(candidate_hash.as_bytes(), stored_hash.as_bytes())
}
