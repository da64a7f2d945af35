pub mod otp;

pub use otp::{generate_code, hash_code, new_salt, verify_code};
