// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure random secret generation
Used for the fallback token-signing secret when none is configured. */
use rand::RngCore;

/// Default secret size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_SECRET_BYTES: usize = 32;

/** Generate a random signing secret
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secret() -> String {
    generate_secret_with_size(DEFAULT_SECRET_BYTES)
}

/** Generate a random secret of `bytes` bytes of entropy
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secret_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
