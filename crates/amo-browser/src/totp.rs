//! Time-based one-time passwords for the 2FA challenge

use amo_core::{AmoError, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// Authenticator-compatible generator: SHA-1, 6 digits, 30 second step
fn generator(secret: &str) -> Result<TOTP> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| AmoError::Config(format!("2FA secret is not valid base32: {:?}", e)))?;

    // Marketplace secrets are 80 bits, below the 128 bits `TOTP::new` insists on
    Ok(TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes))
}

/// Code for the current time
pub fn current_code(secret: &str) -> Result<String> {
    generator(secret)?
        .generate_current()
        .map_err(|e| AmoError::Other(format!("System clock is before the Unix epoch: {}", e)))
}

/// Code for a Unix timestamp
pub fn code_at(secret: &str, unix_time: u64) -> Result<String> {
    Ok(generator(secret)?.generate(unix_time))
}
