//! TOTP two-factor enrollment and verification (RFC 6238).
//!
//! Secrets are SHA-1, 6 digits, 30 second steps with one step of skew in
//! either direction, which is what authenticator apps expect by default.

use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("Invalid two-factor secret: {0}")]
    InvalidSecret(String),

    #[error("Failed to initialise TOTP: {0}")]
    Setup(String),

    #[error("System clock error: {0}")]
    Clock(String),
}

/// Fresh secret plus the `otpauth://` URI to render as a QR code
#[derive(Debug, Clone, serde::Serialize)]
pub struct Enrollment {
    /// Base32 secret, also shown for manual entry
    pub secret: String,
    pub otpauth_url: String,
}

fn build(secret_base32: &str, issuer: &str, account: &str) -> Result<TOTP, TotpError> {
    let bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| TotpError::InvalidSecret(e.to_string()))?;

    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECONDS,
        bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| TotpError::Setup(e.to_string()))
}

/// Generates a new secret for `account` (the user's email)
pub fn generate_enrollment(issuer: &str, account: &str) -> Result<Enrollment, TotpError> {
    let secret = Secret::generate_secret().to_encoded().to_string();
    let totp = build(&secret, issuer, account)?;

    Ok(Enrollment {
        secret,
        otpauth_url: totp.get_url(),
    })
}

/// Checks `code` against the current time window
///
/// Codes that are not exactly six ASCII digits are rejected without
/// touching the secret.
pub fn verify_code(
    secret_base32: &str,
    code: &str,
    issuer: &str,
    account: &str,
) -> Result<bool, TotpError> {
    let code = code.trim();
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }

    build(secret_base32, issuer, account)?
        .check_current(code)
        .map_err(|e| TotpError::Clock(e.to_string()))
}
