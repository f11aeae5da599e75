//! Time-based one-time passwords (RFC 6238, HMAC-SHA1, 30s step, 6 digits).

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::BrokerError;

type HmacSha1 = Hmac<Sha1>;

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;

/// Decode a base32 shared secret as shown by authenticator setup screens.
///
/// Spaces, padding and lower case are accepted.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, BrokerError> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    BASE32_NOPAD
        .decode(cleaned.as_bytes())
        .map_err(|e| BrokerError::Auth(format!("invalid TOTP secret: {e}")))
}

/// One-time code for `unix_time`.
pub fn totp(secret: &str, unix_time: u64) -> Result<String, BrokerError> {
    let key = decode_secret(secret)?;
    let counter = unix_time / STEP_SECS;

    let mut mac = HmacSha1::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(DIGITS);
    Ok(format!("{code:0width$}", width = DIGITS as usize))
}
