//! HMAC-SHA1 authentication over command bytes.
//!
//! Every authenticated message carries `HMAC-SHA1(key, u32be(len) || bytes)`
//! where `bytes` is the serialized inner command. The 4-byte big-endian length
//! prefix removes extension ambiguity: two different splits of the same
//! concatenated stream can never produce the same MAC input.
//!
//! Verification goes through [`hmac::Mac::verify_slice`], which compares in
//! constant time.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::{ProtocolError, Result};

/// Length of an HMAC-SHA1 tag in bytes.
pub const TAG_LENGTH: usize = 20;

type HmacSha1 = Hmac<Sha1>;

fn keyed(key: &[u8], command_bytes: &[u8]) -> Result<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| ProtocolError::InvalidHmacKey(e.to_string()))?;
    mac.update(&(command_bytes.len() as u32).to_be_bytes());
    mac.update(command_bytes);
    Ok(mac)
}

/// Compute the authentication tag for `command_bytes` under `key`.
///
/// # Errors
///
/// - [`ProtocolError::InvalidHmacKey`] if the MAC implementation rejects the
///   key (HMAC accepts arbitrary key lengths, so this does not occur in
///   practice)
pub fn compute(key: &[u8], command_bytes: &[u8]) -> Result<[u8; TAG_LENGTH]> {
    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&keyed(key, command_bytes)?.finalize().into_bytes());
    Ok(tag)
}

/// Recompute and compare a received tag in constant time.
///
/// Returns `false` for a wrong tag, a wrong length, or a rejected key; the
/// caller maps this to its HMAC-failure status.
#[must_use]
pub fn validate(key: &[u8], command_bytes: &[u8], tag: &[u8]) -> bool {
    match keyed(key, command_bytes) {
        Ok(mac) => mac.verify_slice(tag).is_ok(),
        Err(_) => false,
    }
}
