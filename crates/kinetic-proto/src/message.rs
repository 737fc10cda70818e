//! Authentication envelope wrapping the inner command bytes.
//!
//! The envelope is what actually travels in the PDU's command segment. It
//! carries the serialized inner [`Command`](crate::Command) opaquely plus one
//! of two authentication schemes: the session's HMAC identity, or a bare PIN
//! for pin-authenticated drive operations (erase, lock, unlock).

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    hmac_auth,
};

/// Authentication attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Auth {
    /// Identity plus HMAC-SHA1 tag over the length-prefixed command bytes.
    Hmac {
        /// Identity the shared secret belongs to.
        identity: i64,
        /// `HMAC-SHA1(key, u32be(len) || command_bytes)`.
        tag: Vec<u8>,
    },
    /// Bare PIN; used instead of HMAC for pin operations.
    Pin {
        /// Drive PIN (lock or erase PIN depending on the operation).
        pin: Vec<u8>,
    },
}

/// The outer message: auth envelope plus opaque command bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// How this message is authenticated.
    pub auth: Auth,

    /// Serialized inner command, exactly as MACed.
    pub command_bytes: Vec<u8>,
}

impl Message {
    /// Wrap command bytes with an HMAC signature under the session secret.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidHmacKey`] if the MAC implementation rejects
    ///   the key
    pub fn hmac_signed(identity: i64, key: &[u8], command_bytes: Vec<u8>) -> Result<Self> {
        let tag = hmac_auth::compute(key, &command_bytes)?;
        Ok(Self { auth: Auth::Hmac { identity, tag: tag.to_vec() }, command_bytes })
    }

    /// Wrap command bytes with a bare PIN (no HMAC).
    #[must_use]
    pub fn pin_authenticated(pin: Vec<u8>, command_bytes: Vec<u8>) -> Self {
        Self { auth: Auth::Pin { pin }, command_bytes }
    }

    /// Verify the HMAC tag against `key` in constant time.
    ///
    /// Pin-authenticated messages carry no tag and always fail this check;
    /// the receive path only calls it on drive responses, which are HMACed.
    #[must_use]
    pub fn hmac_valid(&self, key: &[u8]) -> bool {
        match &self.auth {
            Auth::Hmac { tag, .. } => hmac_auth::validate(key, &self.command_bytes, tag),
            Auth::Pin { .. } => false,
        }
    }

    /// Identity claimed by the sender, if HMAC-authenticated.
    #[must_use]
    pub fn identity(&self) -> Option<i64> {
        match &self.auth {
            Auth::Hmac { identity, .. } => Some(*identity),
            Auth::Pin { .. } => None,
        }
    }

    /// Serialize the envelope to CBOR bytes (the PDU command segment).
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CborEncode`] if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize an envelope from CBOR bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CborDecode`] if the bytes are not a valid envelope
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}
