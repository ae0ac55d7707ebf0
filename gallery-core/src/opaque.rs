//! Opaque external album ids.
//!
//! The catalog id is encrypted with AES-256-GCM under a random 96-bit nonce
//! and rendered as `hex(nonce || ciphertext)`. Encoding the same id twice
//! gives different strings; any tampering fails authentication on decode.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use gallery_model::AlbumId;
use thiserror::Error;

const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpaqueIdError {
    #[error("invalid key: expected {KEY_LEN} bytes, got {0}")]
    InvalidKey(usize),
    #[error("opaque id is not valid hex")]
    Encoding,
    #[error("opaque id is too short")]
    Truncated,
    #[error("opaque id failed authentication")]
    Authentication,
    #[error("opaque id does not contain an album id")]
    Payload,
    #[error("encryption failed")]
    Encryption,
}

/// Externally visible album id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpaqueAlbumId(String);

impl OpaqueAlbumId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueAlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<OpaqueAlbumId> for String {
    fn from(value: OpaqueAlbumId) -> Self {
        value.0
    }
}

#[derive(Clone)]
pub struct AlbumIdCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for AlbumIdCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumIdCipher").finish_non_exhaustive()
    }
}

impl AlbumIdCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self, OpaqueIdError> {
        let key: &[u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| OpaqueIdError::InvalidKey(key.len()))?;
        Ok(Self::new(key))
    }

    /// Key given as 64 hex characters.
    pub fn from_hex(key: &str) -> Result<Self, OpaqueIdError> {
        let bytes = hex::decode(key.trim()).map_err(|_| OpaqueIdError::Encoding)?;
        Self::from_slice(&bytes)
    }

    pub fn encode(&self, id: AlbumId) -> Result<OpaqueAlbumId, OpaqueIdError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, id.to_string().as_bytes())
            .map_err(|_| OpaqueIdError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(OpaqueAlbumId(hex::encode(out)))
    }

    pub fn decode(&self, opaque: &str) -> Result<AlbumId, OpaqueIdError> {
        let bytes = hex::decode(opaque).map_err(|_| OpaqueIdError::Encoding)?;
        if bytes.len() <= NONCE_LEN {
            return Err(OpaqueIdError::Truncated);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| OpaqueIdError::Authentication)?;

        std::str::from_utf8(&plaintext)
            .ok()
            .and_then(|s| s.parse::<AlbumId>().ok())
            .ok_or(OpaqueIdError::Payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn round_trip_with_fresh_nonces() {
        let cipher = AlbumIdCipher::from_hex(KEY).unwrap();
        let a = cipher.encode(AlbumId(42)).unwrap();
        let b = cipher.encode(AlbumId(42)).unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decode(a.as_str()).unwrap(), AlbumId(42));
        assert_eq!(cipher.decode(b.as_str()).unwrap(), AlbumId(42));
    }

    #[test]
    fn tampering_and_wrong_keys_are_rejected() {
        let cipher = AlbumIdCipher::from_hex(KEY).unwrap();
        let opaque = cipher.encode(AlbumId(7)).unwrap().to_string();

        let mut tampered = opaque.clone().into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert_eq!(
            cipher.decode(&tampered),
            Err(OpaqueIdError::Authentication)
        );

        let other = AlbumIdCipher::new(&[9u8; KEY_LEN]);
        assert_eq!(other.decode(&opaque), Err(OpaqueIdError::Authentication));

        assert_eq!(cipher.decode("zz"), Err(OpaqueIdError::Encoding));
        assert_eq!(cipher.decode("00ff"), Err(OpaqueIdError::Truncated));
    }

    #[test]
    fn key_length_is_checked() {
        assert_eq!(
            AlbumIdCipher::from_hex("0011").unwrap_err(),
            OpaqueIdError::InvalidKey(2)
        );
    }
}
