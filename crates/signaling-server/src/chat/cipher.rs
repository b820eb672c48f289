//! Chat transcript encryption.
//!
//! Each message is sealed with AES-256-GCM under a key derived once from the
//! configured key material:
//!
//! ```text
//! chat_key = HKDF-SHA256(
//!     ikm: SIGNALING_CHAT_ENCRYPTION_KEY (decoded),
//!     salt: b"teleconsult-signaling",
//!     info: b"chat-transcript"
//! )
//! payload = base64(nonce[12] || ciphertext || tag[16])
//! ```
//!
//! The plaintext is broadcast alongside the payload, so this is
//! obfuscation at rest only.

use crate::errors::SignalingError;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::secret::{ExposeSecret, SecretBox};
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    hkdf,
    rand::{SecureRandom, SystemRandom},
};
use std::fmt;

const HKDF_SALT: &[u8] = b"teleconsult-signaling";
const HKDF_INFO: &[u8] = b"chat-transcript";

/// AES-256-GCM key for chat payloads.
pub struct ChatCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl ChatCipher {
    /// Derive the chat key from raw key material.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Internal` if the derived key cannot be built.
    pub fn new(key_material: &SecretBox<Vec<u8>>) -> Result<Self, SignalingError> {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT);
        let prk = salt.extract(key_material.expose_secret());
        let okm = prk
            .expand(&[HKDF_INFO], ChatKeyLen)
            .map_err(|_| SignalingError::Internal("chat key derivation failed".to_string()))?;

        let mut key_bytes = [0u8; 32];
        okm.fill(&mut key_bytes)
            .map_err(|_| SignalingError::Internal("chat key derivation failed".to_string()))?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| SignalingError::Internal("chat key creation failed".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Seal a message and return the base64 payload.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Internal` if nonce generation or sealing fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SignalingError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SignalingError::Internal("nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SignalingError::Internal("chat encryption failed".to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + in_out.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&in_out);
        Ok(STANDARD.encode(payload))
    }

    /// Open a payload produced by [`ChatCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Malformed` if the payload is not valid base64,
    /// is truncated, fails authentication, or is not UTF-8.
    pub fn decrypt(&self, payload: &str) -> Result<String, SignalingError> {
        let raw = STANDARD
            .decode(payload)
            .map_err(|_| SignalingError::Malformed("payload is not base64".to_string()))?;

        if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(SignalingError::Malformed("payload too short".to_string()));
        }
        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| SignalingError::Malformed("invalid nonce".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = sealed.to_vec();
        let opened = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SignalingError::Malformed("payload authentication failed".to_string()))?;

        String::from_utf8(opened.to_vec())
            .map_err(|_| SignalingError::Malformed("payload is not UTF-8".to_string()))
    }
}

impl fmt::Debug for ChatCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// HKDF output length for the AES-256 key.
struct ChatKeyLen;

impl hkdf::KeyType for ChatKeyLen {
    fn len(&self) -> usize {
        32
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn cipher(byte: u8) -> ChatCipher {
        ChatCipher::new(&SecretBox::new(Box::new(vec![byte; 32]))).unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let c = cipher(1);
        let payload = c.encrypt("<script>alert(1)</script>hello").unwrap();
        assert_eq!(c.decrypt(&payload).unwrap(), "<script>alert(1)</script>hello");
    }

    #[test]
    fn test_fresh_nonce_per_message() {
        let c = cipher(1);
        let a = c.encrypt("same text").unwrap();
        let b = c.encrypt("same text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_payload_layout() {
        let c = cipher(1);
        let payload = c.encrypt("abc").unwrap();
        let raw = STANDARD.decode(payload).unwrap();
        assert_eq!(raw.len(), NONCE_LEN + 3 + AES_256_GCM.tag_len());
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = cipher(1).encrypt("secret").unwrap();
        assert!(matches!(
            cipher(2).decrypt(&payload),
            Err(SignalingError::Malformed(_))
        ));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let c = cipher(1);
        let mut raw = STANDARD.decode(c.encrypt("secret").unwrap()).unwrap();
        if let Some(last) = raw.last_mut() {
            *last ^= 0xff;
        }
        assert!(c.decrypt(&STANDARD.encode(raw)).is_err());
    }

    #[test]
    fn test_garbage_payloads_fail() {
        let c = cipher(1);
        assert!(c.decrypt("not base64 !!").is_err());
        assert!(c.decrypt(&STANDARD.encode([0u8; 8])).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        assert!(format!("{:?}", cipher(1)).contains("[REDACTED]"));
    }
}
