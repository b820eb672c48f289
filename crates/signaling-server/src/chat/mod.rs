//! Chat message composition.
//!
//! - [`sanitize`] - markup stripping
//! - [`cipher`] - AES-256-GCM transcript payloads
//!
//! [`ChatChannel::compose`] turns a raw client message into an immutable
//! transcript entry. Storing and broadcasting the entry is the room actor's
//! job.

pub mod cipher;
pub mod sanitize;

pub use cipher::ChatCipher;
pub use sanitize::sanitize;

use crate::auth::SessionIdentity;
use crate::errors::SignalingError;
use crate::protocol::ChatMessage;
use uuid::Uuid;

/// Default `messageType` when the client omits it.
pub const DEFAULT_MESSAGE_TYPE: &str = "text";

/// Longest accepted `messageType`, in characters.
const MAX_MESSAGE_TYPE_LEN: usize = 32;

/// Validates, sanitizes and encrypts chat messages.
#[derive(Debug)]
pub struct ChatChannel {
    cipher: ChatCipher,
    max_message_length: usize,
}

impl ChatChannel {
    #[must_use]
    pub fn new(cipher: ChatCipher, max_message_length: usize) -> Self {
        Self {
            cipher,
            max_message_length,
        }
    }

    /// Build a transcript entry for `sender`.
    ///
    /// The stored/broadcast `message` is the sanitized text; the encrypted
    /// payload covers the original text.
    ///
    /// # Errors
    ///
    /// - `SignalingError::Malformed` for empty, over-long, or markup-only messages
    /// - `SignalingError::Internal` if encryption fails
    pub fn compose(
        &self,
        sender: &SessionIdentity,
        raw: &str,
        message_type: Option<&str>,
    ) -> Result<ChatMessage, SignalingError> {
        if raw.trim().is_empty() {
            return Err(SignalingError::Malformed("message is empty".to_string()));
        }
        if raw.chars().count() > self.max_message_length {
            return Err(SignalingError::Malformed(format!(
                "message exceeds {} characters",
                self.max_message_length
            )));
        }

        let message_type = match message_type.map(str::trim) {
            None | Some("") => DEFAULT_MESSAGE_TYPE.to_string(),
            Some(t) if t.chars().count() > MAX_MESSAGE_TYPE_LEN => {
                return Err(SignalingError::Malformed(
                    "messageType is too long".to_string(),
                ));
            }
            Some(t) => t.to_string(),
        };

        let message = sanitize(raw);
        if message.is_empty() {
            return Err(SignalingError::Malformed(
                "message is empty after sanitization".to_string(),
            ));
        }

        let encrypted_payload = self.cipher.encrypt(raw)?;

        Ok(ChatMessage {
            id: Uuid::now_v7().to_string(),
            user_id: sender.user_id.clone(),
            display_name: sender.display_name.clone(),
            role: sender.role.clone(),
            message,
            message_type,
            timestamp: chrono::Utc::now().to_rfc3339(),
            encrypted_payload,
        })
    }

    /// Recover the original text of a transcript entry.
    ///
    /// # Errors
    ///
    /// Returns `SignalingError::Malformed` if the payload does not open.
    pub fn decrypt(&self, entry: &ChatMessage) -> Result<String, SignalingError> {
        self.cipher.decrypt(&entry.encrypted_payload)
    }
}
