//! Sensitive field encryption with AES-256-GCM
//!
//! Used by the operation log pipeline for fields that must be stored
//! recoverably (as opposed to masked fields, which are replaced outright).
//!
//! Format: base64(nonce_12bytes || ciphertext || tag_16bytes)

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Master encryption key (32 bytes for AES-256-GCM)
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl MasterKey {
    /// Load master key from a base64-encoded 32-byte string
    pub fn from_base64(b64: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim())?;
        if bytes.len() != KEY_LEN {
            return Err(format!(
                "Master key wrong length: {} (expected {KEY_LEN})",
                bytes.len()
            )
            .into());
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Generate a random master key (development only)
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        Self { key }
    }

    /// Encrypt plaintext → base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, &'static str> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| "Encryption failed")?;

        // nonce || ciphertext (includes tag)
        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&result))
    }

    /// Decrypt base64(nonce || ciphertext || tag) → plaintext
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<Vec<u8>, &'static str> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|_| "Invalid base64")?;

        if data.len() < NONCE_LEN + 16 {
            return Err("Ciphertext too short");
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        let ciphertext = &data[NONCE_LEN..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| "Decryption failed (wrong key or tampered data)")
    }

    /// Encrypt a string → base64 blob
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, &'static str> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt base64 blob → string
    pub fn decrypt_string(&self, encrypted_b64: &str) -> Result<String, &'static str> {
        let bytes = self.decrypt(encrypted_b64)?;
        String::from_utf8(bytes).map_err(|_| "Decrypted data is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = MasterKey::generate();
        let blob = key.encrypt_string("13800138000").unwrap();
        assert_ne!(blob, "13800138000");
        assert_eq!(key.decrypt_string(&blob).unwrap(), "13800138000");
    }

    #[test]
    fn test_nonce_uniqueness() {
        let key = MasterKey::generate();
        let a = key.encrypt_string("same input").unwrap();
        let b = key.encrypt_string("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = MasterKey::generate();
        let key2 = MasterKey::generate();
        let blob = key1.encrypt_string("secret").unwrap();
        assert!(key2.decrypt(&blob).is_err());
    }

    #[test]
    fn test_from_base64_rejects_short_key() {
        use base64::Engine;
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(MasterKey::from_base64(&short).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        use base64::Engine;
        let key = MasterKey::generate();
        let blob = key.encrypt_string("secret").unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&blob)
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&raw);
        assert!(key.decrypt(&tampered).is_err());
    }
}
