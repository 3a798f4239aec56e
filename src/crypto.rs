use crate::error::{Result, SteganographyError};
use base64::{engine::general_purpose, Engine as _};
use chacha20::{
    cipher::{KeyIvInit, StreamCipher},
    ChaCha20,
};
use rand::RngCore;
use std::{fs, path::Path};

/// ChaCha20 encryption key size in bytes
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// ChaCha20 nonce size in bytes
const NONCE_SIZE: usize = 12;

/// Cryptographic engine handling ChaCha20 encryption of opaque payload bytes.
///
/// This is the crate's only encryption collaborator; the embedding engines never
/// look inside the bytes they're given. The lossless PNG container means there's no
/// requantization noise to correct for, so unlike a JPEG-targeting pipeline this
/// engine carries no repetition coding.
pub struct CryptographicEngine;

impl CryptographicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Generates a cryptographically secure random ChaCha20 key
    pub fn generate_encryption_key() -> [u8; ENCRYPTION_KEY_SIZE] {
        let mut encryption_key = [0u8; ENCRYPTION_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut encryption_key);
        encryption_key
    }

    fn generate_nonce(&self) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        nonce
    }

    /// Encrypts `plaintext` with ChaCha20, prepending the random nonce used.
    pub fn encrypt(
        &self,
        encryption_key: &[u8; ENCRYPTION_KEY_SIZE],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let nonce = self.generate_nonce();
        let mut cipher = ChaCha20::new(encryption_key.into(), &nonce.into());

        let mut ciphertext = plaintext.to_vec();
        cipher.apply_keystream(&mut ciphertext);

        let mut framed = nonce.to_vec();
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt): strips the leading
    /// nonce, then runs the same keystream in reverse.
    pub fn decrypt(&self, encryption_key: &[u8; ENCRYPTION_KEY_SIZE], framed: &[u8]) -> Result<Vec<u8>> {
        if framed.len() < NONCE_SIZE {
            return Err(SteganographyError::CryptoError(
                "encrypted data too short to contain a nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = framed.split_at(NONCE_SIZE);
        let mut cipher = ChaCha20::new(encryption_key.into(), nonce.into());

        let mut plaintext = ciphertext.to_vec();
        cipher.apply_keystream(&mut plaintext);
        Ok(plaintext)
    }

    /// Saves encryption key to file in base64 format
    pub fn save_key_to_file(&self, encryption_key: &[u8; ENCRYPTION_KEY_SIZE], file_path: &str) -> Result<()> {
        let base64_encoded_key = general_purpose::STANDARD.encode(encryption_key);
        fs::write(file_path, base64_encoded_key)?;
        Ok(())
    }

    /// Loads encryption key from file or parses from base64 string
    pub fn load_key_from_input(&self, key_input: &str) -> Result<[u8; ENCRYPTION_KEY_SIZE]> {
        let key_data = if Path::new(key_input).exists() {
            fs::read_to_string(key_input)?
        } else {
            key_input.to_string()
        };

        let key_bytes = general_purpose::STANDARD
            .decode(key_data.trim())
            .map_err(|error| SteganographyError::Base64Error(error.to_string()))?;

        if key_bytes.len() != ENCRYPTION_KEY_SIZE {
            return Err(SteganographyError::InvalidInput(format!(
                "invalid key length: expected {} bytes, got {}",
                ENCRYPTION_KEY_SIZE,
                key_bytes.len()
            )));
        }

        let mut encryption_key = [0u8; ENCRYPTION_KEY_SIZE];
        encryption_key.copy_from_slice(&key_bytes);
        Ok(encryption_key)
    }
}

impl Default for CryptographicEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_decryption_roundtrip() {
        let crypto_engine = CryptographicEngine::new();
        let encryption_key = CryptographicEngine::generate_encryption_key();
        let test_data = b"Secret message for testing";

        let encrypted_data = crypto_engine.encrypt(&encryption_key, test_data).unwrap();
        let decrypted_data = crypto_engine.decrypt(&encryption_key, &encrypted_data).unwrap();

        assert_eq!(test_data.to_vec(), decrypted_data);
    }

    #[test]
    fn wrong_key_does_not_reproduce_plaintext() {
        let crypto_engine = CryptographicEngine::new();
        let encryption_key = CryptographicEngine::generate_encryption_key();
        let wrong_key = CryptographicEngine::generate_encryption_key();
        let test_data = b"Secret message for testing";

        let encrypted_data = crypto_engine.encrypt(&encryption_key, test_data).unwrap();
        let decrypted_data = crypto_engine.decrypt(&wrong_key, &encrypted_data).unwrap();

        assert_ne!(test_data.to_vec(), decrypted_data);
    }

    #[test]
    fn key_roundtrips_through_base64_file() {
        let crypto_engine = CryptographicEngine::new();
        let key = CryptographicEngine::generate_encryption_key();
        let path = std::env::temp_dir().join("imgstego_crypto_key_roundtrip_test.key");

        crypto_engine
            .save_key_to_file(&key, path.to_str().unwrap())
            .unwrap();
        let recovered = crypto_engine.load_key_from_input(path.to_str().unwrap()).unwrap();

        assert_eq!(key, recovered);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let crypto_engine = CryptographicEngine::new();
        let key = CryptographicEngine::generate_encryption_key();
        assert!(crypto_engine.decrypt(&key, &[0u8; 4]).is_err());
    }
}
