//! AES-CBC payload cipher
//!
//! Request and response bodies are encrypted with one key/IV pair for the whole
//! session, PKCS#7 padded. The key length picks the AES variant; the block size
//! is always 128 bits.

use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CryptoError;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

#[derive(Clone, PartialEq, Eq)]
enum KeyMaterial {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// Imported key and IV, ready for use on every request of a session
#[derive(Clone, PartialEq, Eq)]
pub struct Cipher {
    key: KeyMaterial,
    iv: [u8; BLOCK_SIZE],
}

impl Cipher {
    /// Import raw key and IV bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 16, 24 or 32 bytes or the IV is not 16 bytes.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let iv: [u8; BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| CryptoError::InvalidIvLength(iv.len()))?;

        let key = match key.len() {
            16 => KeyMaterial::Aes128(copy_array(key)),
            24 => KeyMaterial::Aes192(copy_array(key)),
            32 => KeyMaterial::Aes256(copy_array(key)),
            other => return Err(CryptoError::InvalidKeyLength(other)),
        };

        Ok(Self { key, iv })
    }

    /// Import hex-encoded key and IV, as they appear in configuration
    ///
    /// # Errors
    ///
    /// Returns an error if either string is not valid hex or has the wrong length.
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(key_hex.trim()).map_err(|e| CryptoError::InvalidHex {
            field: "key",
            reason: e.to_string(),
        })?;
        let iv = hex::decode(iv_hex.trim()).map_err(|e| CryptoError::InvalidHex {
            field: "iv",
            reason: e.to_string(),
        })?;
        Self::new(&key, &iv)
    }

    /// Key size in bits
    #[must_use]
    pub const fn key_bits(&self) -> usize {
        match self.key {
            KeyMaterial::Aes128(_) => 128,
            KeyMaterial::Aes192(_) => 192,
            KeyMaterial::Aes256(_) => 256,
        }
    }

    /// Encrypt an arbitrary-length buffer, padding it to the block size
    ///
    /// # Errors
    ///
    /// Only fails if the imported material is rejected by the primitive.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = match &self.key {
            KeyMaterial::Aes128(key) => cbc::Encryptor::<Aes128>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            KeyMaterial::Aes192(key) => cbc::Encryptor::<Aes192>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            KeyMaterial::Aes256(key) => cbc::Encryptor::<Aes256>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };
        Ok(ciphertext)
    }

    /// Decrypt a CBC ciphertext and strip its padding
    ///
    /// # Errors
    ///
    /// Returns an error for empty or misaligned input and for invalid padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
        }

        let plaintext = match &self.key {
            KeyMaterial::Aes128(key) => cbc::Decryptor::<Aes128>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            KeyMaterial::Aes192(key) => cbc::Decryptor::<Aes192>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            KeyMaterial::Aes256(key) => cbc::Decryptor::<Aes256>::new_from_slices(key, &self.iv)
                .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };
        plaintext.map_err(|_| CryptoError::BadPadding)
    }
}

// Key material stays out of logs and panic messages.
impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("algorithm", &format_args!("AES-{}-CBC", self.key_bits()))
            .finish_non_exhaustive()
    }
}

fn copy_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// One-shot encryption under a raw key/IV pair
///
/// # Errors
///
/// Returns an error if the key or IV is malformed.
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Cipher::new(key, iv)?.encrypt(plaintext)
}

/// One-shot decryption under a raw key/IV pair
///
/// # Errors
///
/// Returns an error if the key or IV is malformed or the ciphertext is rejected.
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Cipher::new(key, iv)?.decrypt(ciphertext)
}
