//! At-rest sealing of secret config fields.
//!
//! AES-256-CBC with PKCS#7 padding; the key is the SHA-256 digest of an
//! operator-supplied passphrase. Sealed values carry a `sealed:` prefix
//! followed by base64(iv || ciphertext) so unsealed legacy configs keep
//! loading unchanged.

use crate::error::{SessionError, SessionResult};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Marker prefix distinguishing sealed values from plaintext ones.
pub const SEALED_PREFIX: &str = "sealed:";

/// Check whether a stored value is sealed.
pub fn is_sealed(value: &str) -> bool {
    value.starts_with(SEALED_PREFIX)
}

fn derive_key(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// IV must differ per save; derived from the clock.
fn fresh_iv() -> [u8; 16] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let digest = Sha256::digest(nanos.to_le_bytes());
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&digest[..16]);
    iv
}

/// Seal a secret for storage.
pub fn seal(passphrase: &str, plaintext: &str) -> String {
    let mut key = derive_key(passphrase);
    let iv = fresh_iv();

    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .expect("key and iv lengths are fixed")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    key.zeroize();

    let mut buf = Vec::with_capacity(iv.len() + ciphertext.len());
    buf.extend_from_slice(&iv);
    buf.extend_from_slice(&ciphertext);

    format!("{SEALED_PREFIX}{}", BASE64.encode(buf))
}

/// Unseal a stored value. Plaintext (unprefixed) values pass through.
pub fn unseal(passphrase: &str, stored: &str) -> SessionResult<String> {
    let Some(encoded) = stored.strip_prefix(SEALED_PREFIX) else {
        return Ok(stored.to_string());
    };

    let buf = BASE64
        .decode(encoded)
        .map_err(|e| SessionError::Seal(format!("invalid base64: {e}")))?;
    if buf.len() < 16 {
        return Err(SessionError::Seal("sealed value too short".to_string()));
    }
    let (iv, ciphertext) = buf.split_at(16);

    let mut key = derive_key(passphrase);
    let result = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| SessionError::Seal(format!("cipher init failed: {e}")))
        .and_then(|dec| {
            dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| SessionError::Seal("decryption failed (wrong passphrase?)".to_string()))
        });
    key.zeroize();

    let plaintext = result?;
    String::from_utf8(plaintext)
        .map_err(|e| SessionError::Seal(format!("sealed value not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_round_trip() {
        let sealed = seal("hunter2", "my-app-secret");
        assert!(is_sealed(&sealed));
        assert_eq!(unseal("hunter2", &sealed).unwrap(), "my-app-secret");
    }

    #[test]
    fn test_unseal_passes_plaintext_through() {
        assert_eq!(unseal("hunter2", "not-sealed").unwrap(), "not-sealed");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = seal("hunter2", "my-app-secret");
        assert!(unseal("hunter3", &sealed).is_err());
    }

    #[test]
    fn test_seal_empty_string() {
        let sealed = seal("hunter2", "");
        assert_eq!(unseal("hunter2", &sealed).unwrap(), "");
    }

    #[test]
    fn test_truncated_sealed_value_rejected() {
        assert!(unseal("hunter2", "sealed:AAAA").is_err());
    }
}
