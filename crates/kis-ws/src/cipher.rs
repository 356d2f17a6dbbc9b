//! Execution-notice payload cipher.
//!
//! Notices arrive as base64 AES-256-CBC ciphertext with PKCS#7 padding.
//! The key and IV are ASCII strings delivered in the notice subscription
//! ack and are valid for the connection's lifetime.

use crate::error::{WsError, WsResult};
use crate::frame::CipherKey;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Decrypt a base64 notice payload to its caret-delimited plaintext.
pub fn decrypt_notice(key: &CipherKey, cipher_text: &str) -> WsResult<String> {
    let ciphertext = BASE64
        .decode(cipher_text)
        .map_err(|e| WsError::DecryptError(format!("invalid base64: {e}")))?;

    let dec = Aes256CbcDec::new_from_slices(key.key.as_bytes(), key.iv.as_bytes())
        .map_err(|e| WsError::DecryptError(format!("bad key material: {e}")))?;

    let plaintext = dec
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| WsError::DecryptError(format!("unpad failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| WsError::DecryptError(format!("plaintext not UTF-8: {e}")))
}

/// Encrypt a plaintext the way the brokerage does. The client never sends
/// encrypted frames; this exists for codec round-trip verification.
pub fn encrypt_notice(key: &CipherKey, plaintext: &str) -> WsResult<String> {
    let enc = Aes256CbcEnc::new_from_slices(key.key.as_bytes(), key.iv.as_bytes())
        .map_err(|e| WsError::DecryptError(format!("bad key material: {e}")))?;

    let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(BASE64.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CipherKey {
        CipherKey {
            key: "0123456789abcdef0123456789abcdef".to_string(),
            iv: "abcdef0123456789".to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let key = test_key();
        let plaintext = "ID^5012345601^0000117057^^02^0^00^005930^5^71000^091532^0^2^^^06010^10^^삼성전자^N^^^^^";

        let encrypted = encrypt_notice(&key, plaintext).unwrap();
        assert_ne!(encrypted, plaintext);

        let decrypted = decrypt_notice(&key, &encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_round_trip_block_boundary() {
        // Plaintext whose padded length is exactly one extra block
        let key = test_key();
        let plaintext = "x".repeat(32);
        let decrypted = decrypt_notice(&key, &encrypt_notice(&key, &plaintext).unwrap()).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_iv_fails_or_garbles() {
        let key = test_key();
        let other = CipherKey {
            key: key.key.clone(),
            iv: "9876543210fedcba".to_string(),
        };
        let encrypted = encrypt_notice(&key, "account^order^fields").unwrap();

        // CBC with a wrong IV garbles only the first block; unpad may
        // still succeed, but the plaintext must not survive intact.
        match decrypt_notice(&other, &encrypted) {
            Ok(garbled) => assert_ne!(garbled, "account^order^fields"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(decrypt_notice(&test_key(), "!!!not base64!!!").is_err());
    }

    #[test]
    fn test_short_key_rejected() {
        let bad = CipherKey {
            key: "tooshort".to_string(),
            iv: "abcdef0123456789".to_string(),
        };
        assert!(decrypt_notice(&bad, "AAAA").is_err());
    }
}
