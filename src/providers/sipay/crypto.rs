//! Sipay `hash_key` token scheme.
//!
//! A token is `<iv>:<salt>:<base64 ciphertext>` with `/` replaced by `__`
//! for transport. The cipher key derives from the shared secret:
//! `hex(SHA256(hex(SHA1(secret)) + salt))`, first 32 bytes, space-padded
//! if shorter; the IV is the first 16 bytes of the iv component under the
//! same padding rule. AES-256-CBC with PKCS#7 padding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Structured payment-status payload carried by a webhook token.
/// Missing trailing fields default to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub status: String,
    pub total: String,
    pub invoice_id: String,
    pub order_id: String,
    pub currency_code: String,
}

fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Right-pads with spaces and truncates to `len`, matching the
/// counterpart encryption step.
fn pad_bytes(value: &str, len: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.resize(len, b' ');
    bytes.truncate(len);
    bytes
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Encrypts `data` into a transport token with a fresh random IV and
/// salt. Returns `None` only if the derived key material is rejected by
/// the cipher, which does not happen for the fixed sizes used here.
pub fn encrypt_hash_key(data: &str, secret: &str) -> Option<String> {
    let iv = random_string(16);
    let salt = random_string(4);

    let password = sha1_hex(secret);
    let derived = sha256_hex(&format!("{}{}", password, salt));

    let key_bytes = pad_bytes(&derived, 32);
    let iv_bytes = pad_bytes(&iv, 16);

    let cipher = Aes256CbcEnc::new_from_slices(&key_bytes, &iv_bytes).ok()?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(data.as_bytes());

    let bundle = format!("{}:{}:{}", iv, salt, BASE64.encode(ciphertext));
    Some(bundle.replace('/', "__"))
}

/// Decrypts and validates a webhook token. Every failure anywhere in the
/// pipeline collapses to `None`; callers cannot distinguish sub-failures.
pub fn decrypt_hash_key(token: &str, secret: &str) -> Option<WebhookPayload> {
    // outbound encoding artifact of the counterpart encryption step
    let token = token.replace("__", "/");

    let mut components = token.splitn(3, ':');
    let iv = components.next()?;
    let salt = components.next()?;
    let encrypted = components.next()?;

    let password = sha1_hex(secret);
    let derived = sha256_hex(&format!("{}{}", password, salt));

    let key_bytes = pad_bytes(&derived, 32);
    let iv_bytes = pad_bytes(iv, 16);

    let ciphertext = BASE64.decode(encrypted).ok()?;
    let cipher = Aes256CbcDec::new_from_slices(&key_bytes, &iv_bytes).ok()?;
    let plaintext_bytes = cipher.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext).ok()?;
    let plaintext = String::from_utf8(plaintext_bytes).ok()?;

    if !plaintext.contains('|') {
        return None;
    }

    let mut fields = plaintext.split('|');
    let mut next = || fields.next().unwrap_or_default().to_string();

    Some(WebhookPayload {
        status: next(),
        total: next(),
        invoice_id: next(),
        order_id: next(),
        currency_code: next(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "app-secret-123";

    #[test]
    fn encrypt_then_decrypt_round_trips_all_fields() {
        let token = encrypt_hash_key("APPROVED|100.00|INV1|ORD1|TRY", SECRET)
            .expect("encryption succeeds");

        let payload = decrypt_hash_key(&token, SECRET).expect("valid token");
        assert_eq!(
            payload,
            WebhookPayload {
                status: "APPROVED".to_string(),
                total: "100.00".to_string(),
                invoice_id: "INV1".to_string(),
                order_id: "ORD1".to_string(),
                currency_code: "TRY".to_string(),
            }
        );
    }

    #[test]
    fn wrong_secret_yields_invalid_never_a_crash() {
        let token =
            encrypt_hash_key("APPROVED|100.00|INV1|ORD1|TRY", SECRET).expect("encryption succeeds");
        assert!(decrypt_hash_key(&token, "other-secret").is_none());
    }

    #[test]
    fn missing_trailing_fields_default_to_empty() {
        let token = encrypt_hash_key("APPROVED|100.00", SECRET).expect("encryption succeeds");

        let payload = decrypt_hash_key(&token, SECRET).expect("valid token");
        assert_eq!(payload.status, "APPROVED");
        assert_eq!(payload.total, "100.00");
        assert_eq!(payload.invoice_id, "");
        assert_eq!(payload.order_id, "");
        assert_eq!(payload.currency_code, "");
    }

    #[test]
    fn plaintext_without_delimiter_is_invalid() {
        let token = encrypt_hash_key("APPROVED", SECRET).expect("encryption succeeds");
        assert!(decrypt_hash_key(&token, SECRET).is_none());
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        assert!(decrypt_hash_key("", SECRET).is_none());
        assert!(decrypt_hash_key("only-one-component", SECRET).is_none());
        assert!(decrypt_hash_key("iv:salt", SECRET).is_none());
        assert!(decrypt_hash_key("iv:salt:not-base64!!!", SECRET).is_none());
    }

    #[test]
    fn slash_transport_encoding_is_reversed() {
        // force tokens until the base64 component contains a slash
        for attempt in 0..256 {
            let data = format!("APPROVED|{}.00|INV{}|ORD1|TRY", attempt, attempt);
            let token = encrypt_hash_key(&data, SECRET).expect("encryption succeeds");
            assert!(!token.contains('/'), "transport token must not contain /");
            if token.contains("__") {
                let payload = decrypt_hash_key(&token, SECRET).expect("valid token");
                assert_eq!(payload.status, "APPROVED");
                return;
            }
        }
        panic!("no generated token contained an escaped slash");
    }
}
