//! Record sealing for data at rest.
//!
//! Derives a symmetric key from a per-install random salt and seals opaque
//! payloads with AES-256-GCM over the platform secure blob store. The nonce
//! is 16 bytes to match the stored blob format, random per write, and never
//! derived from the key.
//!
//! Blobs written before IVs were stored per record carry no `iv` field and
//! were sealed under a nonce derived from the key itself. [`CryptoStore::open`]
//! still decodes them, but re-seals with a fresh random IV on first success;
//! the standard [`CryptoStore::decrypt`] path requires an IV.

use std::sync::Arc;

use aes_gcm::{
    aead::{
        generic_array::{typenum::U16, GenericArray},
        Aead, KeyInit,
    },
    aes::Aes256,
    AesGcm,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use vigil_core::effects::SecureBlobStore;
use vigil_core::{Result, VigilError};

/// AES-256-GCM parameterized for the blob format's 16-byte IV.
type BlobCipher = AesGcm<Aes256, U16>;

/// Blob-store record holding the key-derivation salt.
const SALT_RECORD: &str = "vigil.aes-salt";

/// Salt length in raw bytes (stored hex-encoded).
const SALT_LEN: usize = 16;

/// IV length in raw bytes.
const IV_LEN: usize = 16;

/// PBKDF2 iteration count. Deliberately low: key derivation sits on the
/// interactive path of every queue read, and the salt is random per install.
const KDF_ITERATIONS: u32 = 1_000;

/// Symmetric key derived from the persisted salt. Zeroized on drop.
pub struct DerivedKey(Zeroizing<[u8; 32]>);

impl DerivedKey {
    fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding of the key, used only for legacy IV derivation.
    fn hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.0))
    }
}

/// On-disk representation of a sealed record.
///
/// `iv` is present and unique for every blob this version writes; a missing
/// `iv` marks the legacy format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Hex-encoded 16-byte IV.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    /// Base64-encoded ciphertext.
    pub cipher: String,
}

/// Seals and opens named records over a [`SecureBlobStore`].
pub struct CryptoStore {
    store: Arc<dyn SecureBlobStore>,
}

impl CryptoStore {
    /// Create a store over the given blob backend.
    pub fn new(store: Arc<dyn SecureBlobStore>) -> Self {
        Self { store }
    }

    /// Derive the sealing key, creating and persisting the salt on first use.
    ///
    /// PBKDF2-HMAC-SHA256 over the hex salt string with the raw salt bytes,
    /// 256-bit output. Creating the salt is idempotent create-if-absent.
    pub async fn derive_key(&self) -> Result<DerivedKey> {
        let salt_hex = self.load_or_create_salt().await?;
        derive_key_from_salt(&salt_hex)
    }

    async fn load_or_create_salt(&self) -> Result<String> {
        if let Some(raw) = self.store.get(SALT_RECORD).await? {
            let salt = String::from_utf8(raw)
                .map_err(|_| VigilError::storage("salt record is not UTF-8"))?;
            if !salt.is_empty() {
                return Ok(salt);
            }
        }

        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        let salt = hex::encode(bytes);
        self.store
            .set(SALT_RECORD, salt.clone().into_bytes())
            .await?;
        debug!("created key-derivation salt");
        Ok(salt)
    }

    /// Encrypt `plaintext` under `key` with a fresh random IV.
    pub fn encrypt(&self, plaintext: &[u8], key: &DerivedKey) -> Result<EncryptedBlob> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let cipher = BlobCipher::new(GenericArray::from_slice(key.as_bytes()));
        let ciphertext = cipher
            .encrypt(GenericArray::from_slice(&iv), plaintext)
            .map_err(|_| VigilError::internal("AES-GCM encryption failed"))?;

        Ok(EncryptedBlob {
            iv: Some(hex::encode(iv)),
            cipher: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt a blob sealed by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`VigilError::Decrypt`] on a missing or malformed IV, a
    /// malformed ciphertext, or a wrong key (tag mismatch).
    pub fn decrypt(&self, blob: &EncryptedBlob, key: &DerivedKey) -> Result<Vec<u8>> {
        let iv_hex = blob
            .iv
            .as_deref()
            .ok_or_else(|| VigilError::decrypt("blob is missing its IV"))?;
        let iv = decode_iv(iv_hex)?;
        decrypt_with_iv(&blob.cipher, &iv, key)
    }

    /// Decrypt a legacy ciphertext sealed under the key-derived IV.
    pub fn decrypt_legacy(&self, cipher_b64: &str, key: &DerivedKey) -> Result<Vec<u8>> {
        let iv = legacy_iv(key);
        decrypt_with_iv(cipher_b64, &iv, key)
    }

    /// Seal `plaintext` into the named record.
    pub async fn seal(&self, record: &str, plaintext: &[u8]) -> Result<()> {
        let key = self.derive_key().await?;
        self.seal_with_key(record, plaintext, &key).await
    }

    async fn seal_with_key(&self, record: &str, plaintext: &[u8], key: &DerivedKey) -> Result<()> {
        let blob = self.encrypt(plaintext, key)?;
        let payload = serde_json::to_vec(&blob)
            .map_err(|e| VigilError::serialization(e.to_string()))?;
        self.store.set(record, payload).await
    }

    /// Open the named record, returning `None` when it does not exist.
    ///
    /// Legacy blobs (no stored IV, or a bare ciphertext payload) are decoded
    /// with the key-derived IV and immediately re-sealed with a fresh random
    /// one, so each record migrates at most once.
    pub async fn open(&self, record: &str) -> Result<Option<Vec<u8>>> {
        let Some(raw) = self.store.get(record).await? else {
            return Ok(None);
        };
        let key = self.derive_key().await?;

        let legacy_cipher = match serde_json::from_slice::<EncryptedBlob>(&raw) {
            Ok(blob) if blob.iv.is_some() => {
                return self.decrypt(&blob, &key).map(Some);
            }
            Ok(blob) => blob.cipher,
            Err(_) => String::from_utf8(raw)
                .map_err(|_| VigilError::decrypt("record is neither a sealed blob nor text"))?,
        };

        let plaintext = self.decrypt_legacy(&legacy_cipher, &key)?;
        match self.seal_with_key(record, &plaintext, &key).await {
            Ok(()) => info!(record, "migrated legacy blob to random-IV format"),
            // Keep serving the decoded payload; the next successful write
            // completes the migration.
            Err(error) => warn!(record, %error, "failed to re-seal legacy blob"),
        }
        Ok(Some(plaintext))
    }

    /// Delete the named record.
    pub async fn remove(&self, record: &str) -> Result<()> {
        self.store.delete(record).await
    }

    /// Delete the salt record.
    ///
    /// Permanently invalidates every blob sealed under the current key,
    /// including any not-yet-migrated legacy blob. Intended for logout.
    pub async fn reset(&self) -> Result<()> {
        self.store.delete(SALT_RECORD).await
    }
}

fn derive_key_from_salt(salt_hex: &str) -> Result<DerivedKey> {
    let raw_salt = hex::decode(salt_hex)
        .map_err(|_| VigilError::decrypt("stored salt is not valid hex"))?;
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(salt_hex.as_bytes(), &raw_salt, KDF_ITERATIONS, &mut out);
    Ok(DerivedKey::new(out))
}

/// IV used by the legacy format: derived from the key itself, one PBKDF2
/// iteration over the hex key with an "iv" suffix.
fn legacy_iv(key: &DerivedKey) -> [u8; IV_LEN] {
    let key_hex = key.hex();
    let password = format!("{}iv", key_hex.as_str());
    let mut iv = [0u8; IV_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), key.as_bytes(), 1, &mut iv);
    iv
}

fn decode_iv(iv_hex: &str) -> Result<[u8; IV_LEN]> {
    let bytes = hex::decode(iv_hex).map_err(|_| VigilError::decrypt("IV is not valid hex"))?;
    bytes
        .try_into()
        .map_err(|_| VigilError::decrypt("IV has the wrong length"))
}

fn decrypt_with_iv(cipher_b64: &str, iv: &[u8; IV_LEN], key: &DerivedKey) -> Result<Vec<u8>> {
    let ciphertext = BASE64
        .decode(cipher_b64)
        .map_err(|_| VigilError::decrypt("ciphertext is not valid base64"))?;
    let cipher = BlobCipher::new(GenericArray::from_slice(key.as_bytes()));
    cipher
        .decrypt(GenericArray::from_slice(iv), ciphertext.as_slice())
        .map_err(|_| VigilError::decrypt("authentication failed (wrong key or corrupt data)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vigil_testkit::MemoryBlobStore;

    fn crypto() -> CryptoStore {
        CryptoStore::new(Arc::new(MemoryBlobStore::new()))
    }

    /// Build a blob in the legacy format: key-derived IV, no `iv` field.
    fn legacy_blob(plaintext: &[u8], key: &DerivedKey) -> EncryptedBlob {
        let iv = legacy_iv(key);
        let cipher = BlobCipher::new(GenericArray::from_slice(key.as_bytes()));
        let ciphertext = cipher
            .encrypt(GenericArray::from_slice(&iv), plaintext)
            .unwrap();
        EncryptedBlob {
            iv: None,
            cipher: BASE64.encode(ciphertext),
        }
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_round_trip() {
        let store = crypto();
        let key = store.derive_key().await.unwrap();

        let blob = store.encrypt(b"pending decisions", &key).unwrap();
        let plaintext = store.decrypt(&blob, &key).unwrap();
        assert_eq!(plaintext, b"pending decisions");
    }

    #[tokio::test]
    async fn test_fresh_iv_per_encryption() {
        let store = crypto();
        let key = store.derive_key().await.unwrap();

        let a = store.encrypt(b"same payload", &key).unwrap();
        let b = store.encrypt(b"same payload", &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.cipher, b.cipher);
    }

    #[tokio::test]
    async fn test_wrong_key_fails_decrypt() {
        let store = crypto();
        let key = store.derive_key().await.unwrap();
        let blob = store.encrypt(b"secret", &key).unwrap();

        let other = crypto();
        let wrong_key = other.derive_key().await.unwrap();
        assert_matches!(
            store.decrypt(&blob, &wrong_key),
            Err(VigilError::Decrypt { .. })
        );
    }

    #[tokio::test]
    async fn test_missing_iv_rejected_by_decrypt() {
        let store = crypto();
        let key = store.derive_key().await.unwrap();
        let blob = EncryptedBlob {
            iv: None,
            cipher: "AAAA".into(),
        };
        assert_matches!(store.decrypt(&blob, &key), Err(VigilError::Decrypt { .. }));
    }

    #[tokio::test]
    async fn test_malformed_cipher_rejected() {
        let store = crypto();
        let key = store.derive_key().await.unwrap();
        let blob = EncryptedBlob {
            iv: Some(hex::encode([0u8; 16])),
            cipher: "not base64 !!".into(),
        };
        assert_matches!(store.decrypt(&blob, &key), Err(VigilError::Decrypt { .. }));
    }

    #[tokio::test]
    async fn test_salt_created_once() {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = CryptoStore::new(backend.clone());

        let a = store.derive_key().await.unwrap();
        let salt_after_first = backend.get(SALT_RECORD).await.unwrap();
        let b = store.derive_key().await.unwrap();
        let salt_after_second = backend.get(SALT_RECORD).await.unwrap();

        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(salt_after_first, salt_after_second);
        assert!(salt_after_first.is_some());
    }

    #[tokio::test]
    async fn test_seal_open_round_trip() {
        let store = crypto();
        store.seal("vigil.test-record", b"payload").await.unwrap();
        let read = store.open("vigil.test-record").await.unwrap();
        assert_eq!(read.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_open_absent_record_is_none() {
        let store = crypto();
        assert_eq!(store.open("vigil.nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_legacy_blob_opens_and_migrates() {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = CryptoStore::new(backend.clone());
        let key = store.derive_key().await.unwrap();

        let blob = legacy_blob(b"old queue", &key);
        backend
            .set("vigil.queue", serde_json::to_vec(&blob).unwrap())
            .await
            .unwrap();

        let read = store.open("vigil.queue").await.unwrap();
        assert_eq!(read.as_deref(), Some(&b"old queue"[..]));

        // The record was rewritten with a fresh random IV.
        let raw = backend.get("vigil.queue").await.unwrap().unwrap();
        let rewritten: EncryptedBlob = serde_json::from_slice(&raw).unwrap();
        assert!(rewritten.iv.is_some());
        assert_eq!(
            store.open("vigil.queue").await.unwrap().as_deref(),
            Some(&b"old queue"[..])
        );
    }

    #[tokio::test]
    async fn test_bare_legacy_payload_opens() {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = CryptoStore::new(backend.clone());
        let key = store.derive_key().await.unwrap();

        // Oldest format: the record body is the base64 ciphertext itself.
        let blob = legacy_blob(b"bare payload", &key);
        backend
            .set("vigil.cache", blob.cipher.into_bytes())
            .await
            .unwrap();

        let read = store.open("vigil.cache").await.unwrap();
        assert_eq!(read.as_deref(), Some(&b"bare payload"[..]));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_round_trip_any_payload(
                payload in proptest::collection::vec(any::<u8>(), 0..512),
            ) {
                let store = crypto();
                let key = derive_key_from_salt(&hex::encode([7u8; 16])).unwrap();
                let blob = store.encrypt(&payload, &key).unwrap();
                prop_assert_eq!(store.decrypt(&blob, &key).unwrap(), payload);
            }

            #[test]
            fn prop_ivs_never_repeat(
                payload in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let store = crypto();
                let key = derive_key_from_salt(&hex::encode([7u8; 16])).unwrap();
                let a = store.encrypt(&payload, &key).unwrap();
                let b = store.encrypt(&payload, &key).unwrap();
                prop_assert_ne!(a.iv, b.iv);
            }
        }
    }

    #[tokio::test]
    async fn test_reset_invalidates_sealed_records() {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = CryptoStore::new(backend.clone());
        store.seal("vigil.queue", b"payload").await.unwrap();

        store.reset().await.unwrap();

        // A new salt means a new key; the old blob no longer decrypts.
        assert_matches!(
            store.open("vigil.queue").await,
            Err(VigilError::Decrypt { .. })
        );
    }
}
