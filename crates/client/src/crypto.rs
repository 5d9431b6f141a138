//! Key material loading and session sealing.
//!
//! The handshake is RSA (PKCS#1 v1.5) with a SHA-256 signature from the
//! server; everything after it is AES-256-GCM under the session key, with
//! outbound bodies bound to the session by the server-issued token.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::config::ClientMeta;

pub const SESSION_KEY_LEN: usize = 32;
pub const GCM_NONCE_LEN: usize = 12;
pub const REPEAT_TOKEN_LEN: usize = protocol::REPEAT_TOKEN_LEN;

pub const PRIVATE_KEY_FILE: &str = "client_key.pri";
pub const PUBLIC_KEY_FILE: &str = "client_key.pub";

/// The client's own key pair plus the server's signature verification key.
pub struct ClientKeys {
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
    pub server_signature: VerifyingKey<Sha256>,
}

impl ClientKeys {
    pub fn load(meta: &ClientMeta) -> anyhow::Result<Self> {
        let key_file = meta.key_path.join(PRIVATE_KEY_FILE);
        let pem = std::fs::read_to_string(&key_file)
            .with_context(|| format!("failed to read client key {}", key_file.display()))?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .with_context(|| format!("failed to parse client key {}", key_file.display()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let sig_file = &meta.server_signature_path;
        let pem = std::fs::read_to_string(sig_file).with_context(|| {
            format!("failed to read server signature key {}", sig_file.display())
        })?;
        let server_signature = VerifyingKey::new(
            RsaPublicKey::from_public_key_pem(&pem).with_context(|| {
                format!("failed to parse server signature key {}", sig_file.display())
            })?,
        );

        Ok(Self {
            private_key,
            public_key,
            server_signature,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("message payload is shorter than a GCM nonce")]
    Truncated,
    #[error("decryption failed")]
    Decrypt,
}

/// Seals and opens session messages. Cloneable so the dispatch loop and the
/// request side can each hold one; the key and token never change after the
/// handshake.
#[derive(Clone)]
pub struct SessionCrypto {
    cipher: Aes256Gcm,
    session_token: u64,
}

impl SessionCrypto {
    pub fn new(key: &[u8; SESSION_KEY_LEN], session_token: u64) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            session_token,
        }
    }

    pub fn session_token(&self) -> u64 {
        self.session_token
    }

    /// Seals an arbitrary plaintext: `nonce ‖ ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Bytes {
        let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // Encryption only fails on absurd plaintext lengths.
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .expect("AES-GCM encryption failed");

        let mut out = BytesMut::with_capacity(GCM_NONCE_LEN + ciphertext.len());
        out.put_slice(&nonce_bytes);
        out.put_slice(&ciphertext);
        out.freeze()
    }

    /// Seals a request envelope, prefixing the session token that binds the
    /// message to this session.
    pub fn seal_request(&self, envelope: &[u8]) -> Bytes {
        let mut plaintext = BytesMut::with_capacity(8 + envelope.len());
        plaintext.put_u64_le(self.session_token);
        plaintext.put_slice(envelope);
        self.seal(&plaintext)
    }

    pub fn open(&self, payload: &[u8]) -> Result<Vec<u8>, SealError> {
        if payload.len() < GCM_NONCE_LEN {
            return Err(SealError::Truncated);
        }
        let (nonce_bytes, ciphertext) = payload.split_at(GCM_NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SealError::Decrypt)
    }

    /// Opens an inbound request-style payload, checking and stripping the
    /// leading session token.
    pub fn open_request(&self, payload: &[u8]) -> Result<Vec<u8>, SealError> {
        let mut plaintext = self.open(payload)?;
        if plaintext.len() < 8 {
            return Err(SealError::Truncated);
        }
        let token = u64::from_le_bytes(plaintext[..8].try_into().unwrap());
        if token != self.session_token {
            return Err(SealError::Decrypt);
        }
        plaintext.drain(..8);
        Ok(plaintext)
    }
}

pub fn read_repeat_token(path: &Path) -> Option<[u8; REPEAT_TOKEN_LEN]> {
    let raw = std::fs::read_to_string(path).ok()?;
    let bytes = hex::decode(raw.trim()).ok()?;
    let token: [u8; REPEAT_TOKEN_LEN] = bytes.try_into().ok()?;
    Some(token)
}

pub fn write_repeat_token(path: &Path, token: &[u8; REPEAT_TOKEN_LEN]) -> std::io::Result<()> {
    std::fs::write(path, hex::encode(token))
}
