//! The four-step mutual-authentication handshake, then the credential bind.
//!
//! ```text
//! 1. C -> S: KC                                   (client public key)
//! 2. S -> C: KS                                   (server public key)
//! 3. C -> S: Enc_S(NC)                            (64-bit challenge)
//! 4. S -> C: Enc_C(NC, NS, K, T) ‖ Sign_S(...)    (session key + token)
//!    client verifies the signature and that NC was echoed
//! 5. C -> S: {AuthMode ‖ credential}_K
//! 6. S -> C: ConnectionResponse
//! ```
//!
//! Failure at any step closes the socket.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::Signature;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::crypto::{ClientKeys, SessionCrypto, REPEAT_TOKEN_LEN, SESSION_KEY_LEN};
use crate::frame::{self, Frame, FrameKind};
use crate::ConnectError;

/// How the client proves who it is once the channel is sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMode {
    Jwt = 1,
    RepeatToken = 2,
}

#[derive(Clone)]
pub enum Credentials {
    Jwt(String),
    RepeatToken([u8; REPEAT_TOKEN_LEN]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResponse {
    Success = 0,
    SuccessAdmin = 1,
    Failed = 2,
}

impl ConnectionResponse {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::SuccessAdmin),
            2 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Step 4 payload: challenge echo, server nonce, session key, token.
const SESSION_PAYLOAD_LEN: usize = 8 + 4 + SESSION_KEY_LEN + 8;

pub(crate) struct Session {
    pub crypto: SessionCrypto,
    pub full_access: bool,
}

pub(crate) async fn establish(
    stream: &mut TcpStream,
    keys: &ClientKeys,
    credentials: &Credentials,
) -> Result<Session, ConnectError> {
    let exchange = |detail: &str| ConnectError::CredsExchangeFailed(detail.to_string());

    // 1: the client's public key, SPKI DER.
    let client_key_der = keys
        .public_key
        .to_public_key_der()
        .map_err(|_| exchange("client public key could not be encoded"))?;
    send(stream, FrameKind::Key, client_key_der.as_bytes()).await?;

    // 2: the server's public key.
    let server_key_frame = expect_frame(stream, FrameKind::Key).await?;
    let server_key = RsaPublicKey::from_public_key_der(&server_key_frame.payload)
        .map_err(|_| exchange("server sent an unparseable public key"))?;

    // 3: a fresh 64-bit challenge under the server's key.
    let mut challenge = [0u8; 8];
    OsRng.fill_bytes(&mut challenge);
    let encrypted_challenge = server_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, &challenge)
        .map_err(|_| exchange("challenge encryption failed"))?;
    send(stream, FrameKind::Rsa, &encrypted_challenge).await?;

    // 4: the signed session material, encrypted to us.
    let response = expect_frame(stream, FrameKind::Rsa).await?;
    let key_size = keys.private_key.size();
    if response.payload.len() != key_size * 2 {
        return Err(exchange("session response has the wrong length"));
    }
    let (ciphertext, signature) = response.payload.split_at(key_size);

    let payload = keys
        .private_key
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|_| exchange("session response decryption failed"))?;
    if payload.len() != SESSION_PAYLOAD_LEN {
        return Err(exchange("session payload has the wrong length"));
    }

    let signature = Signature::try_from(signature)
        .map_err(|_| exchange("session signature is malformed"))?;
    keys.server_signature
        .verify(&payload, &signature)
        .map_err(|_| exchange("server failed to authenticate itself"))?;

    if payload[..8] != challenge {
        return Err(exchange(
            "server echoed the wrong challenge; refusing to proceed",
        ));
    }
    // payload[8..12] is the server's nonce; it only matters server-side.
    let mut session_key = [0u8; SESSION_KEY_LEN];
    session_key.copy_from_slice(&payload[12..12 + SESSION_KEY_LEN]);
    let session_token = u64::from_le_bytes(payload[12 + SESSION_KEY_LEN..].try_into().unwrap());

    let crypto = SessionCrypto::new(&session_key, session_token);

    // 5: prove who we are under the session key.
    let mut auth = Vec::new();
    match credentials {
        Credentials::Jwt(jwt) => {
            auth.push(AuthMode::Jwt as u8);
            auth.extend_from_slice(jwt.as_bytes());
        }
        Credentials::RepeatToken(token) => {
            auth.push(AuthMode::RepeatToken as u8);
            auth.extend_from_slice(token);
        }
    }
    send(stream, FrameKind::Aes, &crypto.seal(&auth)).await?;

    // 6: the server's verdict.
    let verdict = expect_frame(stream, FrameKind::ConnectionResponse).await?;
    let verdict = verdict
        .payload
        .first()
        .and_then(|&byte| ConnectionResponse::from_u8(byte));
    let full_access = match verdict {
        Some(ConnectionResponse::Success) => false,
        Some(ConnectionResponse::SuccessAdmin) => true,
        Some(ConnectionResponse::Failed) | None => {
            return Err(match credentials {
                Credentials::Jwt(_) => ConnectError::InvalidJwt,
                Credentials::RepeatToken(_) => ConnectError::InvalidRepeatToken,
            })
        }
    };

    tracing::info!(full_access, "connection established");
    Ok(Session {
        crypto,
        full_access,
    })
}

async fn send(stream: &mut TcpStream, kind: FrameKind, payload: &[u8]) -> Result<(), ConnectError> {
    stream
        .write_all(&frame::encode(kind, payload))
        .await
        .map_err(|err| ConnectError::CredsExchangeFailed(format!("send failed: {err}")))
}

async fn expect_frame(stream: &mut TcpStream, kind: FrameKind) -> Result<Frame, ConnectError> {
    let frame = frame::read_frame(stream)
        .await
        .map_err(|err| ConnectError::CredsExchangeFailed(format!("receive failed: {err}")))?;
    if frame.kind != kind {
        return Err(ConnectError::CredsExchangeFailed(format!(
            "expected a {kind:?} frame, got {:?}",
            frame.kind
        )));
    }
    Ok(frame)
}
