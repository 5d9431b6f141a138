//! Client-local configuration, persisted as `clientMeta.json` beside the
//! application. Field names on disk are camelCase for compatibility with
//! existing installations.

use std::path::{Path, PathBuf};

use anyhow::Context;

pub const DEFAULT_REFRESH_RATE: f32 = 20.0;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMeta {
    /// Directory holding `client_key.pri` and `client_key.pub`.
    pub key_path: PathBuf,
    /// The server's public signature key file.
    pub server_signature_path: PathBuf,
    pub server_address: String,
    pub server_port: u16,
    /// Dispatch loop rate in Hz. Trade-off between CPU usage and
    /// responsiveness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<f32>,
    /// Where to persist the server-issued repeat token between runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_token_path: Option<PathBuf>,
}

impl ClientMeta {
    pub const FILE_NAME: &'static str = "clientMeta.json";

    /// Loads `clientMeta.json` from `dir`. A missing or malformed file is a
    /// fatal configuration error to be surfaced to the user.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(Self::FILE_NAME);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let meta: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(meta)
    }

    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(Self::FILE_NAME);
        let raw = serde_json::to_string_pretty(self).context("failed to serialize client meta")?;
        std::fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn refresh_rate(&self) -> f32 {
        self.refresh_rate.unwrap_or(DEFAULT_REFRESH_RATE)
    }
}
