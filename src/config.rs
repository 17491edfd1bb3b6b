use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Largest attachment the composer accepts, in bytes.
pub const DEFAULT_MAX_ATTACHMENT_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;

const MIN_ATTACHMENT_LIMIT: u64 = 1024;
const MAX_ATTACHMENT_LIMIT: u64 = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// On-disk compose config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposeConfig {
    #[serde(default = "default_max_attachment")]
    pub max_attachment_upload_size: u64,
    /// Degrade every send to a save. Set when an automated harness drives the UI.
    #[serde(default)]
    pub inhibit_send: bool,
    /// MIME patterns accepted for files arriving through a share request.
    #[serde(default = "default_share_types")]
    pub accepted_share_types: Vec<String>,
}

fn default_max_attachment() -> u64 {
    DEFAULT_MAX_ATTACHMENT_UPLOAD_SIZE
}

fn default_share_types() -> Vec<String> {
    vec!["*/*".to_string()]
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_attachment_upload_size: DEFAULT_MAX_ATTACHMENT_UPLOAD_SIZE,
            inhibit_send: false,
            accepted_share_types: default_share_types(),
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neverlight-mail")
}

fn config_path() -> PathBuf {
    config_dir().join("compose.json")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

impl ComposeConfig {
    /// Load the config file, then apply env var overrides. Never fails.
    pub fn load() -> Self {
        let path = config_path();
        let mut cfg = match fs::read_to_string(&path) {
            Ok(data) => Self::from_json(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable compose config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        cfg.apply_env();
        cfg
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        let cfg: ComposeConfig =
            serde_json::from_str(data).map_err(|e| format!("parse compose config: {e}"))?;
        Ok(cfg.clamped())
    }

    pub fn save(&self) -> Result<(), String> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create config dir: {e}"))?;
        }
        let data =
            serde_json::to_string_pretty(self).map_err(|e| format!("serialize config: {e}"))?;
        fs::write(&path, data).map_err(|e| format!("write config: {e}"))
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("NEVERLIGHT_MAIL_INHIBIT_SEND") {
            self.inhibit_send = v == "true" || v == "1";
        }
        if let Some(limit) = std::env::var("NEVERLIGHT_MAIL_MAX_ATTACHMENT_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.max_attachment_upload_size = limit;
        }
        *self = self.clone().clamped();
    }

    fn clamped(mut self) -> Self {
        self.max_attachment_upload_size = self
            .max_attachment_upload_size
            .clamp(MIN_ATTACHMENT_LIMIT, MAX_ATTACHMENT_LIMIT);
        if self.accepted_share_types.is_empty() {
            self.accepted_share_types = default_share_types();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = ComposeConfig::from_json("{}").unwrap();
        assert_eq!(cfg, ComposeConfig::default());
    }

    #[test]
    fn limit_is_clamped() {
        let cfg = ComposeConfig::from_json(r#"{"max_attachment_upload_size": 1}"#).unwrap();
        assert_eq!(cfg.max_attachment_upload_size, MIN_ATTACHMENT_LIMIT);
        let cfg = ComposeConfig::from_json(r#"{"accepted_share_types": []}"#).unwrap();
        assert_eq!(cfg.accepted_share_types, vec!["*/*".to_string()]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(ComposeConfig::from_json("not json").is_err());
    }
}
