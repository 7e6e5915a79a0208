//! Runtime configuration.

use crate::error::Result;
use crate::export::ExportFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_STORAGE_LIMIT: u64 = 500 * 1024 * 1024;
pub const DEFAULT_PARSE_THROTTLE_MS: u64 = 1000;
pub const DEFAULT_AUTO_SAVE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_EXPORT_THRESHOLD: u8 = 60;

/// Settings consumed by the session and its collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub auto_save: bool,
    pub storage_limit: u64,
    pub default_format: ExportFormat,
    pub enable_analytics: bool,
    pub parse_throttle_ms: u64,
    pub auto_save_interval_secs: u64,
    /// Minimum confidence before a detected project is offered for export.
    pub export_threshold: u8,
    pub selectors: SelectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_save: true,
            storage_limit: DEFAULT_STORAGE_LIMIT,
            default_format: ExportFormat::Json,
            enable_analytics: false,
            parse_throttle_ms: DEFAULT_PARSE_THROTTLE_MS,
            auto_save_interval_secs: DEFAULT_AUTO_SAVE_INTERVAL_SECS,
            export_threshold: DEFAULT_EXPORT_THRESHOLD,
            selectors: SelectorConfig::default(),
        }
    }
}

impl Config {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// CSS selectors describing the chat page. Overridable because the page
/// markup changes without notice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorConfig {
    /// Tried in order when looking for the chat container.
    pub containers: Vec<String>,
    pub message: String,
    pub user_message: String,
    pub assistant_message: String,
    pub message_content: String,
    pub code_block: String,
    pub timestamp: String,
    pub avatar: String,
    pub title: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            containers: vec![
                r#"[class*="chat"]"#.into(),
                r#"[class*="conversation"]"#.into(),
                ".messages-container".into(),
            ],
            message: r#"[class*="message"], [class*="chat-message"]"#.into(),
            user_message: r#"[class*="user"], [class*="human"]"#.into(),
            assistant_message: r#"[class*="assistant"], [class*="ai"], [class*="bot"]"#.into(),
            message_content: r#"[class*="content"], [class*="text"], .prose"#.into(),
            code_block: r#"pre, code, [class*="code"], [class*="block"]"#.into(),
            timestamp: r#"[class*="time"], [class*="timestamp"], time"#.into(),
            avatar: r#"[class*="avatar"], [class*="icon"], img[alt*="avatar"]"#.into(),
            title: r#"h1, h2, h3, [class*="title"], [class*="heading"]"#.into(),
        }
    }
}
