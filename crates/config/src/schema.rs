//! Configuration document for the sync runtime.
//!
//! Every field has a default so partially-written or older documents load
//! cleanly; [`crate::upgrade`] repairs the parts that defaults cannot.

use {
    serde::{Deserialize, Serialize},
    tgsync_common::SessionKind,
};

pub const DEFAULT_TELEGRAM_FOLDER: &str = "Telegram";
pub const DEFAULT_NOTE_NAME_TEMPLATE: &str = "{{content:30}} - {{messageTime:YYYYMMDDHHmmssSSS}}.md";
pub const DEFAULT_FILE_NAME_TEMPLATE: &str =
    "{{file:name}} - {{messageTime:YYYYMMDDHHmmssSSS}}.{{file:extension}}";
pub const DEFAULT_MESSAGE_FILTER_QUERY: &str = "{{all}}";

/// When the connection status indicator is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIndicatorMode {
    Never,
    #[default]
    OnlyWhenErrors,
    Constant,
}

/// A single condition of a message filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCondition {
    /// Operation name, e.g. `all`, `user`, `chat`, `topic`.
    pub operation: String,
    pub value: String,
}

impl Default for FilterCondition {
    fn default() -> Self {
        Self {
            operation: "all".into(),
            value: String::new(),
        }
    }
}

/// Where messages matching a filter are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionRule {
    pub message_filter_query: String,
    pub message_filter_conditions: Vec<FilterCondition>,
    pub template_file_path: String,
    pub note_path_template: String,
    pub file_path_template: String,
}

impl Default for DistributionRule {
    fn default() -> Self {
        Self {
            message_filter_query: DEFAULT_MESSAGE_FILTER_QUERY.into(),
            message_filter_conditions: vec![FilterCondition::default()],
            template_file_path: String::new(),
            note_path_template: default_note_path_template(),
            file_path_template: default_file_path_template(),
        }
    }
}

impl DistributionRule {
    #[must_use]
    pub fn has_filter(&self) -> bool {
        !self.message_filter_query.trim().is_empty() && !self.message_filter_conditions.is_empty()
    }

    #[must_use]
    pub fn has_destination(&self) -> bool {
        !self.note_path_template.is_empty()
            || !self.file_path_template.is_empty()
            || !self.template_file_path.is_empty()
    }
}

#[must_use]
pub fn default_note_path_template() -> String {
    format!("{DEFAULT_TELEGRAM_FOLDER}/{DEFAULT_NOTE_NAME_TEMPLATE}")
}

#[must_use]
pub fn default_file_path_template() -> String {
    format!("{DEFAULT_TELEGRAM_FOLDER}/{DEFAULT_FILE_NAME_TEMPLATE}")
}

/// Root configuration document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Bot token; sealed by the vault once `bot_token_encrypted` is set.
    pub bot_token: String,
    pub bot_token_encrypted: bool,
    /// Require a PIN to unseal the bot token.
    pub encryption_by_pin_code: bool,

    /// The only device allowed to connect. Unset means every device may.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_device_id: Option<String>,

    /// Which session kind reads the backend as the user account.
    pub telegram_session_type: SessionKind,
    pub telegram_session_id: i64,

    /// Forward messages that arrived while the sync was offline, once a day.
    pub process_old_messages: bool,

    /// Clear the user session cache on the next start (consumed at load).
    pub cache_cleanup_at_startup: bool,

    pub message_distribution_rules: Vec<DistributionRule>,

    // Advanced settings.
    pub delete_messages_from_telegram: bool,
    pub default_message_delimiter: bool,
    pub parallel_message_processing: bool,
    /// Delete the bot's reply after this many milliseconds; 0 keeps it.
    pub delete_replay_messages_ms: u64,
    pub connection_status_indicator: StatusIndicatorMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_token_encrypted: false,
            encryption_by_pin_code: false,
            main_device_id: None,
            telegram_session_type: SessionKind::Bot,
            telegram_session_id: 0,
            process_old_messages: false,
            cache_cleanup_at_startup: false,
            message_distribution_rules: vec![DistributionRule::default()],
            delete_messages_from_telegram: false,
            default_message_delimiter: true,
            parallel_message_processing: false,
            delete_replay_messages_ms: 0,
            connection_status_indicator: StatusIndicatorMode::default(),
        }
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("bot_token", &"[REDACTED]")
            .field("bot_token_encrypted", &self.bot_token_encrypted)
            .field("encryption_by_pin_code", &self.encryption_by_pin_code)
            .field("main_device_id", &self.main_device_id)
            .field("telegram_session_type", &self.telegram_session_type)
            .field("process_old_messages", &self.process_old_messages)
            .finish_non_exhaustive()
    }
}

impl SyncConfig {
    /// Configured main device id, ignoring blank values.
    #[must_use]
    pub fn main_device_id(&self) -> Option<&str> {
        self.main_device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn has_bot_token(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }

    /// The user session is only driven when the user account is the reader.
    #[must_use]
    pub fn user_session_enabled(&self) -> bool {
        self.telegram_session_type == SessionKind::User
    }
}
