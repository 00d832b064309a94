//! User-visible notices and the connection status indicator.

use {
    tgsync_common::{ConnectionStatus, SessionKind},
    tracing::{error, info},
};

pub const CHECK_CONNECTION_HINT: &str = "Check your internet connection and the bot token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message shown to the user and written to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Remediation hint, e.g. [`CHECK_CONNECTION_HINT`].
    pub hint: Option<String>,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            hint: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}. {hint}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Where notices go. The host decides how to display them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(notice = %notice, "notice"),
            NoticeLevel::Error => error!(notice = %notice, "notice"),
        }
    }
}

/// Observer of connection status transitions. Purely observational: nothing
/// it does feeds back into the runtime.
pub trait StatusIndicator: Send + Sync {
    fn update(&self, kind: SessionKind, status: ConnectionStatus, error: Option<&str>);

    /// The runtime is unloading; release whatever the indicator shows.
    fn destroy(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl StatusIndicator for NoopIndicator {
    fn update(&self, _kind: SessionKind, _status: ConnectionStatus, _error: Option<&str>) {}
}
