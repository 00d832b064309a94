use std::fmt;

use serde::{Deserialize, Serialize};

// ── Session kinds ───────────────────────────────────────────────────────────

/// Which of the two connection roles a piece of state concerns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    Bot,
    User,
}

impl SessionKind {
    /// Connection order used by a full (re)initialization: user first, then bot.
    pub const ALL: [SessionKind; 2] = [SessionKind::User, SessionKind::Bot];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::User => "user",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects which session kinds a restart or initialization applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionFilter {
    #[default]
    All,
    Bot,
    User,
}

impl SessionFilter {
    #[must_use]
    pub fn includes(self, kind: SessionKind) -> bool {
        match self {
            Self::All => true,
            Self::Bot => kind == SessionKind::Bot,
            Self::User => kind == SessionKind::User,
        }
    }

    /// Kinds selected by this filter, in connection order.
    pub fn kinds(self) -> impl Iterator<Item = SessionKind> {
        SessionKind::ALL
            .into_iter()
            .filter(move |kind| self.includes(*kind))
    }
}

impl From<SessionKind> for SessionFilter {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Bot => Self::Bot,
            SessionKind::User => Self::User,
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Lifecycle of the whole sync runtime, driven by load/unload only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Loading,
    Loaded,
    Unloading,
    Unloaded,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Unloading => "unloading",
            Self::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

/// Identity of the bot account as reported by the backend (`getMe`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: String,
}

impl BotIdentity {
    /// `@username` when the bot has one, the first name otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}
