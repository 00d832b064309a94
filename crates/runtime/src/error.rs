use thiserror::Error;

use tgsync_vault::VaultError;

#[derive(Debug, Error)]
pub enum Error {
    /// The token is sealed with a PIN and no PIN has been entered yet.
    #[error("bot token is locked: a pin code is required")]
    PinRequired,

    /// The PIN prompt was cancelled, or the token was denied earlier in this
    /// process. The bot session is unusable until the configuration changes.
    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("bot token could not be opened: incorrect pin code")]
    WrongPin,

    #[error("bot token is not configured")]
    MissingToken,

    #[error("can't get access to bot info, restart the sync")]
    BotIdentityUnavailable,

    #[error("task queue is closed")]
    QueueClosed,

    #[error("task `{task}` panicked: {message}")]
    TaskPanicked { task: &'static str, message: String },

    #[error(transparent)]
    Vault(VaultError),

    #[error("configuration error: {0}")]
    Config(#[source] anyhow::Error),

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Token access failed in a way retrying cannot fix without user action.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            Self::PinRequired | Self::AccessDenied { .. } | Self::WrongPin | Self::MissingToken
        )
    }
}

impl From<VaultError> for Error {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::PinRequired => Self::PinRequired,
            VaultError::BadCredential => Self::WrongPin,
            other => Self::Vault(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
