//! Bot token access.
//!
//! The stored token is sealed by the vault once `bot_token_encrypted` is set,
//! and from then on it is never handed out without being opened. A PIN, when
//! one is required, is cached for the life of the process. Prompting for it is
//! the caller's business (see [`crate::SyncContext::bot_token`]).

use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use {
    tgsync_config::SyncConfig,
    tgsync_vault::{TokenSealer, open_token, requires_pin},
};

use crate::error::{Error, Result};

/// Asks the user for the PIN. `None` means the prompt was cancelled.
#[async_trait]
pub trait PinPrompt: Send + Sync {
    async fn prompt_pin(&self) -> Option<Secret<String>>;
}

/// Prompt for headless runs: always cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPinPrompt;

#[async_trait]
impl PinPrompt for NoPinPrompt {
    async fn prompt_pin(&self) -> Option<Secret<String>> {
        None
    }
}

#[derive(Default)]
pub struct BotTokenAccess {
    sealer: TokenSealer,
    pin: Mutex<Option<Secret<String>>>,
    prompted: AtomicBool,
    denied: Mutex<Option<String>>,
}

impl BotTokenAccess {
    #[must_use]
    pub fn new(sealer: TokenSealer) -> Self {
        Self {
            sealer,
            ..Default::default()
        }
    }

    /// Return the usable token from `config`.
    ///
    /// Never prompts. A PIN-sealed token without a cached PIN yields
    /// [`Error::PinRequired`]; a PIN that does not open it yields
    /// [`Error::WrongPin`].
    pub fn get_token(&self, config: &SyncConfig) -> Result<Secret<String>> {
        if let Some(reason) = self.denial() {
            return Err(Error::AccessDenied { reason });
        }
        if !config.has_bot_token() {
            return Err(Error::MissingToken);
        }
        if !config.bot_token_encrypted {
            return Ok(Secret::new(config.bot_token.clone()));
        }

        // The blob, not the config flag, says whether a PIN is needed.
        let pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        if pin.is_none() && requires_pin(&config.bot_token)? {
            return Err(Error::PinRequired);
        }
        let opened = open_token(
            &config.bot_token,
            pin.as_ref().map(|p| p.expose_secret().as_str()),
        )?;
        Ok(Secret::new(opened.as_str().to_owned()))
    }

    pub fn set_pin(&self, pin: Secret<String>) {
        *self.pin.lock().unwrap_or_else(|e| e.into_inner()) = Some(pin);
    }

    /// Drop the cached PIN, e.g. after it failed to open the token.
    pub fn forget_pin(&self) {
        *self.pin.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    #[must_use]
    pub fn has_pin(&self) -> bool {
        self.pin.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Record a prompt attempt. Only the first call in a process returns `true`.
    pub fn begin_prompt(&self) -> bool {
        !self.prompted.swap(true, Ordering::AcqRel)
    }

    /// Refuse every further token request until [`Self::clear_denial`].
    pub fn deny(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "bot token access denied");
        *self.denied.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason);
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.denial().is_some()
    }

    /// Forget an earlier denial and allow one more prompt. Called when the
    /// token or PIN settings change.
    pub fn clear_denial(&self) {
        *self.denied.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.prompted.store(false, Ordering::Release);
    }

    fn denial(&self) -> Option<String> {
        self.denied.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn cached_pin(&self) -> Option<Secret<String>> {
        self.pin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|p| Secret::new(p.expose_secret().clone()))
    }

    /// Seal a plaintext token in place. One-way: an encrypted token is never
    /// written back as plaintext. Returns whether `config` changed.
    ///
    /// In PIN mode without a cached PIN the token is sealed without one, which
    /// [`Self::change_pin`] upgrades later.
    pub fn encrypt_if_needed(&self, config: &mut SyncConfig) -> Result<bool> {
        if config.bot_token_encrypted || !config.has_bot_token() {
            return Ok(false);
        }
        let pin = self
            .cached_pin()
            .filter(|_| config.encryption_by_pin_code);
        config.bot_token = self.sealer.seal(
            config.bot_token.trim(),
            pin.as_ref().map(|p| p.expose_secret().as_str()),
        )?;
        config.bot_token_encrypted = true;
        info!(with_pin = pin.is_some(), "bot token encrypted");
        Ok(true)
    }

    /// Replace the token with `plaintext`, sealed immediately.
    ///
    /// Refused while access is denied: the cached PIN, if any, is not trusted.
    pub fn set_token(&self, config: &mut SyncConfig, plaintext: &Secret<String>) -> Result<()> {
        if let Some(reason) = self.denial() {
            return Err(Error::AccessDenied { reason });
        }
        let pin = if config.encryption_by_pin_code {
            Some(self.cached_pin().ok_or(Error::PinRequired)?)
        } else {
            None
        };
        config.bot_token = self.sealer.seal(
            plaintext.expose_secret().trim(),
            pin.as_ref().map(|p| p.expose_secret().as_str()),
        )?;
        config.bot_token_encrypted = true;
        self.clear_denial();
        debug!("bot token replaced");
        Ok(())
    }

    /// Re-seal the token under `new_pin`, or without a PIN when `None`.
    /// The current token must be openable with the cached PIN.
    pub fn change_pin(&self, config: &mut SyncConfig, new_pin: Option<Secret<String>>) -> Result<()> {
        self.clear_denial();
        let token = self.get_token(config)?;
        config.bot_token = self.sealer.seal(
            token.expose_secret(),
            new_pin.as_ref().map(|p| p.expose_secret().as_str()),
        )?;
        config.bot_token_encrypted = true;
        config.encryption_by_pin_code = new_pin.is_some();
        *self.pin.lock().unwrap_or_else(|e| e.into_inner()) = new_pin;
        info!(
            with_pin = config.encryption_by_pin_code,
            "bot token pin changed"
        );
        Ok(())
    }
}
