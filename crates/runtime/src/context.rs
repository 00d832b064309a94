//! Shared state handed to every runtime component.

use std::sync::{Arc, RwLock};

use {secrecy::Secret, tracing::info};

use tgsync_config::SyncConfig;

use crate::{
    device::DeviceIdentity,
    error::{Error, Result},
    notify::{CHECK_CONNECTION_HINT, NoopIndicator, Notice, Notifier, StatusIndicator, TracingNotifier},
    token::{BotTokenAccess, NoPinPrompt, PinPrompt},
};

const NO_PIN_REASON: &str = "no pin code entered";
const WRONG_PIN_REASON: &str = "incorrect pin code";

/// Configuration, device identity and the host-facing collaborators.
pub struct SyncContext {
    config: RwLock<SyncConfig>,
    device: DeviceIdentity,
    token: BotTokenAccess,
    pin_prompt: Arc<dyn PinPrompt>,
    notifier: Arc<dyn Notifier>,
    indicator: Arc<dyn StatusIndicator>,
}

impl SyncContext {
    pub fn new(config: SyncConfig, device: DeviceIdentity) -> Self {
        Self {
            config: RwLock::new(config),
            device,
            token: BotTokenAccess::default(),
            pin_prompt: Arc::new(NoPinPrompt),
            notifier: Arc::new(TracingNotifier),
            indicator: Arc::new(NoopIndicator),
        }
    }

    #[must_use]
    pub fn with_token_access(mut self, token: BotTokenAccess) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_pin_prompt(mut self, prompt: Arc<dyn PinPrompt>) -> Self {
        self.pin_prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, indicator: Arc<dyn StatusIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> SyncConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn replace_config(&self, config: SyncConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    #[must_use]
    pub fn token_access(&self) -> &BotTokenAccess {
        &self.token
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    #[must_use]
    pub fn indicator(&self) -> &Arc<dyn StatusIndicator> {
        &self.indicator
    }

    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Whether the configuration pins the runtime to another device.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.device.is_blocked_by(&self.config())
    }

    /// A bot session is possible: a token is configured and access to it has
    /// not been denied in this process.
    #[must_use]
    pub fn bot_enabled(&self) -> bool {
        self.config().has_bot_token() && !self.token.is_denied()
    }

    #[must_use]
    pub fn user_enabled(&self) -> bool {
        self.config().user_session_enabled()
    }

    /// The usable bot token, prompting for the PIN at most once per process.
    ///
    /// A cancelled prompt or a wrong PIN denies access until the token
    /// settings change.
    pub async fn bot_token(&self) -> Result<Secret<String>> {
        let config = self.config();
        match self.token.get_token(&config) {
            Err(Error::PinRequired) => {},
            Err(Error::WrongPin) => return Err(self.deny_wrong_pin()),
            other => return other,
        }

        if !self.token.begin_prompt() {
            return Err(self.deny(NO_PIN_REASON));
        }
        match self.pin_prompt.prompt_pin().await {
            Some(pin) => self.token.set_pin(pin),
            None => return Err(self.deny(NO_PIN_REASON)),
        }
        match self.token.get_token(&config) {
            Err(Error::WrongPin) => Err(self.deny_wrong_pin()),
            other => other,
        }
    }

    fn deny(&self, reason: &str) -> Error {
        self.token.deny(reason);
        self.notify(Notice::info(format!("Sync stopped. {}", capitalize(reason))));
        Error::access_denied(reason)
    }

    fn deny_wrong_pin(&self) -> Error {
        self.token.forget_pin();
        self.token.deny(WRONG_PIN_REASON);
        info!("bot token pin rejected");
        self.notify(Notice::error(
            "Sync stopped. The bot token could not be opened with this pin code",
            Some(CHECK_CONNECTION_HINT),
        ));
        Error::access_denied(WRONG_PIN_REASON)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{RecordingNotifier, ScriptedPinPrompt, fast_token_access},
        secrecy::ExposeSecret,
    };

    fn pin_sealed_context(
        answers: Vec<Option<&str>>,
    ) -> (SyncContext, Arc<ScriptedPinPrompt>, Arc<RecordingNotifier>) {
        let access = fast_token_access();
        let mut cfg = SyncConfig {
            bot_token: "123:ABC".into(),
            encryption_by_pin_code: true,
            ..Default::default()
        };
        access.set_pin(Secret::new("4321".into()));
        access.encrypt_if_needed(&mut cfg).unwrap();

        let prompt = Arc::new(ScriptedPinPrompt::new(answers));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = SyncContext::new(cfg, DeviceIdentity::new("device-A"))
            .with_token_access(fast_token_access())
            .with_pin_prompt(Arc::clone(&prompt) as Arc<dyn PinPrompt>)
            .with_notifier(Arc::clone(&notifier) as Arc<dyn Notifier>);
        (ctx, prompt, notifier)
    }

    #[tokio::test]
    async fn prompts_once_and_caches_pin() {
        let (ctx, prompt, _) = pin_sealed_context(vec![Some("4321")]);
        assert_eq!(ctx.bot_token().await.unwrap().expose_secret(), "123:ABC");
        assert_eq!(ctx.bot_token().await.unwrap().expose_secret(), "123:ABC");
        assert_eq!(prompt.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_prompt_denies_access() {
        let (ctx, prompt, notifier) = pin_sealed_context(vec![None]);
        let err = ctx.bot_token().await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert!(!ctx.bot_enabled());
        assert_eq!(
            notifier.notices()[0].message,
            "Sync stopped. No pin code entered"
        );

        assert!(ctx.bot_token().await.is_err());
        assert_eq!(prompt.calls(), 1);
    }

    #[tokio::test]
    async fn wrong_pin_denies_access() {
        let (ctx, prompt, notifier) = pin_sealed_context(vec![Some("0000")]);
        assert!(ctx.bot_token().await.unwrap_err().is_access_denied());
        assert!(!ctx.bot_enabled());
        assert_eq!(prompt.calls(), 1);
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn rejected_pin_is_not_reused_after_settings_change() {
        let (ctx, prompt, _) = pin_sealed_context(vec![Some("0000"), Some("4321")]);
        assert!(ctx.bot_token().await.is_err());
        assert!(!ctx.token_access().has_pin());

        // A new token is not sealed under the rejected pin.
        let mut cfg = ctx.config();
        assert!(
            ctx.token_access()
                .set_token(&mut cfg, &Secret::new("999:XYZ".into()))
                .is_err()
        );

        ctx.token_access().clear_denial();
        assert_eq!(ctx.bot_token().await.unwrap().expose_secret(), "123:ABC");
        assert_eq!(prompt.calls(), 2);

        ctx.token_access()
            .set_token(&mut cfg, &Secret::new("999:XYZ".into()))
            .unwrap();
        assert!(tgsync_vault::open_token(&cfg.bot_token, Some("0000")).is_err());
        assert_eq!(
            tgsync_vault::open_token(&cfg.bot_token, Some("4321"))
                .unwrap()
                .as_str(),
            "999:XYZ"
        );
    }

    #[tokio::test]
    async fn pin_flag_without_pin_sealed_token_skips_prompt() {
        let access = fast_token_access();
        let mut cfg = SyncConfig {
            bot_token: "123:ABC".into(),
            encryption_by_pin_code: true,
            ..Default::default()
        };
        access.encrypt_if_needed(&mut cfg).unwrap();

        let prompt = Arc::new(ScriptedPinPrompt::new(vec![]));
        let ctx = SyncContext::new(cfg, DeviceIdentity::new("device-A"))
            .with_token_access(fast_token_access())
            .with_pin_prompt(Arc::clone(&prompt) as Arc<dyn PinPrompt>);
        assert_eq!(ctx.bot_token().await.unwrap().expose_secret(), "123:ABC");
        assert_eq!(prompt.calls(), 0);
    }

    #[tokio::test]
    async fn plaintext_token_needs_no_prompt() {
        let prompt = Arc::new(ScriptedPinPrompt::new(vec![]));
        let ctx = SyncContext::new(
            SyncConfig {
                bot_token: "123:ABC".into(),
                ..Default::default()
            },
            DeviceIdentity::new("device-A"),
        )
        .with_pin_prompt(Arc::clone(&prompt) as Arc<dyn PinPrompt>);
        assert!(ctx.bot_token().await.is_ok());
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn blocked_follows_config() {
        let ctx = SyncContext::new(SyncConfig::default(), DeviceIdentity::new("device-B"));
        assert!(!ctx.is_blocked());
        let mut cfg = ctx.config();
        cfg.main_device_id = Some("device-A".into());
        ctx.replace_config(cfg);
        assert!(ctx.is_blocked());
    }
}
