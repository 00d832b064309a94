//! Bot session connector backed by the Telegram Bot API.

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    teloxide::{prelude::*, types::Me},
    tgsync_common::{BotIdentity, ConnectionStatus, SessionKind},
    tgsync_runtime::{SessionConnector, SessionDescriptor, SyncContext},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    bot,
    config::BotConnectorConfig,
    error::{Error, Result},
    handler::UpdateHandler,
};

struct ActiveBot {
    bot: Bot,
    cancel: CancellationToken,
}

pub struct TelegramBotConnector {
    config: BotConnectorConfig,
    api_url: Option<reqwest::Url>,
    handler: Arc<dyn UpdateHandler>,
    active: Mutex<Option<ActiveBot>>,
    identity: Mutex<Option<BotIdentity>>,
}

impl TelegramBotConnector {
    pub fn new(config: BotConnectorConfig, handler: Arc<dyn UpdateHandler>) -> Result<Self> {
        let api_url = config
            .api_url
            .as_deref()
            .map(reqwest::Url::parse)
            .transpose()
            .map_err(|e| Error::external("invalid bot api url", e))?;
        Ok(Self {
            config,
            api_url,
            handler,
            active: Mutex::new(None),
            identity: Mutex::new(None),
        })
    }

    fn build_bot(&self, token: &str) -> Result<Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(self.config.request_timeout())
            .build()?;
        let bot = Bot::with_client(token, client);
        Ok(match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        })
    }

    fn stop_polling(&self) -> bool {
        let previous = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        match previous {
            Some(active) => {
                active.cancel.cancel();
                true
            },
            None => false,
        }
    }

    fn remember(&self, me: &Me) -> BotIdentity {
        let identity = BotIdentity {
            id: me.user.id.0,
            username: me.user.username.clone(),
            first_name: me.user.first_name.clone(),
        };
        *self.identity.lock().unwrap_or_else(|e| e.into_inner()) = Some(identity.clone());
        identity
    }

    /// Verify the token and clear any webhook so long polling works.
    async fn handshake(&self, bot: &Bot) -> Result<BotIdentity> {
        let me = bot.get_me().await?;
        bot.delete_webhook().send().await?;
        Ok(self.remember(&me))
    }
}

#[async_trait]
impl SessionConnector for TelegramBotConnector {
    fn kind(&self) -> SessionKind {
        SessionKind::Bot
    }

    async fn connect(
        &self,
        ctx: &SyncContext,
        session: &Arc<SessionDescriptor>,
    ) -> tgsync_runtime::Result<ConnectionStatus> {
        if self.stop_polling() {
            debug!("replacing previous bot polling loop");
        }

        let token = match ctx.bot_token().await {
            Ok(token) => token,
            Err(e) if e.is_access_denied() => {
                debug!(error = %e, "bot token unavailable, bot stays disconnected");
                return Ok(ConnectionStatus::Disconnected);
            },
            Err(e) => return Err(e),
        };
        let bot = self.build_bot(token.expose_secret())?;

        let identity = match self.handshake(&bot).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "telegram bot connection failed");
                session.report(ConnectionStatus::Disconnected, Some(&e.to_string()));
                return Ok(ConnectionStatus::Disconnected);
            },
        };
        if session.is_retired() {
            debug!("runtime stopped while connecting, dropping bot session");
            return Ok(ConnectionStatus::Disconnected);
        }

        let cancel = CancellationToken::new();
        tokio::spawn(bot::poll_updates(
            bot.clone(),
            Arc::clone(session),
            Arc::clone(&self.handler),
            self.config.clone(),
            cancel.clone(),
        ));
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(ActiveBot { bot, cancel });

        info!(bot = %identity.display_name(), "telegram bot connected (webhook cleared)");
        session.report(ConnectionStatus::Connected, None);
        Ok(ConnectionStatus::Connected)
    }

    async fn disconnect(&self, session: &SessionDescriptor) {
        if self.stop_polling() {
            info!("telegram bot disconnected");
        }
        session.report(ConnectionStatus::Disconnected, None);
    }

    fn identity(&self) -> Option<BotIdentity> {
        self.identity.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn probe(&self) -> tgsync_runtime::Result<BotIdentity> {
        let bot = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|active| active.bot.clone())
            .ok_or(tgsync_runtime::Error::BotIdentityUnavailable)?;
        let me = bot.get_me().await.map_err(Error::from)?;
        Ok(self.remember(&me))
    }
}
