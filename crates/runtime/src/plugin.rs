//! Lifecycle of the whole sync runtime.
//!
//! [`TelegramSyncBuilder::load`] brings the runtime up; [`TelegramSync::unload`]
//! tears it down. Everything in between goes through the serial queue.

use std::sync::{Arc, Mutex};

use {
    secrecy::Secret,
    tgsync_common::{BotIdentity, ConnectionStatus, PluginStatus, SessionFilter, SessionKind},
    tracing::{debug, info},
};

use {
    tgsync_config::{ConfigStore, SyncConfig, upgrade},
    tgsync_vault::TokenSealer,
};

use crate::{
    context::SyncContext,
    device::DeviceIdentity,
    error::{Error, Result},
    notify::{NoopIndicator, Notifier, StatusIndicator, TracingNotifier},
    queue::{TaskHandle, TaskQueue},
    session::{Connectors, SessionConnector},
    supervisor::{Supervisor, SupervisorOptions},
    sweeper::{Distributor, NoopDistributor},
    token::{BotTokenAccess, NoPinPrompt, PinPrompt},
};

pub struct TelegramSyncBuilder {
    store: Arc<dyn ConfigStore>,
    device: DeviceIdentity,
    connectors: Connectors,
    distributor: Arc<dyn Distributor>,
    notifier: Arc<dyn Notifier>,
    indicator: Arc<dyn StatusIndicator>,
    pin_prompt: Arc<dyn PinPrompt>,
    sealer: TokenSealer,
    options: SupervisorOptions,
}

impl TelegramSyncBuilder {
    pub fn new(store: Arc<dyn ConfigStore>, device: DeviceIdentity) -> Self {
        Self {
            store,
            device,
            connectors: Connectors::default(),
            distributor: Arc::new(NoopDistributor),
            notifier: Arc::new(TracingNotifier),
            indicator: Arc::new(NoopIndicator),
            pin_prompt: Arc::new(NoPinPrompt),
            sealer: TokenSealer::default(),
            options: SupervisorOptions::default(),
        }
    }

    #[must_use]
    pub fn bot_connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connectors.bot = Some(connector);
        self
    }

    #[must_use]
    pub fn user_connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connectors.user = Some(connector);
        self
    }

    #[must_use]
    pub fn distributor(mut self, distributor: Arc<dyn Distributor>) -> Self {
        self.distributor = distributor;
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn indicator(mut self, indicator: Arc<dyn StatusIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    #[must_use]
    pub fn pin_prompt(mut self, prompt: Arc<dyn PinPrompt>) -> Self {
        self.pin_prompt = prompt;
        self
    }

    #[must_use]
    pub fn sealer(mut self, sealer: TokenSealer) -> Self {
        self.sealer = sealer;
        self
    }

    #[must_use]
    pub fn options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    /// Load and upgrade the settings, seal a plaintext token, and schedule
    /// the first initialization.
    pub async fn load(self) -> Result<TelegramSync> {
        info!(status = %PluginStatus::Loading, "telegram sync");
        let mut config = self.store.load().await.map_err(Error::Config)?;

        let token = BotTokenAccess::new(self.sealer);
        let report = upgrade(&mut config);
        let sealed = token.encrypt_if_needed(&mut config)?;
        if report.changed() || sealed {
            self.store.save(&config).await.map_err(Error::Config)?;
            debug!(?report, sealed, "upgraded settings saved");
        }

        let ctx = Arc::new(
            SyncContext::new(config, self.device)
                .with_token_access(token)
                .with_pin_prompt(self.pin_prompt)
                .with_notifier(self.notifier)
                .with_indicator(self.indicator),
        );
        let queue = TaskQueue::spawn();
        let supervisor = Supervisor::new(
            ctx,
            queue.clone(),
            self.connectors,
            self.distributor,
            self.options,
        );
        if report.cache_cleanup_requested {
            supervisor.clear_session_caches().await;
        }

        let sync = TelegramSync {
            status: Mutex::new(PluginStatus::Loading),
            store: self.store,
            queue,
            supervisor,
        };
        let _ = sync.initialize(SessionFilter::All);
        sync.set_status(PluginStatus::Loaded);
        Ok(sync)
    }
}

pub struct TelegramSync {
    status: Mutex<PluginStatus>,
    store: Arc<dyn ConfigStore>,
    queue: TaskQueue,
    supervisor: Arc<Supervisor>,
}

impl TelegramSync {
    pub fn builder(store: Arc<dyn ConfigStore>, device: DeviceIdentity) -> TelegramSyncBuilder {
        TelegramSyncBuilder::new(store, device)
    }

    #[must_use]
    pub fn status(&self) -> PluginStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: PluginStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
        info!(%status, "telegram sync");
    }

    #[must_use]
    pub fn context(&self) -> &Arc<SyncContext> {
        self.supervisor.context()
    }

    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Stop everything. Tasks still waiting on the queue are dropped; the one
    /// running finishes, but its status reports are discarded.
    pub async fn unload(&self) {
        self.set_status(PluginStatus::Unloading);
        self.context().indicator().destroy();
        self.shutdown().await;
        self.set_status(PluginStatus::Unloaded);
    }

    /// Close the queue, then stop timers and disconnect the sessions.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.queue.close();
        self.supervisor.shutdown().await;
    }

    /// Schedule a connect pass for the kinds in `filter`.
    pub fn initialize(&self, filter: SessionFilter) -> TaskHandle {
        let supervisor = Arc::clone(&self.supervisor);
        self.queue.enqueue("initialize", async move {
            supervisor.initialize(filter).await;
            Ok(())
        })
    }

    /// Schedule a restart tick for the kinds in `filter`, as a user-triggered
    /// reconnect.
    pub fn reconnect(&self, filter: SessionFilter) -> TaskHandle {
        let supervisor = Arc::clone(&self.supervisor);
        self.queue.enqueue("reconnect", async move {
            supervisor.restart(filter).await;
            Ok(())
        })
    }

    /// The usable bot token, prompting for the PIN if needed.
    pub async fn get_token(&self) -> Result<Secret<String>> {
        self.context().bot_token().await
    }

    pub async fn get_bot_identity(&self) -> Result<BotIdentity> {
        self.supervisor.bot_identity().await
    }

    #[must_use]
    pub fn is_bot_connected(&self) -> bool {
        self.supervisor.session(SessionKind::Bot).is_connected()
    }

    #[must_use]
    pub fn is_user_connected(&self) -> bool {
        self.supervisor.session(SessionKind::User).is_connected()
    }

    /// Status change observed outside the connectors.
    pub fn on_status_change(&self, kind: SessionKind, status: ConnectionStatus, error: Option<&str>) {
        self.supervisor.session(kind).report(status, error);
    }

    /// Apply `edit` to the settings, save them, and reinitialize the sessions.
    pub fn update_config<F>(&self, edit: F) -> TaskHandle
    where
        F: FnOnce(&mut SyncConfig) + Send + 'static,
    {
        let supervisor = Arc::clone(&self.supervisor);
        let store = Arc::clone(&self.store);
        self.queue.enqueue("update-config", async move {
            let ctx = supervisor.context();
            let before = ctx.config();
            let mut config = before.clone();
            edit(&mut config);
            if token_settings_changed(&before, &config) {
                ctx.token_access().clear_denial();
                ctx.token_access().encrypt_if_needed(&mut config)?;
            }
            store.save(&config).await.map_err(Error::Config)?;
            ctx.replace_config(config);
            supervisor.reinitialize().await;
            Ok(())
        })
    }

    /// Replace the bot token; it is sealed before it is saved.
    pub fn set_bot_token(&self, token: Secret<String>) -> TaskHandle {
        let supervisor = Arc::clone(&self.supervisor);
        let store = Arc::clone(&self.store);
        self.queue.enqueue("set-bot-token", async move {
            let ctx = supervisor.context();
            let mut config = ctx.config();
            ctx.token_access().set_token(&mut config, &token)?;
            store.save(&config).await.map_err(Error::Config)?;
            ctx.replace_config(config);
            supervisor.reinitialize().await;
            Ok(())
        })
    }

    /// Re-seal the bot token under `pin`, or without a PIN when `None`.
    pub fn change_pin(&self, pin: Option<Secret<String>>) -> TaskHandle {
        let supervisor = Arc::clone(&self.supervisor);
        let store = Arc::clone(&self.store);
        self.queue.enqueue("change-pin", async move {
            let ctx = supervisor.context();
            let mut config = ctx.config();
            ctx.token_access().change_pin(&mut config, pin)?;
            store.save(&config).await.map_err(Error::Config)?;
            ctx.replace_config(config);
            Ok(())
        })
    }
}

fn token_settings_changed(before: &SyncConfig, after: &SyncConfig) -> bool {
    before.bot_token != after.bot_token
        || before.bot_token_encrypted != after.bot_token_encrypted
        || before.encryption_by_pin_code != after.encryption_by_pin_code
}
