//! Connection supervisor.
//!
//! Owns the per-kind session descriptors and the restart backoff, and drives
//! both session kinds through `disconnected → checking → {connected |
//! disconnected}`. Every entry point is expected to run on the [`TaskQueue`];
//! the timers armed here only ever enqueue.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    tgsync_common::{BotIdentity, ConnectionStatus, SessionFilter, SessionKind},
    tracing::{debug, info, warn},
};

use crate::{
    backoff::{BASE_INTERVAL, MAX_INTERVAL, RestartBackoff},
    context::SyncContext,
    error::{Error, Result},
    notify::Notice,
    queue::TaskQueue,
    session::{Connectors, SessionDescriptor},
    sweeper::{Distributor, OldMessageSweeper, SWEEP_PERIOD, SweepGate, SweepOutcome},
    timer::{RecurringTimer, TimerSlot},
};

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub sweep_period: Duration,
    /// Probe the bot on restart ticks where nothing needed reconnecting.
    /// Some platforms silently drop long-poll connections on sleep.
    pub probe_idle_bot: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            base_interval: BASE_INTERVAL,
            max_interval: MAX_INTERVAL,
            sweep_period: SWEEP_PERIOD,
            probe_idle_bot: cfg!(target_os = "macos"),
        }
    }
}

/// Result of one connect pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another device is the main device; everything was stopped.
    Blocked,
    /// Number of kinds a connect attempt was issued for.
    Attempted(usize),
}

pub struct Supervisor {
    ctx: Arc<SyncContext>,
    queue: TaskQueue,
    connectors: Connectors,
    user: Arc<SessionDescriptor>,
    bot: Arc<SessionDescriptor>,
    backoff: Mutex<RestartBackoff>,
    restart_timer: TimerSlot,
    sweeper: OldMessageSweeper,
    paused_notice_shown: AtomicBool,
    shut_down: AtomicBool,
    probe_idle_bot: bool,
}

impl Supervisor {
    pub fn new(
        ctx: Arc<SyncContext>,
        queue: TaskQueue,
        connectors: Connectors,
        distributor: Arc<dyn Distributor>,
        options: SupervisorOptions,
    ) -> Arc<Self> {
        let descriptor = |kind| {
            SessionDescriptor::new(
                kind,
                Arc::clone(ctx.notifier()),
                Arc::clone(ctx.indicator()),
            )
        };
        let user = descriptor(SessionKind::User);
        let bot = descriptor(SessionKind::Bot);
        Arc::new(Self {
            queue,
            connectors,
            user,
            bot,
            backoff: Mutex::new(RestartBackoff::new(
                options.base_interval,
                options.max_interval,
            )),
            restart_timer: TimerSlot::default(),
            sweeper: OldMessageSweeper::new(distributor, options.sweep_period),
            paused_notice_shown: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            probe_idle_bot: options.probe_idle_bot,
            ctx,
        })
    }

    #[must_use]
    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    #[must_use]
    pub fn session(&self, kind: SessionKind) -> &Arc<SessionDescriptor> {
        match kind {
            SessionKind::Bot => &self.bot,
            SessionKind::User => &self.user,
        }
    }

    #[must_use]
    pub fn sweeper(&self) -> &OldMessageSweeper {
        &self.sweeper
    }

    /// Current restart interval.
    #[must_use]
    pub fn restart_interval(&self) -> Duration {
        self.lock_backoff().current()
    }

    /// Period of the armed restart timer, if any.
    #[must_use]
    pub fn restart_timer_period(&self) -> Option<Duration> {
        self.restart_timer.period()
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// A connector exists for `kind` and the configuration enables it.
    #[must_use]
    pub fn is_enabled(&self, kind: SessionKind) -> bool {
        self.connectors.get(kind).is_some()
            && match kind {
                SessionKind::Bot => self.ctx.bot_enabled(),
                SessionKind::User => self.ctx.user_enabled(),
            }
    }

    fn lock_backoff(&self) -> MutexGuard<'_, RestartBackoff> {
        self.backoff.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Connect passes ──────────────────────────────────────────────────────

    /// Issue a connect attempt for every kind in `filter` that is enabled,
    /// not connected and not already being checked.
    pub async fn connect_sessions(&self, filter: SessionFilter) -> Result<CycleOutcome> {
        if self.ctx.is_blocked() {
            self.pause_for_device().await;
            return Ok(CycleOutcome::Blocked);
        }
        if self.is_shut_down() {
            return Ok(CycleOutcome::Attempted(0));
        }
        if self.paused_notice_shown.swap(false, Ordering::AcqRel) {
            info!("this device is the main device again, resuming");
        }
        self.user.revive();
        self.bot.revive();

        let mut attempted = 0;
        for kind in filter.kinds() {
            let Some(connector) = self.connectors.get(kind) else {
                continue;
            };
            if !self.is_enabled(kind) {
                continue;
            }
            let session = self.session(kind);
            if session.is_connected() {
                continue;
            }
            let Some(_check) = session.try_begin_check() else {
                debug!(%kind, "connection attempt already in flight");
                continue;
            };

            attempted += 1;
            debug!(%kind, "connecting session");
            let status = connector.connect(&self.ctx, session).await?;
            if session.status() != status {
                session.report(status, None);
            }
            if status.is_connected() {
                self.lock_backoff().reset();
            }
        }
        Ok(CycleOutcome::Attempted(attempted))
    }

    /// Connect the selected kinds and arm the recurring timers that are not
    /// armed yet. The first initialization also runs an old-message sweep.
    pub async fn initialize(self: &Arc<Self>, filter: SessionFilter) {
        info!(?filter, "initializing sessions");
        match self.connect_sessions(filter).await {
            Ok(CycleOutcome::Blocked) => return,
            Ok(CycleOutcome::Attempted(_)) => {},
            Err(e) => {
                let next = self.lock_backoff().double();
                warn!(
                    error = %e,
                    next_interval_secs = next.as_secs(),
                    "session initialization failed, backing off"
                );
                self.arm_restart_timer(next);
            },
        }
        if self.is_shut_down() {
            return;
        }

        if !self.restart_timer.is_armed() {
            let period = self.restart_interval();
            self.arm_restart_timer(period);
        }
        if !self.sweeper.is_armed() {
            self.arm_sweep_timer();
            self.sweeper.mark_due();
            self.sweep_old_messages().await;
        }
    }

    /// One restart tick. Failures outside session handling grow the backoff.
    pub async fn restart(self: &Arc<Self>, filter: SessionFilter) {
        if let Err(e) = self.restart_cycle(filter).await {
            let next = self.lock_backoff().double();
            warn!(
                error = %e,
                next_interval_secs = next.as_secs(),
                "restart failed, backing off"
            );
            self.arm_restart_timer(next);
        }
    }

    async fn restart_cycle(self: &Arc<Self>, filter: SessionFilter) -> Result<()> {
        match self.connect_sessions(filter).await? {
            CycleOutcome::Blocked => {},
            CycleOutcome::Attempted(0) => {
                if filter == SessionFilter::All && self.probe_idle_bot && self.bot.is_connected() {
                    self.probe_bot().await;
                }
            },
            CycleOutcome::Attempted(attempted) => {
                let base = self.lock_backoff().reset();
                debug!(attempted, "sessions restarted");
                self.arm_restart_timer(base);
                // A sweep deferred until the sessions were up runs now.
                if self.sweeper.is_due() {
                    self.sweep_old_messages().await;
                }
            },
        }
        Ok(())
    }

    async fn probe_bot(&self) {
        let Some(connector) = self.connectors.get(SessionKind::Bot) else {
            return;
        };
        match connector.probe().await {
            Ok(identity) => debug!(bot = %identity.display_name(), "bot probe ok"),
            Err(e) => {
                warn!(error = %e, "bot probe failed");
                self.bot
                    .report(ConnectionStatus::Disconnected, Some(&e.to_string()));
            },
        }
    }

    // ── Bot identity ────────────────────────────────────────────────────────

    #[must_use]
    pub fn cached_bot_identity(&self) -> Option<BotIdentity> {
        self.connectors.get(SessionKind::Bot)?.identity()
    }

    /// Identity of the connected bot, asking the backend when none is cached.
    pub async fn bot_identity(&self) -> Result<BotIdentity> {
        let connector = self
            .connectors
            .get(SessionKind::Bot)
            .ok_or(Error::BotIdentityUnavailable)?;
        if let Some(identity) = connector.identity() {
            return Ok(identity);
        }
        connector.probe().await.map_err(|e| {
            warn!(error = %e, "bot identity unavailable");
            Error::BotIdentityUnavailable
        })
    }

    // ── Old messages ────────────────────────────────────────────────────────

    pub async fn sweep_old_messages(&self) -> SweepOutcome {
        let gate = SweepGate {
            user_connected: self.user.is_connected(),
            bot_identity: self
                .bot
                .is_connected()
                .then(|| self.cached_bot_identity())
                .flatten(),
        };
        self.sweeper.sweep_once(&self.ctx, gate).await
    }

    /// Ask every connector to drop its cached session data.
    pub async fn clear_session_caches(&self) {
        for kind in SessionKind::ALL {
            if let Some(connector) = self.connectors.get(kind) {
                connector.clear_cache().await;
            }
        }
        info!("session caches cleared");
    }

    // ── Timers ──────────────────────────────────────────────────────────────

    fn arm_restart_timer(self: &Arc<Self>, period: Duration) {
        if self.is_shut_down() {
            return;
        }
        let this = Arc::downgrade(self);
        let timer = RecurringTimer::start(&self.queue, "restart", period, move || {
            let this = Weak::clone(&this);
            async move {
                if let Some(supervisor) = this.upgrade() {
                    supervisor.restart(SessionFilter::All).await;
                }
                Ok(())
            }
        });
        self.restart_timer.arm(timer);
    }

    fn arm_sweep_timer(self: &Arc<Self>) {
        if self.is_shut_down() {
            return;
        }
        let this = Arc::downgrade(self);
        let period = self.sweeper.period();
        let timer = RecurringTimer::start(&self.queue, "old-messages", period, move || {
            let this = Weak::clone(&this);
            async move {
                if let Some(supervisor) = this.upgrade() {
                    supervisor.sweeper.mark_due();
                    supervisor.sweep_old_messages().await;
                }
                Ok(())
            }
        });
        self.sweeper.arm(timer);
    }

    // ── Stopping ────────────────────────────────────────────────────────────

    async fn pause_for_device(&self) {
        self.stop().await;
        if !self.paused_notice_shown.swap(true, Ordering::AcqRel) {
            let current = self.ctx.device().current();
            info!(device_id = current, "another device is the main device, sync paused");
            self.ctx.notify(Notice::info(format!(
                "Sync is paused on this device. To sync here, set main_device_id to {current}"
            )));
        }
    }

    /// Disconnect both kinds. Reports from attempts still in flight are
    /// discarded afterwards.
    pub async fn disconnect_sessions(&self) {
        self.restart_timer.clear();
        for kind in SessionKind::ALL {
            let session = self.session(kind);
            if let Some(connector) = self.connectors.get(kind) {
                connector.disconnect(session).await;
            }
            session.report(ConnectionStatus::Disconnected, None);
            session.retire();
        }
    }

    /// Stop every timer and disconnect both kinds.
    pub async fn stop(&self) {
        self.sweeper.disarm();
        self.disconnect_sessions().await;
        debug!("supervisor stopped");
    }

    /// Apply a configuration change: drop the sessions and initialize again.
    pub async fn reinitialize(self: &Arc<Self>) {
        self.disconnect_sessions().await;
        self.initialize(SessionFilter::All).await;
    }

    /// Final stop. No timer is armed again afterwards.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop().await;
        info!("supervisor shut down");
    }
}
