//! Daily forwarding of messages that arrived while the sync was offline.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tgsync_common::BotIdentity,
    tracing::{debug, error, info},
};

use crate::{
    context::SyncContext,
    error::Result,
    notify::Notice,
    timer::{RecurringTimer, TimerSlot},
};

pub const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Moves backlog messages into the destination store.
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Forward every unprocessed message. Returns how many were forwarded.
    async fn forward_unprocessed(&self, ctx: &SyncContext) -> Result<usize>;

    /// Forget any cached backlog.
    fn discard_cached_unprocessed(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDistributor;

#[async_trait]
impl Distributor for NoopDistributor {
    async fn forward_unprocessed(&self, _ctx: &SyncContext) -> Result<usize> {
        Ok(0)
    }

    fn discard_cached_unprocessed(&self) {}
}

/// Preconditions for a sweep, read from the sessions at sweep time.
#[derive(Debug, Clone, Default)]
pub struct SweepGate {
    pub user_connected: bool,
    pub bot_identity: Option<BotIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    NotDue,
    /// Old-message processing is off; the cached backlog was discarded.
    Disabled,
    /// Sessions not ready; stays due for a later attempt.
    Deferred,
    Forwarded(usize),
    Failed,
}

pub struct OldMessageSweeper {
    due: AtomicBool,
    timer: TimerSlot,
    period: Duration,
    distributor: Arc<dyn Distributor>,
}

impl OldMessageSweeper {
    pub fn new(distributor: Arc<dyn Distributor>, period: Duration) -> Self {
        Self {
            due: AtomicBool::new(false),
            timer: TimerSlot::default(),
            period,
            distributor,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn mark_due(&self) {
        self.due.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_due(&self) -> bool {
        self.due.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn arm(&self, timer: RecurringTimer) {
        self.timer.arm(timer);
    }

    /// Stop the daily timer and drop any pending sweep.
    pub fn disarm(&self) {
        if self.timer.clear() {
            debug!("old message sweep disarmed");
        }
        self.due.store(false, Ordering::Release);
    }

    /// Run one sweep if one is due.
    pub async fn sweep_once(&self, ctx: &SyncContext, gate: SweepGate) -> SweepOutcome {
        if !self.is_due() {
            return SweepOutcome::NotDue;
        }
        if !ctx.config().process_old_messages {
            self.distributor.discard_cached_unprocessed();
            self.due.store(false, Ordering::Release);
            return SweepOutcome::Disabled;
        }
        let Some(bot) = gate.bot_identity.filter(|_| gate.user_connected) else {
            debug!("sessions not ready, old message sweep deferred");
            return SweepOutcome::Deferred;
        };

        let _clear = ClearDue(&self.due);
        info!(bot = %bot.display_name(), "forwarding old messages");
        match self.distributor.forward_unprocessed(ctx).await {
            Ok(count) => {
                info!(count, "old messages forwarded");
                SweepOutcome::Forwarded(count)
            },
            Err(e) => {
                error!(error = %e, "old message sweep failed");
                ctx.notify(Notice::error(format!("Old messages were not processed: {e}"), None));
                SweepOutcome::Failed
            },
        }
    }
}

/// Clears the due flag however the sweep ends.
struct ClearDue<'a>(&'a AtomicBool);

impl Drop for ClearDue<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
