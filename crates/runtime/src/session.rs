//! Per-kind session state and the connector seam.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    tgsync_common::{BotIdentity, ConnectionStatus, SessionKind},
    tracing::{debug, info, warn},
};

use crate::{
    context::SyncContext,
    error::{Error, Result},
    notify::{CHECK_CONNECTION_HINT, Notice, Notifier, StatusIndicator},
};

/// Connection state of one session kind.
///
/// `checking` is true only while a connection attempt for this kind is in
/// flight. Once retired (on stop or shutdown) late status reports from
/// attempts that were already running are discarded.
pub struct SessionDescriptor {
    kind: SessionKind,
    checking: AtomicBool,
    connected: AtomicBool,
    retired: AtomicBool,
    notifier: Arc<dyn Notifier>,
    indicator: Arc<dyn StatusIndicator>,
}

impl SessionDescriptor {
    pub fn new(
        kind: SessionKind,
        notifier: Arc<dyn Notifier>,
        indicator: Arc<dyn StatusIndicator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            checking: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            notifier,
            indicator,
        })
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        if self.connected.load(Ordering::Acquire) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Claim the in-flight slot. `None` while another attempt holds it.
    pub fn try_begin_check(&self) -> Option<CheckGuard<'_>> {
        self.checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CheckGuard { session: self })
    }

    /// Record a status transition. Unchanged status without an error is a
    /// no-op; errors are always surfaced. Returns `false` when the report was
    /// discarded because the session is retired.
    pub fn report(&self, status: ConnectionStatus, error: Option<&str>) -> bool {
        if self.is_retired() {
            debug!(kind = %self.kind, %status, "discarding status report from retired session");
            return false;
        }

        let previous = self
            .connected
            .swap(status.is_connected(), Ordering::AcqRel);
        if previous == status.is_connected() && error.is_none() {
            return true;
        }

        self.indicator.update(self.kind, status, error);
        let name = match self.kind {
            SessionKind::Bot => "Bot",
            SessionKind::User => "User",
        };
        let notice = match (status, error) {
            (_, Some(err)) => {
                warn!(kind = %self.kind, %status, error = err, "session status changed with error");
                Notice::error(format!("{name} {status}: {err}"), Some(CHECK_CONNECTION_HINT))
            },
            (status, None) => {
                info!(kind = %self.kind, %status, "session status changed");
                Notice::info(format!("{name} {status}"))
            },
        };
        self.notifier.notify(notice);
        true
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn revive(&self) {
        self.retired.store(false, Ordering::Release);
    }
}

/// Holds the in-flight slot of a [`SessionDescriptor`]; released on drop,
/// whatever way the attempt ends.
pub struct CheckGuard<'a> {
    session: &'a SessionDescriptor,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.session.checking.store(false, Ordering::Release);
    }
}

/// Connects one session kind to the backend.
///
/// `connect` reports its outcome through the descriptor (and keeps reporting
/// later drops the same way) and returns the resulting status. Transport
/// failures are reported and returned as `Ok(Disconnected)`; `Err` is kept
/// for failures outside session handling and makes the supervisor back off.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    fn kind(&self) -> SessionKind;

    async fn connect(
        &self,
        ctx: &SyncContext,
        session: &Arc<SessionDescriptor>,
    ) -> Result<ConnectionStatus>;

    async fn disconnect(&self, session: &SessionDescriptor);

    /// Identity fetched by the last successful connect or probe.
    fn identity(&self) -> Option<BotIdentity> {
        None
    }

    /// Ask the backend who we are. Doubles as a liveness check.
    async fn probe(&self) -> Result<BotIdentity> {
        Err(Error::BotIdentityUnavailable)
    }

    /// Drop locally cached session data. Requested once via
    /// `cache_cleanup_at_startup`.
    async fn clear_cache(&self) {}
}

/// The connectors available to this process. A missing connector leaves
/// its kind permanently disabled.
#[derive(Clone, Default)]
pub struct Connectors {
    pub bot: Option<Arc<dyn SessionConnector>>,
    pub user: Option<Arc<dyn SessionConnector>>,
}

impl Connectors {
    #[must_use]
    pub fn get(&self, kind: SessionKind) -> Option<&Arc<dyn SessionConnector>> {
        match kind {
            SessionKind::Bot => self.bot.as_ref(),
            SessionKind::User => self.user.as_ref(),
        }
    }
}
