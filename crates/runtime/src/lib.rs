//! Connection runtime for the Telegram sync.
//!
//! Keeps a bot session and an optional user session alive against the
//! backend: a serial task queue, recurring restart timers with exponential
//! backoff, device pinning, PIN-gated token access, and a daily sweep of
//! messages that arrived while the sync was offline.

pub mod backoff;
pub mod context;
pub mod device;
pub mod error;
pub mod notify;
pub mod plugin;
pub mod queue;
pub mod session;
pub mod supervisor;
pub mod sweeper;
pub mod timer;
pub mod token;

#[cfg(test)]
mod testing;

pub use {
    context::SyncContext,
    device::DeviceIdentity,
    error::{Error, Result},
    notify::{Notice, NoticeLevel, Notifier, StatusIndicator, TracingNotifier},
    plugin::{TelegramSync, TelegramSyncBuilder},
    queue::{TaskHandle, TaskQueue},
    session::{Connectors, SessionConnector, SessionDescriptor},
    supervisor::{Supervisor, SupervisorOptions},
    sweeper::{Distributor, NoopDistributor, SweepOutcome},
    token::{BotTokenAccess, PinPrompt},
};
