//! Recurring timers that only ever enqueue work onto the [`TaskQueue`].
//!
//! A tick never touches runtime state itself; it submits a task and the queue
//! decides when it runs. If the previous tick's task has not run yet, the new
//! tick is coalesced into it.

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    tokio::time::{Instant, MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace},
};

use crate::{error::Result, queue::TaskQueue};

/// Running timer. Dropping it stops it.
pub struct RecurringTimer {
    label: &'static str,
    period: Duration,
    cancel: CancellationToken,
}

impl RecurringTimer {
    /// Start a timer whose first tick fires one `period` from now.
    pub fn start<F, Fut>(
        queue: &TaskQueue,
        label: &'static str,
        period: Duration,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let queue = queue.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let pending = Arc::new(AtomicBool::new(false));

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {},
                }
                if pending.swap(true, Ordering::AcqRel) {
                    trace!(timer = label, "previous tick still queued, coalescing");
                    continue;
                }
                let guard = PendingGuard(Arc::clone(&pending));
                let work = tick();
                let _ = queue.enqueue(label, async move {
                    let _guard = guard;
                    work.await
                });
            }
            debug!(timer = label, "timer stopped");
        });

        debug!(timer = label, period_ms = period.as_millis() as u64, "timer armed");
        Self {
            label,
            period,
            cancel,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for RecurringTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Clears the coalescing flag when the queued task finishes, fails, panics,
/// or is dropped by a closed queue.
struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Holder for at most one armed timer. Arming replaces (and stops) the
/// previous one.
#[derive(Default)]
pub struct TimerSlot {
    timer: Mutex<Option<RecurringTimer>>,
}

impl TimerSlot {
    pub fn arm(&self, timer: RecurringTimer) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(timer);
        drop(previous);
    }

    /// Stop the armed timer. Returns whether one was armed.
    pub fn clear(&self) -> bool {
        let previous = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        previous.is_some()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(RecurringTimer::period)
    }
}
