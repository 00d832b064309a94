//! Serial task queue.
//!
//! Every externally-triggered action (startup, timer tick, settings change)
//! is submitted here. A single worker runs tasks to completion in submission
//! order, so no two tasks ever overlap. Failures and panics are logged at this
//! boundary and never stop the worker.

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use {
    futures::{FutureExt, future::BoxFuture},
    tokio::sync::{mpsc, oneshot},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error},
};

use crate::error::{Error, Result};

struct Job {
    label: &'static str,
    task: BoxFuture<'static, Result<()>>,
    done: oneshot::Sender<Result<()>>,
}

/// Handle to the queue worker. Cheap to clone; all clones feed one worker.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Job>,
    closed: CancellationToken,
}

impl TaskQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        tokio::spawn(run_worker(rx, closed.clone()));
        Self { tx, closed }
    }

    /// Submit `task`. It starts after every previously submitted task has
    /// finished. The returned handle may be dropped; the task still runs.
    pub fn enqueue<F>(&self, label: &'static str, task: F) -> TaskHandle
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        if self.closed.is_cancelled() {
            let _ = done.send(Err(Error::QueueClosed));
        } else if let Err(mpsc::error::SendError(job)) = self.tx.send(Job {
            label,
            task: task.boxed(),
            done,
        }) {
            let _ = job.done.send(Err(Error::QueueClosed));
        }
        TaskHandle { rx }
    }

    /// Refuse new tasks and drop the ones still waiting. The task currently
    /// running is allowed to finish.
    pub fn close(&self) {
        self.closed.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Completion of one queued task.
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl TaskHandle {
    /// Wait for the task to finish and return its result.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(Error::QueueClosed))
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>, closed: CancellationToken) {
    while let Some(job) = rx.recv().await {
        if closed.is_cancelled() {
            debug!(task = job.label, "queue closed, dropping task");
            let _ = job.done.send(Err(Error::QueueClosed));
            continue;
        }

        debug!(task = job.label, "running queued task");
        let result = match AssertUnwindSafe(job.task).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(Error::TaskPanicked {
                task: job.label,
                message: panic_message(panic.as_ref()),
            }),
        };
        if let Err(e) = &result {
            error!(task = job.label, error = %e, "queued task failed");
        }
        let _ = job.done.send(result);
    }
    debug!("task queue worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use {super::*, tokio::sync::Notify};

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Start(usize),
        End(usize),
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_run_serially_in_submission_order() {
        let queue = TaskQueue::spawn();
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let events = Arc::clone(&events);
            // Earlier tasks sleep longer, so any overlap would reorder ends.
            let delay = Duration::from_millis(50 * (5 - i as u64));
            handles.push(queue.enqueue("test", async move {
                events.lock().unwrap().push(Event::Start(i));
                tokio::time::sleep(delay).await;
                events.lock().unwrap().push(Event::End(i));
                Ok(())
            }));
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        let expected: Vec<Event> = (0..5)
            .flat_map(|i| [Event::Start(i), Event::End(i)])
            .collect();
        assert_eq!(*events.lock().unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submitters_never_overlap() {
        let queue = TaskQueue::spawn();
        let running = Arc::new(Mutex::new(0usize));
        let max_seen = Arc::new(Mutex::new(0usize));

        let mut submitters = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            submitters.push(tokio::spawn(async move {
                queue
                    .enqueue("test", async move {
                        {
                            let mut r = running.lock().unwrap();
                            *r += 1;
                            let mut m = max_seen.lock().unwrap();
                            *m = (*m).max(*r);
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        *running.lock().unwrap() -= 1;
                        Ok(())
                    })
                    .wait()
                    .await
            }));
        }
        for s in submitters {
            s.await.unwrap().unwrap();
        }
        assert_eq!(*max_seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_task_does_not_block_the_queue() {
        let queue = TaskQueue::spawn();
        let failed = queue.enqueue("fails", async { Err(Error::message("boom")) });
        let next = queue.enqueue("next", async { Ok(()) });

        assert!(matches!(failed.wait().await, Err(Error::Message { .. })));
        assert!(next.wait().await.is_ok());
    }

    #[tokio::test]
    async fn panicking_task_does_not_poison_the_queue() {
        let queue = TaskQueue::spawn();
        fn explode() -> Result<()> {
            panic!("kaboom")
        }
        let panicked = queue.enqueue("panics", async { explode() });
        let next = queue.enqueue("next", async { Ok(()) });

        match panicked.wait().await {
            Err(Error::TaskPanicked { task, message }) => {
                assert_eq!(task, "panics");
                assert_eq!(message, "kaboom");
            },
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(next.wait().await.is_ok());
    }

    #[tokio::test]
    async fn close_drops_waiting_tasks_but_finishes_running_one() {
        let queue = TaskQueue::spawn();
        let release = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let running = {
            let release = Arc::clone(&release);
            let started = Arc::clone(&started);
            queue.enqueue("running", async move {
                started.notify_one();
                release.notified().await;
                Ok(())
            })
        };
        started.notified().await;
        let waiting = queue.enqueue("waiting", async { Ok(()) });

        queue.close();
        release.notify_one();

        assert!(running.wait().await.is_ok());
        assert!(matches!(waiting.wait().await, Err(Error::QueueClosed)));
        assert!(matches!(
            queue.enqueue("late", async { Ok(()) }).wait().await,
            Err(Error::QueueClosed)
        ));
    }
}
