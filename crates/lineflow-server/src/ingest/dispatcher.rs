//! Single-flight dispatcher
//!
//! Owns the process-wide `busy` flag. `run()` drains the PENDING queue one
//! job at a time and returns immediately if another drain is already in
//! progress; callers never queue up behind it.
//!
//! A background loop started with [`Dispatcher::spawn`] calls `run()` when
//! woken by [`Dispatcher::notify_job_created`] and on a fixed poll interval,
//! so jobs created while a drain is finishing are not stranded.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::worker::{IngestionWorker, RunOutcome};

/// Default period of the background poll
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another drain held the flag; nothing was done
    AlreadyRunning,
    /// Ran until no PENDING job was left
    Drained { jobs_processed: usize },
    /// The worker could not talk to the job store; the chain stopped early
    Halted { jobs_processed: usize, error: String },
    /// Shutdown was requested; remaining PENDING jobs were left untouched
    Stopped { jobs_processed: usize },
}

struct Inner {
    worker: IngestionWorker,
    busy: AtomicBool,
    wake: Notify,
    poll_interval: Duration,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// Clears the busy flag on every exit path, unwinding included
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dispatcher {
    pub fn new(worker: IngestionWorker, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                worker,
                busy: AtomicBool::new(false),
                wake: Notify::new(),
                poll_interval,
            }),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Drain PENDING jobs unless a drain is already running
    pub async fn run(&self) -> DispatchOutcome {
        self.run_until(&CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops before claiming the next job once
    /// `shutdown` is cancelled. A job already claimed runs to completion.
    pub async fn run_until(&self, shutdown: &CancellationToken) -> DispatchOutcome {
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Dispatcher busy, skipping run");
            return DispatchOutcome::AlreadyRunning;
        }
        let _guard = BusyGuard(&self.inner.busy);

        let mut jobs_processed = 0;
        loop {
            if shutdown.is_cancelled() {
                info!(jobs_processed, "Shutdown requested, leaving remaining jobs PENDING");
                return DispatchOutcome::Stopped { jobs_processed };
            }

            match self.inner.worker.run_once().await {
                Ok(RunOutcome::Idle) => {
                    if jobs_processed > 0 {
                        info!(jobs_processed, "Job queue drained");
                    }
                    return DispatchOutcome::Drained { jobs_processed };
                }
                Ok(outcome) => {
                    jobs_processed += 1;
                    debug!(?outcome, "Worker run finished");
                }
                Err(e) => {
                    error!(error = %e, jobs_processed, "Dispatcher halted");
                    return DispatchOutcome::Halted {
                        jobs_processed,
                        error: e.to_string(),
                    };
                }
            }
        }
    }

    /// Wake the background loop; called right after a job is persisted
    pub fn notify_job_created(&self) {
        self.inner.wake.notify_one();
    }

    /// Start the background loop.
    ///
    /// The first poll fires immediately, picking up jobs left PENDING by a
    /// previous process. Cancelling `shutdown` stops the loop between jobs,
    /// even in the middle of a drain; a job already in flight is finished
    /// first.
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let dispatcher = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(dispatcher.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                poll_interval_secs = dispatcher.inner.poll_interval.as_secs(),
                "Ingestion dispatcher started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = dispatcher.inner.wake.notified() => debug!("Dispatcher woken"),
                    _ = ticker.tick() => {}
                }

                dispatcher.run_catching_panics(&shutdown).await;
            }

            info!("Ingestion dispatcher stopped");
        })
    }

    async fn run_catching_panics(&self, shutdown: &CancellationToken) {
        match AssertUnwindSafe(self.run_until(shutdown)).catch_unwind().await {
            Ok(DispatchOutcome::Halted { error, .. }) => {
                warn!(error = %error, "Dispatch halted, retrying on next trigger");
            }
            Ok(_) => {}
            Err(_) => error!("Dispatcher run panicked"),
        }
    }
}
