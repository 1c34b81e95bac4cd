//! Periodic job scheduler
//!
//! Every job gets its own ticker task. A tick spawns a supervised run unless
//! the previous run of the same job is still in flight, in which case the tick
//! is dropped. Run errors and panics are logged by the supervisor and never
//! reach the ticker, so a failing job keeps its schedule and cannot disturb
//! other jobs.
//!
//! Tickers and runs are spawned on the runtime the scheduler was built for,
//! not on whichever runtime happens to call `schedule`. Control requests are
//! served by worker runtimes that are torn down on shutdown, and runs must
//! outlive them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use syncer_common::{FetchSchedule, Result};

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Unit of periodic work
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Stable key for logging and overlap tracking
    fn key(&self) -> &str;

    fn schedule(&self) -> FetchSchedule;

    async fn execute(&self) -> Result<()>;
}

#[derive(Default)]
struct JobSlot {
    key: String,
    in_flight: AtomicBool,
    current: Mutex<Option<AbortHandle>>,
}

/// Releases the in-flight flag however the run ends
struct InFlightGuard(Arc<JobSlot>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    runtime: Option<Handle>,
    stop_tx: watch::Sender<bool>,
    slots: Mutex<Vec<Arc<JobSlot>>>,
    tickers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Scheduler bound to the caller's runtime, if any
    pub fn new() -> Self {
        Self::with_runtime(Handle::try_current().ok())
    }

    pub fn with_runtime(runtime: Option<Handle>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            runtime,
            stop_tx,
            slots: Mutex::new(Vec::new()),
            tickers: Mutex::new(Vec::new()),
        }
    }

    /// Register a job; fixed periods first fire one period from now
    pub fn schedule(&self, job: Arc<dyn Job>) {
        let slot = Arc::new(JobSlot {
            key: job.key().to_string(),
            ..Default::default()
        });
        let schedule = job.schedule();
        let stop_rx = self.stop_tx.subscribe();
        info!(job = %slot.key, schedule = %schedule, "job scheduled");

        let ticker_slot = slot.clone();
        let ticker = match schedule {
            FetchSchedule::Every(period) => {
                self.spawn(Self::tick_every(period, stop_rx, ticker_slot, job))
            }
            cron @ FetchSchedule::Cron { .. } => {
                self.spawn(Self::tick_cron(cron, stop_rx, ticker_slot, job))
            }
        };
        self.slots.lock().push(slot);
        self.tickers.lock().push(ticker);
    }

    fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.runtime {
            Some(handle) => handle.spawn(future),
            None => tokio::spawn(future),
        }
    }

    async fn tick_every(
        period: Duration,
        mut stop_rx: watch::Receiver<bool>,
        slot: Arc<JobSlot>,
        job: Arc<dyn Job>,
    ) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = interval.tick() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                    Self::dispatch(&slot, &job);
                }
            }
        }
        debug!(job = %slot.key, "ticker stopped");
    }

    async fn tick_cron(
        schedule: FetchSchedule,
        mut stop_rx: watch::Receiver<bool>,
        slot: Arc<JobSlot>,
        job: Arc<dyn Job>,
    ) {
        // the wall clock may lag the timer, never fire the same slot twice
        let mut last_fire: Option<DateTime<Local>> = None;
        loop {
            let now = Local::now();
            let after = last_fire.filter(|last| *last > now).unwrap_or(now);
            let Some(next) = schedule.next_run(&after) else {
                warn!(job = %slot.key, schedule = %schedule, "schedule has no further runs");
                break;
            };
            let delay = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {
                    if *stop_rx.borrow() {
                        break;
                    }
                    last_fire = Some(next);
                    Self::dispatch(&slot, &job);
                }
            }
        }
        debug!(job = %slot.key, "ticker stopped");
    }

    fn dispatch(slot: &Arc<JobSlot>, job: &Arc<dyn Job>) {
        if slot.in_flight.swap(true, Ordering::AcqRel) {
            warn!(job = %slot.key, "previous run still in progress, tick skipped");
            return;
        }

        let guard = InFlightGuard(slot.clone());
        let job = job.clone();
        let run = tokio::spawn(async move {
            let _guard = guard;
            job.execute().await
        });
        *slot.current.lock() = Some(run.abort_handle());

        let key = slot.key.clone();
        tokio::spawn(async move {
            match run.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(job = %key, error = %e, "run aborted"),
                Err(e) if e.is_panic() => error!(job = %key, "run panicked"),
                Err(_) => warn!(job = %key, "run cancelled"),
            }
        });
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a run of `key` is currently executing
    pub fn is_running(&self, key: &str) -> bool {
        self.slots
            .lock()
            .iter()
            .any(|s| s.key == key && s.in_flight.load(Ordering::Acquire))
    }

    fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|s| s.in_flight.load(Ordering::Acquire))
            .count()
    }

    /// Stop every ticker; in-flight runs finish on their own
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop tickers, wait up to `grace` for in-flight runs, then abort them
    pub async fn shutdown(&self, grace: Duration) {
        self.stop();
        let tickers: Vec<JoinHandle<()>> = self.tickers.lock().drain(..).collect();
        for ticker in tickers {
            let _ = ticker.await;
        }

        let drained = tokio::time::timeout(grace, async {
            while self.in_flight() > 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;

        if drained.is_err() {
            for slot in self.slots.lock().iter() {
                if let Some(handle) = slot.current.lock().take()
                    && slot.in_flight.load(Ordering::Acquire)
                {
                    warn!(job = %slot.key, "grace period elapsed, aborting run");
                    handle.abort();
                }
            }
        }
        info!("scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
