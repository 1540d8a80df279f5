//! Cron-driven trigger loop with an explicit overlap policy
//!
//! The trigger loop owns the schedule and hands each firing to a dispatcher
//! that applies the [`OverlapPolicy`]. Cycles always run in their own task so
//! a panic is caught through its `JoinHandle` and never takes the loop down.

mod schedule;

pub use schedule::{CronSchedule, DEFAULT_SCHEDULE, OverlapPolicy, ScheduleError};

use crate::monitor::MonitorError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pending firings the `queue` policy holds before dropping new ones
pub const QUEUE_CAPACITY: usize = 16;

const MANUAL_TRIGGER_CAPACITY: usize = 4;

/// Work run on every firing.
///
/// Uses RPITIT with an explicit Send bound so cycles can be spawned.
pub trait PollJob: Send + Sync + 'static {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Run one cycle. An `Err` is counted and logged; the scheduler keeps going.
    fn run_cycle(&self) -> impl Future<Output = Result<(), MonitorError>> + Send;

    /// Called after a cycle panicked
    fn on_panic(&self, _message: &str) {}
}

/// Why a cycle was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Firings seen, scheduled or manual
    pub fired: u64,
    pub completed: u64,
    pub failed: u64,
    /// Firings dropped by the overlap policy or a full queue
    pub skipped: u64,
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fired: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            fired: self.fired.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            panicked: self.panicked.load(Ordering::SeqCst),
        }
    }
}

/// Marks a cycle as in flight until dropped, including on panic
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Entry point for starting a scheduler
pub struct Scheduler;

impl Scheduler {
    /// Start the trigger loop on the current tokio runtime.
    ///
    /// The first firing happens at the schedule's next instant, not immediately.
    pub fn start<J: PollJob>(
        schedule: CronSchedule,
        job: Arc<J>,
        policy: OverlapPolicy,
    ) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let (manual_tx, manual_rx) = mpsc::channel(MANUAL_TRIGGER_CAPACITY);

        info!(
            "Starting scheduler for {} (schedule: {}, overlap: {})",
            job.name(),
            schedule,
            policy
        );

        let dispatcher = Dispatcher::new(job, policy, Arc::clone(&counters), cancel.clone());
        let ticker = Ticker::new(schedule);
        let task = tokio::spawn(trigger_loop(ticker, dispatcher, manual_rx, cancel.clone()));

        SchedulerHandle {
            cancel,
            manual_tx,
            counters,
            task: Some(task),
        }
    }
}

/// Handle to a running scheduler. Dropping it cancels future firings.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    manual_tx: mpsc::Sender<()>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request an immediate cycle, subject to the overlap policy.
    ///
    /// Returns `false` if the request could not be queued.
    pub fn trigger_now(&self) -> bool {
        match self.manual_tx.try_send(()) {
            Ok(()) => true,
            Err(e) => {
                debug!("Manual trigger dropped: {e}");
                false
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel future firings and wait for in-flight cycles to finish
    pub async fn stop(mut self) -> SchedulerStats {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Scheduler loop failed: {e}");
            }
        }
        self.counters.snapshot()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Computes the next scheduled deadline
struct Ticker {
    schedule: CronSchedule,
    last_cron: Option<DateTime<Utc>>,
    next: Option<Instant>,
}

impl Ticker {
    fn new(schedule: CronSchedule) -> Self {
        let mut ticker = Self {
            schedule,
            last_cron: None,
            next: None,
        };
        ticker.next = ticker.compute_next();
        ticker
    }

    fn advance(&mut self) {
        self.next = self.compute_next();
    }

    fn compute_next(&mut self) -> Option<Instant> {
        let now = Instant::now();
        match &self.schedule {
            // an unrepresentable deadline means no upcoming firing
            CronSchedule::Every(interval) => match self.next {
                Some(prev) => prev.checked_add(*interval).map(|at| at.max(now)),
                None => now.checked_add(*interval),
            },
            CronSchedule::Cron { .. } => {
                let wall = Utc::now();
                // never fire the same cron instant twice
                let from = self.last_cron.map_or(wall, |last| last.max(wall));
                let at = self.schedule.next_cron_after(from)?;
                self.last_cron = Some(at);
                now.checked_add((at - wall).to_std().unwrap_or_default())
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn trigger_loop<J: PollJob>(
    mut ticker: Ticker,
    mut dispatcher: Dispatcher<J>,
    mut manual_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    if ticker.next.is_none() {
        warn!("Schedule has no upcoming firings; only manual triggers will run");
    }

    loop {
        let next = ticker.next;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(result) = dispatcher.tasks.join_next(), if !dispatcher.tasks.is_empty() => {
                dispatcher.reap(result);
            }
            Some(()) = manual_rx.recv() => dispatcher.fire(Trigger::Manual),
            _ = sleep_until_opt(next) => {
                dispatcher.fire(Trigger::Scheduled);
                ticker.advance();
            }
        }
    }

    debug!("Scheduler cancelled, waiting for in-flight cycles");
    dispatcher.shutdown().await;
    info!("Scheduler stopped");
}

/// Applies the overlap policy to each firing
struct Dispatcher<J: PollJob> {
    job: Arc<J>,
    policy: OverlapPolicy,
    counters: Arc<Counters>,
    in_flight: Arc<AtomicUsize>,
    tasks: JoinSet<()>,
    queue: Option<(mpsc::Sender<Trigger>, JoinHandle<()>)>,
}

impl<J: PollJob> Dispatcher<J> {
    fn new(
        job: Arc<J>,
        policy: OverlapPolicy,
        counters: Arc<Counters>,
        cancel: CancellationToken,
    ) -> Self {
        let queue = (policy == OverlapPolicy::Queue).then(|| {
            let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
            let worker = tokio::spawn(queue_worker(
                Arc::clone(&job),
                Arc::clone(&counters),
                rx,
                cancel,
            ));
            (tx, worker)
        });

        Self {
            job,
            policy,
            counters,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tasks: JoinSet::new(),
            queue,
        }
    }

    fn fire(&mut self, trigger: Trigger) {
        Counters::bump(&self.counters.fired);

        match self.policy {
            OverlapPolicy::Skip => {
                if self.in_flight.load(Ordering::SeqCst) > 0 {
                    Counters::bump(&self.counters.skipped);
                    debug!(
                        "{} firing ({trigger:?}) skipped: previous cycle still running",
                        self.job.name()
                    );
                } else {
                    self.spawn_cycle(trigger);
                }
            }
            OverlapPolicy::Concurrent => self.spawn_cycle(trigger),
            OverlapPolicy::Queue => {
                let Some((tx, _)) = &self.queue else {
                    return;
                };
                match tx.try_send(trigger) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        Counters::bump(&self.counters.skipped);
                        warn!(
                            "{} firing ({trigger:?}) dropped: queue full ({QUEUE_CAPACITY} pending)",
                            self.job.name()
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        Counters::bump(&self.counters.skipped);
                    }
                }
            }
        }
    }

    fn spawn_cycle(&mut self, trigger: Trigger) {
        let guard = InFlight::enter(&self.in_flight);
        let job = Arc::clone(&self.job);
        let counters = Arc::clone(&self.counters);
        self.tasks.spawn(async move {
            let _guard = guard;
            run_one(job, counters, trigger).await;
        });
    }

    fn reap(&self, result: Result<(), JoinError>) {
        if let Err(e) = result {
            handle_join_error(self.job.as_ref(), &self.counters, e);
        }
    }

    async fn shutdown(mut self) {
        if let Some((tx, worker)) = self.queue.take() {
            drop(tx);
            if let Err(e) = worker.await {
                error!("Queue worker failed: {e}");
            }
        }
        while let Some(result) = self.tasks.join_next().await {
            self.reap(result);
        }
    }
}

/// Drains queued firings one at a time
async fn queue_worker<J: PollJob>(
    job: Arc<J>,
    counters: Arc<Counters>,
    mut rx: mpsc::Receiver<Trigger>,
    cancel: CancellationToken,
) {
    loop {
        let trigger = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            trigger = rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let cycle = tokio::spawn(run_one(Arc::clone(&job), Arc::clone(&counters), trigger));
        if let Err(e) = cycle.await {
            handle_join_error(job.as_ref(), &counters, e);
        }
    }

    // firings still queued at shutdown never run
    rx.close();
    while rx.try_recv().is_ok() {
        Counters::bump(&counters.skipped);
    }
}

async fn run_one<J: PollJob>(job: Arc<J>, counters: Arc<Counters>, trigger: Trigger) {
    debug!("{} cycle started ({trigger:?})", job.name());
    match job.run_cycle().await {
        Ok(()) => Counters::bump(&counters.completed),
        Err(e) => {
            Counters::bump(&counters.failed);
            warn!("{} cycle failed: {e}", job.name());
        }
    }
}

fn handle_join_error<J: PollJob>(job: &J, counters: &Counters, err: JoinError) {
    if err.is_panic() {
        Counters::bump(&counters.panicked);
        let message = panic_message(err.into_panic());
        error!("{} cycle panicked: {message}", job.name());
        job.on_panic(&message);
    } else {
        debug!("{} cycle cancelled", job.name());
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
