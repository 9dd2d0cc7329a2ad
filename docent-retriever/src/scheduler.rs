//! Debounced, rate-limited full-rebuild scheduling.
//!
//! Rebuilding re-embeds every chunk in the system, so a burst of document
//! mutations must not trigger one rebuild each. The scheduler is an explicit
//! state machine (`Idle → PendingDebounce → Running → Idle`) owned by a
//! single spawned task and fed through a channel, which makes the
//! at-most-one-in-flight guarantee structural: there is no flag anyone can
//! forget to check.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// What the scheduler drives. Implemented by `IndexingPipeline`; small on
/// purpose so timer behavior is testable without a real pipeline.
#[async_trait]
pub trait RebuildTarget: Send + Sync + 'static {
    async fn rebuild_all(&self) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Quiet period a burst must settle for before a rebuild fires.
    pub debounce_delay: Duration,
    /// Floor between consecutive rebuild starts, regardless of demand.
    pub min_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_secs(5),
            min_interval: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    pub fn new(debounce_delay: Duration, min_interval: Duration) -> Self {
        Self {
            debounce_delay,
            min_interval,
        }
    }
}

/// Outcome delivered to callers awaiting a rebuild. The error is stringly
/// typed because one run can have many waiters.
pub type RebuildOutcome = std::result::Result<usize, String>;

enum Message {
    Request {
        reply: Option<oneshot::Sender<RebuildOutcome>>,
    },
    Shutdown,
}

enum State {
    Idle,
    PendingDebounce {
        deadline: Instant,
    },
    Running {
        run: JoinHandle<RebuildOutcome>,
        rerun_wanted: bool,
    },
}

/// Handle to the scheduler task. Dropping it (or calling [`shutdown`]) stops
/// the task; a rebuild already in flight completes first.
///
/// [`shutdown`]: RebuildScheduler::shutdown
pub struct RebuildScheduler {
    tx: mpsc::UnboundedSender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl RebuildScheduler {
    pub fn spawn(target: Arc<dyn RebuildTarget>, config: SchedulerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_scheduler(target, config, rx));
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Enqueue a rebuild request and return immediately.
    pub fn request_rebuild(&self) {
        if self.tx.send(Message::Request { reply: None }).is_err() {
            warn!("rebuild requested after scheduler shutdown");
        }
    }

    /// Enqueue a rebuild request and wait for the run that covers it.
    pub async fn request_rebuild_wait(&self) -> RebuildOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::Request {
                reply: Some(reply_tx),
            })
            .map_err(|_| "scheduler stopped".to_string())?;
        reply_rx.await.map_err(|_| "scheduler stopped".to_string())?
    }

    /// Stop the scheduler. An in-flight rebuild finishes before the task
    /// exits; pending (debounced, not yet started) rebuilds are abandoned.
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run_scheduler(
    target: Arc<dyn RebuildTarget>,
    config: SchedulerConfig,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    let mut state = State::Idle;
    let mut last_completion: Option<Instant> = None;
    // Waiters for the pending/current run, and for the run after it.
    let mut waiters: Vec<oneshot::Sender<RebuildOutcome>> = Vec::new();
    let mut next_waiters: Vec<oneshot::Sender<RebuildOutcome>> = Vec::new();

    loop {
        state = match state {
            State::Idle => match rx.recv().await {
                None | Some(Message::Shutdown) => break,
                Some(Message::Request { reply }) => {
                    if let Some(r) = reply {
                        waiters.push(r);
                    }
                    let now = Instant::now();
                    let stale = last_completion
                        .is_none_or(|t| now.duration_since(t) >= config.min_interval);
                    if stale {
                        debug!("rebuild requested while idle, starting immediately");
                        State::Running {
                            run: start_run(&target),
                            rerun_wanted: false,
                        }
                    } else {
                        let deadline = next_deadline(&config, last_completion);
                        debug!("rebuild requested within min interval, deferring");
                        State::PendingDebounce { deadline }
                    }
                }
            },
            State::PendingDebounce { deadline } => {
                tokio::select! {
                    _ = sleep_until(deadline) => State::Running {
                        run: start_run(&target),
                        rerun_wanted: false,
                    },
                    msg = rx.recv() => match msg {
                        None | Some(Message::Shutdown) => break,
                        Some(Message::Request { reply }) => {
                            if let Some(r) = reply {
                                waiters.push(r);
                            }
                            // Debounce: only the last request in a burst
                            // fires, never sooner than the interval floor.
                            let deadline = next_deadline(&config, last_completion);
                            State::PendingDebounce { deadline }
                        }
                    }
                }
            }
            State::Running {
                mut run,
                rerun_wanted,
            } => {
                tokio::select! {
                    joined = &mut run => {
                        let outcome = finish_run(joined);
                        last_completion = Some(Instant::now());
                        for waiter in waiters.drain(..) {
                            let _ = waiter.send(outcome.clone());
                        }
                        waiters.append(&mut next_waiters);
                        if rerun_wanted {
                            // A request arrived mid-run; its document changes
                            // postdate the run's snapshot, so go again after
                            // the usual debounce.
                            State::PendingDebounce {
                                deadline: next_deadline(&config, last_completion),
                            }
                        } else {
                            State::Idle
                        }
                    }
                    msg = rx.recv() => match msg {
                        None | Some(Message::Shutdown) => {
                            let outcome = finish_run(run.await);
                            for waiter in waiters.drain(..) {
                                let _ = waiter.send(outcome.clone());
                            }
                            break;
                        }
                        Some(Message::Request { reply }) => {
                            if let Some(r) = reply {
                                next_waiters.push(r);
                            }
                            State::Running { run, rerun_wanted: true }
                        }
                    }
                }
            }
        };
    }

    for waiter in waiters.drain(..).chain(next_waiters.drain(..)) {
        let _ = waiter.send(Err("scheduler stopped".to_string()));
    }
    info!("rebuild scheduler stopped");
}

fn start_run(target: &Arc<dyn RebuildTarget>) -> JoinHandle<RebuildOutcome> {
    let target = Arc::clone(target);
    tokio::spawn(async move {
        info!("index rebuild starting");
        target.rebuild_all().await.map_err(|e| e.to_string())
    })
}

fn finish_run(joined: std::result::Result<RebuildOutcome, tokio::task::JoinError>) -> RebuildOutcome {
    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(join_err) => Err(format!("rebuild task failed: {join_err}")),
    };
    match &outcome {
        Ok(count) => info!(vectors = count, "index rebuild finished"),
        Err(e) => error!(error = %e, "index rebuild failed"),
    }
    outcome
}

fn next_deadline(config: &SchedulerConfig, last_completion: Option<Instant>) -> Instant {
    let debounced = Instant::now() + config.debounce_delay;
    match last_completion {
        Some(t) => debounced.max(t + config.min_interval),
        None => debounced,
    }
}
