//! Price-threshold tracking engine
//!
//! Owns the lifecycle of "watch this currency until the price crosses X"
//! sessions: starting, polling, comparing, notifying, cancelling, and
//! superseding. One lightweight task per tracked chat; all state
//! transitions serialize through the [`SessionStore`] lock.


use crate::config::TrackerConfig;
use crate::error::{BotError, Result};
use crate::feed::PriceSource;
use crate::notify::Notifier;
use crate::session::{SessionState, SessionStore, TrackingHandle};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Which way the price has to move to satisfy the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upward,
    Downward,
}

impl Direction {
    /// Inferred from the threshold relative to the baseline the user was
    /// shown. Equal threshold and baseline never reaches here; that case
    /// triggers immediately in [`Tracker::start_tracking`].
    fn infer(threshold: Decimal, baseline: Decimal) -> Self {
        if threshold > baseline {
            Self::Upward
        } else {
            Self::Downward
        }
    }
}

/// First observation that satisfies the direction-appropriate comparison
fn crossed(direction: Direction, price: Decimal, threshold: Decimal) -> bool {
    match direction {
        Direction::Upward => price >= threshold,
        Direction::Downward => price <= threshold,
    }
}

/// Outcome of a successful `start_tracking` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackStart {
    /// A polling task is now watching the price
    Started { currency: String, direction: Direction },
    /// Threshold equalled the baseline: the user was notified at once
    /// and no task was spawned
    Triggered { currency: String, price: Decimal },
}

enum Armed {
    Run {
        currency: String,
        direction: Direction,
        cancel_rx: watch::Receiver<bool>,
        prior: Option<TrackingHandle>,
    },
    Immediate {
        currency: String,
        baseline: Decimal,
        prior: Option<TrackingHandle>,
    },
}

/// The tracking scheduler
pub struct Tracker {
    store: Arc<SessionStore>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    config: TrackerConfig,
    next_task_id: AtomicU64,
}

impl Tracker {
    pub fn new(
        store: Arc<SessionStore>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            config,
            next_task_id: AtomicU64::new(1),
        }
    }

    /// Start watching the chat's selected currency until its price
    /// crosses `threshold`.
    ///
    /// Requires the session to be in `AwaitingThreshold`: the currency
    /// and baseline are taken from there atomically, so tracking can
    /// never start against a stale or mismatched baseline. Any previous
    /// tracking task for the chat is superseded: its handle is removed
    /// under the same lock and cancelled, leaving exactly one live task.
    pub async fn start_tracking(
        self: &Arc<Self>,
        chat_id: i64,
        threshold: Decimal,
    ) -> Result<TrackStart> {
        if threshold.is_sign_negative() {
            return Err(BotError::InvalidThreshold(threshold.to_string()));
        }

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);

        let armed = self.store.upsert(chat_id, |session| {
            let SessionState::AwaitingThreshold { currency, baseline } = session.state.clone()
            else {
                return Err(BotError::MissingBaseline(chat_id));
            };

            // Supersession: the old handle leaves the slot before the new
            // one enters it, all under the store lock.
            let prior = session.tracking.take();

            if threshold == baseline {
                // Degenerate session: the target is already met, so the
                // policy is to trigger immediately rather than wait for a
                // poll that may never satisfy a strict direction.
                session.state = SessionState::Idle;
                return Ok(Armed::Immediate {
                    currency,
                    baseline,
                    prior,
                });
            }

            let direction = Direction::infer(threshold, baseline);
            let (handle, cancel_rx) = TrackingHandle::new(task_id, currency.clone());
            session.tracking = Some(handle);
            session.state = SessionState::Tracking {
                currency: currency.clone(),
            };
            Ok(Armed::Run {
                currency,
                direction,
                cancel_rx,
                prior,
            })
        })?;

        match armed {
            Armed::Immediate {
                currency,
                baseline,
                prior,
            } => {
                if let Some(prior) = prior {
                    prior.cancel();
                }
                info!(chat_id, %currency, %threshold, "threshold equals baseline, immediate trigger");
                self.send_trigger(chat_id, &currency, baseline).await;
                Ok(TrackStart::Triggered {
                    currency,
                    price: baseline,
                })
            }
            Armed::Run {
                currency,
                direction,
                cancel_rx,
                prior,
            } => {
                if let Some(prior) = prior {
                    prior.cancel();
                    debug!(chat_id, "superseded previous tracking task");
                }
                info!(chat_id, %currency, %threshold, ?direction, "tracking started");

                let tracker = Arc::clone(self);
                let loop_currency = currency.clone();
                tokio::spawn(async move {
                    tracker
                        .run_loop(task_id, chat_id, loop_currency, threshold, direction, cancel_rx)
                        .await;
                });

                Ok(TrackStart::Started { currency, direction })
            }
        }
    }

    /// Cancel the chat's tracking task, if any, and reset the session to
    /// `Idle`. A chat with nothing to cancel is a no-op, not an error.
    /// Returns whether a task was actually cancelled.
    pub fn cancel_tracking(&self, chat_id: i64) -> bool {
        let prior = self.store.upsert(chat_id, |session| session.reset());
        match prior {
            Some(handle) => {
                handle.cancel();
                info!(chat_id, currency = handle.currency(), "tracking cancelled");
                true
            }
            None => false,
        }
    }

    /// Polling loop for one tracking task. Exits on cancellation or after
    /// firing its single trigger notification.
    async fn run_loop(
        &self,
        task_id: u64,
        chat_id: i64,
        currency: String,
        threshold: Decimal,
        direction: Direction,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut consecutive_failures: u32 = 0;
        let mut degraded_reported = false;

        loop {
            // First tick fires immediately; the wait is always
            // interruptible by cancellation.
            tokio::select! {
                _ = cancel_rx.changed() => {
                    debug!(chat_id, task_id, "tracking task cancelled during wait");
                    return;
                }
                _ = interval.tick() => {}
            }
            if *cancel_rx.borrow() {
                return;
            }

            let result = match tokio::time::timeout(
                self.config.request_timeout(),
                self.source.price(&currency),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(BotError::FeedUnavailable(format!(
                    "price query for {} timed out",
                    currency
                ))),
            };

            // The query result is void once cancellation has been
            // observed, even if it was already in flight.
            if *cancel_rx.borrow() {
                debug!(chat_id, task_id, "discarding in-flight result after cancellation");
                return;
            }

            match result {
                Ok(price) => {
                    if degraded_reported {
                        info!(chat_id, %currency, "price feed recovered");
                    }
                    consecutive_failures = 0;
                    degraded_reported = false;

                    debug!(chat_id, %currency, %price, %threshold, "tick");
                    if crossed(direction, price, threshold) {
                        self.finish(task_id, chat_id, &currency, price).await;
                        return;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        chat_id, %currency, consecutive_failures,
                        "price poll failed, retrying next tick: {}", e
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures
                        && !degraded_reported
                    {
                        // Same rule as the trigger path: a cancelled task
                        // stays silent.
                        if *cancel_rx.borrow() {
                            return;
                        }
                        degraded_reported = true;
                        let text = format!(
                            "Still watching {}, but the price feed keeps failing. \
                             I will keep retrying.",
                            currency
                        );
                        if let Err(e) = self.notifier.notify(chat_id, &text).await {
                            warn!(chat_id, "failed to send degraded-tracking notice: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Trigger path. The session is compare-and-reset under the store
    /// lock keyed by task id: only the task that still owns the chat's
    /// slot may clear it and notify, so a superseded or cancelled task
    /// can never produce a late notification.
    async fn finish(&self, task_id: u64, chat_id: i64, currency: &str, price: Decimal) {
        let won = self.store.upsert(chat_id, |session| {
            match &session.tracking {
                Some(handle) if handle.task_id() == task_id => {
                    session.reset();
                    true
                }
                _ => false,
            }
        });

        if !won {
            debug!(chat_id, task_id, "trigger lost to supersession, suppressing notification");
            return;
        }

        info!(chat_id, %currency, %price, "threshold crossed, tracking stopped");
        self.send_trigger(chat_id, currency, price).await;
    }

    async fn send_trigger(&self, chat_id: i64, currency: &str, price: Decimal) {
        let text = format!(
            "{} is now at ${}.\nTracking stopped at {}.",
            currency,
            price,
            chrono::Utc::now().format("%H:%M UTC")
        );
        if let Err(e) = self.notifier.notify(chat_id, &text).await {
            warn!(chat_id, "failed to send trigger notification: {}", e);
        }
    }
}
