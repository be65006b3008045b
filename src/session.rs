//! Per-chat session state
//!
//! The [`SessionStore`] is the single serialization point between the
//! request-handling path (inbound Telegram updates) and the background
//! polling path (tracking tasks). All state transitions go through
//! [`SessionStore::upsert`], which runs its mutator under the store lock.
//!
//! Per-state data is carried inside [`SessionState`] so that a baseline
//! price cannot outlive the currency selection it was captured for.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::watch;

/// Conversation state for one chat.
///
/// The baseline price only exists in `AwaitingThreshold`, bound to the
/// currency it was quoted for; reselecting a currency replaces the whole
/// variant, so a stale baseline is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingCurrencySelection,
    CurrencySelected {
        currency: String,
    },
    AwaitingThreshold {
        currency: String,
        baseline: Decimal,
    },
    Tracking {
        currency: String,
    },
}

/// Ownership token for a running tracking task.
///
/// Holds the cancellation channel and an id unique across all tasks ever
/// started; the id is how a task proves it still owns its chat's slot
/// when it tries to trigger.
#[derive(Debug)]
pub struct TrackingHandle {
    task_id: u64,
    currency: String,
    cancel_tx: watch::Sender<bool>,
}

impl TrackingHandle {
    pub fn new(task_id: u64, currency: String) -> (Self, watch::Receiver<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (
            Self {
                task_id,
                currency,
                cancel_tx,
            },
            cancel_rx,
        )
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Signal cooperative cancellation. Idempotent; a task that already
    /// exited simply has no receiver left, which is fine.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// One chat's session record
#[derive(Debug, Default)]
pub struct ChatSession {
    pub state: SessionState,
    /// Handle of this chat's polling task, if one is running. Installed
    /// and removed by the tracker under the store lock. It can outlive
    /// the `Tracking` state: a re-track flow moves the chat back to
    /// `AwaitingThreshold` while the old task keeps running until it is
    /// superseded or cancelled.
    pub tracking: Option<TrackingHandle>,
}

impl ChatSession {
    /// Revert to `Idle`, returning the tracking handle (if any) so the
    /// caller can cancel it outside the lock.
    pub fn reset(&mut self) -> Option<TrackingHandle> {
        self.state = SessionState::Idle;
        self.tracking.take()
    }
}

/// Map from chat id to session, safe for concurrent use from the update
/// path and the tracking tasks.
///
/// One global sync lock over the map: critical sections are a handful of
/// field writes and the lock is never held across an await. Per-chat
/// sharding is the scale-up path if chat volume ever warrants it.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<i64, ChatSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic read-modify-write of a chat's session, creating it in
    /// `Idle` on first touch. The mutator must not block.
    pub fn upsert<R>(&self, chat_id: i64, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        let mut map = self.inner.lock();
        f(map.entry(chat_id).or_default())
    }

    /// Read-only access; absent chats read as `None`.
    pub fn with<R>(&self, chat_id: i64, f: impl FnOnce(Option<&ChatSession>) -> R) -> R {
        let map = self.inner.lock();
        f(map.get(&chat_id))
    }

    /// Current state snapshot; absent chats are `Idle`.
    pub fn state(&self, chat_id: i64) -> SessionState {
        self.with(chat_id, |s| {
            s.map(|s| s.state.clone()).unwrap_or_default()
        })
    }

    /// Whether the chat currently owns a live tracking handle
    pub fn is_tracking(&self, chat_id: i64) -> bool {
        self.with(chat_id, |s| s.is_some_and(|s| s.tracking.is_some()))
    }
}
