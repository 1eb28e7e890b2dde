//! Fan-out of session output to external collaborators.
//!
//! [`FeedHub`] offers three surfaces over the same stream of
//! [`SessionEvent`]s:
//!
//! - **Callbacks** registered with [`FeedHub::subscribe`], invoked
//!   synchronously on the publishing task. The returned [`Subscription`]
//!   removes the callback when dropped.
//! - **Broadcast** receivers from [`FeedHub::events`] for async consumers.
//!   A receiver that falls more than [`EVENT_CAPACITY`] events behind gets
//!   [`broadcast::error::RecvError::Lagged`] and skips ahead.
//! - **Latest snapshot** via [`FeedHub::snapshot`], backed by a `watch`
//!   channel so reads never wait on the producer.
//!
//! Publishing holds the read side of a gate lock for the whole delivery and
//! [`FeedHub::close`] takes the write side. Once `close` returns, no event
//! is delivered on any surface until the hub is reopened. The open flag
//! itself is atomic so [`FeedHub::is_open`] never touches the gate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, Mutex, RwLock, Weak};

use tokio::sync::{broadcast, watch};
use touchline_types::{FeedEvent, GoalEvent, SessionSnapshot};
use tracing::warn;

/// Capacity of the broadcast channel.
pub const EVENT_CAPACITY: usize = 256;

/// One item of session output.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A fusion publish with the state it was computed from.
    Feed(Arc<FeedEvent>),
    /// A goal scored by the stochastic scoring rule.
    Goal(GoalEvent),
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

struct HubInner {
    /// Held shared by deliveries and exclusively by `open`/`close`.
    gate: RwLock<()>,
    open: AtomicBool,
    registry: Mutex<Registry>,
    tx: broadcast::Sender<SessionEvent>,
    snapshot: watch::Sender<Arc<SessionSnapshot>>,
}

/// Shared publisher for one session. Cloning yields another handle to the
/// same hub.
#[derive(Clone)]
pub struct FeedHub {
    inner: Arc<HubInner>,
}

impl core::fmt::Debug for FeedHub {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeedHub")
            .field("open", &self.is_open())
            .field("callbacks", &self.callback_count())
            .field("receivers", &self.inner.tx.receiver_count())
            .finish_non_exhaustive()
    }
}

fn recover<T>(result: LockResult<T>) -> T {
    result.unwrap_or_else(|poisoned| {
        warn!("Feed hub lock was poisoned; continuing with inner state");
        poisoned.into_inner()
    })
}

impl FeedHub {
    /// Create a closed hub holding `initial` as the latest snapshot.
    pub fn new(initial: SessionSnapshot) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot, _) = watch::channel(Arc::new(initial));
        Self {
            inner: Arc::new(HubInner {
                gate: RwLock::new(()),
                open: AtomicBool::new(false),
                registry: Mutex::new(Registry::default()),
                tx,
                snapshot,
            }),
        }
    }

    /// Register a callback for every future event.
    ///
    /// The callback runs on the publishing task and must not block. It may
    /// subscribe or unsubscribe other callbacks and read [`is_open`], but
    /// must not call [`open`] or [`close`]: those wait for the delivery that
    /// is running the callback.
    ///
    /// [`is_open`]: Self::is_open
    /// [`open`]: Self::open
    /// [`close`]: Self::close
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut registry = recover(self.inner.registry.lock());
        let id = registry.next_id;
        registry.next_id = registry.next_id.saturating_add(1);
        registry.callbacks.insert(id, Arc::new(callback));
        Subscription {
            hub: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// A new broadcast receiver for future events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.tx.subscribe()
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    /// Allow publishing.
    pub fn open(&self) {
        let _gate = recover(self.inner.gate.write());
        self.inner.open.store(true, Ordering::Release);
    }

    /// Stop publishing. Waits for an in-flight delivery to finish.
    ///
    /// Returns whether the hub was open.
    pub fn close(&self) -> bool {
        let _gate = recover(self.inner.gate.write());
        self.inner.open.swap(false, Ordering::AcqRel)
    }

    /// Whether publishing is currently allowed.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        recover(self.inner.registry.lock()).callbacks.len()
    }

    /// Deliver `event` to every callback and broadcast receiver.
    ///
    /// Returns `false` without delivering if the hub is closed.
    pub fn publish(&self, event: &SessionEvent) -> bool {
        let _gate = recover(self.inner.gate.read());
        if !self.is_open() {
            return false;
        }
        let callbacks: Vec<Callback> = recover(self.inner.registry.lock())
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in &callbacks {
            callback(event);
        }
        // send returns Err only when there are zero receivers,
        // which is normal when nobody called `events()`.
        self.inner.tx.send(event.clone()).unwrap_or(0);
        true
    }

    /// Commit `snapshot` as the latest state if the hub is open.
    pub fn commit(&self, snapshot: SessionSnapshot) -> bool {
        let _gate = recover(self.inner.gate.read());
        if !self.is_open() {
            return false;
        }
        self.inner.snapshot.send_replace(Arc::new(snapshot));
        true
    }

    /// Replace the latest snapshot regardless of the gate.
    pub fn reset(&self, snapshot: SessionSnapshot) {
        self.inner.snapshot.send_replace(Arc::new(snapshot));
    }
}

/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
#[derive(Debug)]
pub struct Subscription {
    hub: Weak<HubInner>,
    id: Option<u64>,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(hub) = self.hub.upgrade() {
            recover(hub.registry.lock()).callbacks.remove(&id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;
    use touchline_types::{
        BallState, DetectionSnapshot, EmotionState, Scoreboard, SessionId, Team,
    };

    use super::*;

    fn snapshot(frame: u64) -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId::new(),
            mode: None,
            frame,
            ball: BallState::default(),
            players: Vec::new(),
            detection: DetectionSnapshot::default(),
            tracked_ball: None,
            emotion: EmotionState::default(),
            signal: 0.0,
            fusion: None,
            fusion_progress: 0.0,
            score: Scoreboard::default(),
            match_seconds: 0,
            match_time: "0:00".to_owned(),
            timestamp: Utc::now(),
        }
    }

    fn goal() -> SessionEvent {
        SessionEvent::Goal(GoalEvent {
            scoring_team: Team::A,
            score: Scoreboard {
                team_a: 1,
                team_b: 0,
            },
            frame: 3,
        })
    }

    fn counting(hub: &FeedHub) -> (Subscription, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = hub.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (sub, count)
    }

    #[test]
    fn closed_hub_delivers_nothing() {
        let hub = FeedHub::new(snapshot(0));
        let (_sub, count) = counting(&hub);
        let mut rx = hub.events();

        assert!(!hub.publish(&goal()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn open_hub_reaches_every_surface() {
        let hub = FeedHub::new(snapshot(0));
        let (_sub, count) = counting(&hub);
        let mut rx = hub.events();
        hub.open();

        assert!(hub.publish(&goal()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap(), goal());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = FeedHub::new(snapshot(0));
        hub.open();
        let (sub, count) = counting(&hub);
        let (other, other_count) = counting(&hub);
        assert_eq!(hub.callback_count(), 2);

        drop(sub);
        other.unsubscribe();
        assert_eq!(hub.callback_count(), 0);

        hub.publish(&goal());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(other_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_reports_previous_state() {
        let hub = FeedHub::new(snapshot(0));
        assert!(!hub.close());
        hub.open();
        assert!(hub.is_open());
        assert!(hub.close());
        assert!(!hub.close());
    }

    #[test]
    fn commit_is_gated_but_reset_is_not() {
        let hub = FeedHub::new(snapshot(0));
        assert!(!hub.commit(snapshot(5)));
        assert_eq!(hub.snapshot().frame, 0);

        hub.open();
        assert!(hub.commit(snapshot(6)));
        assert_eq!(hub.snapshot().frame, 6);

        hub.close();
        hub.reset(snapshot(7));
        assert_eq!(hub.snapshot().frame, 7);
    }

    #[test]
    fn callback_may_subscribe_during_delivery() {
        let hub = FeedHub::new(snapshot(0));
        hub.open();
        let inner = hub.clone();
        let added = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&added);
        let _sub = hub.subscribe(move |_| {
            sink.lock().unwrap().push(inner.subscribe(|_| {}));
        });

        hub.publish(&goal());
        assert_eq!(hub.callback_count(), 2);
        added.lock().unwrap().clear();
        assert_eq!(hub.callback_count(), 1);
    }

    #[test]
    fn callback_can_read_the_open_flag() {
        let hub = FeedHub::new(snapshot(0));
        hub.open();
        let inner = hub.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = hub.subscribe(move |_| sink.lock().unwrap().push(inner.is_open()));

        assert!(hub.publish(&goal()));
        assert!(hub.close());
        assert!(!hub.publish(&goal()));
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }
}
