//! Change notifier: fan-out of ingestion notices to live subscribers.
//!
//! The subscriber set is the only cross-request mutable state in the
//! service. Broadcast works on a snapshot taken under the read lock, so it
//! never observes a half-applied subscribe or unsubscribe. A subscriber
//! whose channel is closed or full is dropped on the spot and never retried.

pub mod message;

pub use message::Notification;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::model::event::IngestSummary;
use crate::telemetry::metrics;

/// Default per-subscriber channel capacity.
pub const DEFAULT_BUFFER: usize = 64;

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end of a subscription. Dropping it disconnects; the notifier
/// notices on the next broadcast and deregisters.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Notification>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message. `None` once the subscription was removed.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

pub struct Notifier {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Notification>>>,
    next_id: AtomicU64,
    buffer: usize,
    /// When something other than a heartbeat last went out.
    last_broadcast: Mutex<Instant>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl Notifier {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            last_broadcast: Mutex::new(Instant::now()),
        }
    }

    /// Register a new subscriber.
    pub async fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers.write().await.insert(id, sender);
        metrics::notify_subscribers().add(1, &[]);
        debug!(subscriber = %id, "subscriber registered");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            metrics::notify_subscribers().add(-1, &[]);
            debug!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver `message` to every subscriber. Returns how many received it.
    pub async fn broadcast(&self, message: Notification) -> usize {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Notification>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in snapshot {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(subscriber = %id, kind = message.kind(), "delivery failed: {e}");
                    dead.push(id);
                }
            }
        }

        for id in &dead {
            self.unsubscribe(*id).await;
        }

        if !matches!(message, Notification::Heartbeat { .. }) {
            *self.last_broadcast.lock().await = Instant::now();
        }

        let kind = KeyValue::new("kind", message.kind());
        metrics::notify_deliveries().add(
            delivered as u64,
            &[KeyValue::new("result", "delivered"), kind.clone()],
        );
        metrics::notify_deliveries().add(dead.len() as u64, &[KeyValue::new("result", "dropped"), kind]);

        delivered
    }

    /// Announce a durably stored batch.
    pub async fn events_ingested(&self, summary: IngestSummary) -> usize {
        self.broadcast(Notification::EventsIngested(summary)).await
    }

    /// Send a heartbeat if nothing but heartbeats went out for at least `idle_for`.
    /// Returns true if a heartbeat went out.
    pub async fn heartbeat_if_idle(&self, idle_for: Duration) -> bool {
        match Instant::now().checked_sub(idle_for) {
            Some(since) => self.heartbeat_if_quiet_since(since).await,
            None => false,
        }
    }

    /// Send a heartbeat if nothing but heartbeats was broadcast after `since`.
    pub async fn heartbeat_if_quiet_since(&self, since: Instant) -> bool {
        let quiet = *self.last_broadcast.lock().await <= since;
        if quiet {
            self.broadcast(Notification::Heartbeat { at: Utc::now() }).await;
        }
        quiet
    }

    /// Spawn the keep-alive loop. Runs until `shutdown` is notified.
    ///
    /// Heartbeats double as liveness checks: a dropped connection shows up
    /// as a failed delivery and the subscriber is deregistered.
    pub fn spawn_heartbeat(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Arc<Notify>,
    ) -> JoinHandle<()> {
        let notifier = Arc::clone(self);
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut previous = ticker.tick().await;
            info!(interval_ms = interval.as_millis() as u64, "heartbeat started");
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("heartbeat stopped");
                        return;
                    }
                    tick = ticker.tick() => {
                        // Idle means no traffic since the previous tick.
                        notifier.heartbeat_if_quiet_since(previous).await;
                        previous = tick;
                    }
                }
            }
        })
    }
}
