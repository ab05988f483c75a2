//! Auto-cancellation of orders whose payment window ran out.
//!
//! [`ExpirationRegistry`] owns one timer per pending order. When a timer
//! fires it removes its own entry under the registry lock and, only if the
//! entry was still there, hands the order id to the [`ExpirationWorker`].
//! Removal and hand-off happen under the same lock as [`ExpirationRegistry::cancel`],
//! so an order is either expired by its timer or released by a payment
//! event, never both.
//!
//! Timers live in memory only. After a restart pending orders simply stop
//! expiring; nothing else depends on them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    domain::OrderAction,
    repository::{CancelOutcome, OrderRepository},
};

/// Sent to the worker when an order's deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredOrder {
    pub order_id: Uuid,
    pub deadline: DateTime<Utc>,
}

struct ExpirationEntry {
    deadline: DateTime<Utc>,
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Entries {
    by_order: HashMap<Uuid, ExpirationEntry>,
    next_generation: u64,
}

pub struct ExpirationRegistry {
    entries: Mutex<Entries>,
    expired_tx: mpsc::UnboundedSender<ExpiredOrder>,
}

impl ExpirationRegistry {
    /// Creates the registry and the receiving end its timers report to.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ExpiredOrder>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            entries: Mutex::new(Entries::default()),
            expired_tx,
        });
        (registry, expired_rx)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Nothing in a critical section can leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedules expiry of `order_id` at `deadline`. Must be called from
    /// within a tokio runtime. A second registration for the same order
    /// replaces the first.
    pub fn register(self: &Arc<Self>, order_id: Uuid, deadline: DateTime<Utc>) {
        let cancel = CancellationToken::new();

        let generation = {
            let mut entries = self.lock();
            entries.next_generation += 1;
            let generation = entries.next_generation;
            let previous = entries.by_order.insert(
                order_id,
                ExpirationEntry {
                    deadline,
                    generation,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.cancel.cancel();
            }
            generation
        };

        let registry: Weak<Self> = Arc::downgrade(self);
        let delay = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.fire(order_id, generation);
                    }
                }
            }
        });

        tracing::debug!(%order_id, %deadline, "Registered order expiration");
    }

    /// Timer callback: remove-if-still-ours and dispatch, atomically.
    fn fire(&self, order_id: Uuid, generation: u64) {
        let mut entries = self.lock();

        let still_ours = entries
            .by_order
            .get(&order_id)
            .is_some_and(|entry| entry.generation == generation);
        if !still_ours {
            return;
        }

        if let Some(entry) = entries.by_order.remove(&order_id) {
            let message = ExpiredOrder {
                order_id,
                deadline: entry.deadline,
            };
            if self.expired_tx.send(message).is_err() {
                tracing::warn!(%order_id, "Expiration worker is gone; order will not auto-cancel");
            }
        }
    }

    /// Stops the timer for `order_id`. Returns `false` if there was none,
    /// either because it already fired or it was never registered.
    pub fn cancel(&self, order_id: Uuid) -> bool {
        let removed = self.lock().by_order.remove(&order_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::debug!(%order_id, "Cancelled order expiration");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, order_id: Uuid) -> bool {
        self.lock().by_order.contains_key(&order_id)
    }

    pub fn deadline(&self, order_id: Uuid) -> Option<DateTime<Utc>> {
        self.lock().by_order.get(&order_id).map(|entry| entry.deadline)
    }

    pub fn len(&self) -> usize {
        self.lock().by_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops every pending timer without expiring anything.
    pub fn shutdown(&self) {
        let drained: Vec<ExpirationEntry> = self.lock().by_order.drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.cancel.cancel();
        }
        tracing::info!(pending = drained.len(), "Stopped order expiration timers");
    }
}

/// Cancels expired orders, each under its own time limit and independent of
/// whatever request created the order.
pub struct ExpirationWorker {
    orders: Arc<dyn OrderRepository>,
    timeout: Duration,
}

impl ExpirationWorker {
    pub fn new(orders: Arc<dyn OrderRepository>, timeout: Duration) -> Self {
        Self { orders, timeout }
    }

    /// Runs until every registry handle is dropped.
    pub async fn run(self, mut expired_rx: mpsc::UnboundedReceiver<ExpiredOrder>) {
        tracing::info!("Order expiration worker started");

        while let Some(expired) = expired_rx.recv().await {
            self.expire(expired).await;
        }

        tracing::info!("Order expiration worker stopped");
    }

    /// One expiry. Failures are logged and not retried.
    pub async fn expire(&self, expired: ExpiredOrder) {
        let order_id = expired.order_id;
        let outcome = tokio::time::timeout(
            self.timeout,
            self.orders.cancel(order_id, OrderAction::Expire),
        )
        .await;

        match outcome {
            Ok(Ok(CancelOutcome::Cancelled(_))) => {
                tracing::info!(%order_id, deadline = %expired.deadline, "Auto-cancelled unpaid order");
            }
            Ok(Ok(CancelOutcome::AlreadyCancelled(_))) => {
                tracing::debug!(%order_id, "Expired order was already cancelled");
            }
            Ok(Ok(CancelOutcome::Illegal(status))) => {
                tracing::debug!(%order_id, status = status.as_str(), "Order left Pending before expiry; nothing to do");
            }
            Ok(Err(e)) => {
                tracing::error!(%order_id, error = %e, "Failed to auto-cancel order");
            }
            Err(_) => {
                tracing::error!(%order_id, timeout = ?self.timeout, "Auto-cancel timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_fires_once_and_removes_entry() {
        let (registry, mut rx) = ExpirationRegistry::new();
        let order_id = Uuid::new_v4();

        registry.register(order_id, Utc::now() + chrono::Duration::milliseconds(20));
        assert!(registry.contains(order_id));

        let expired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expired.order_id, order_id);
        assert!(!registry.contains(order_id));
        assert!(!registry.cancel(order_id));
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let (registry, mut rx) = ExpirationRegistry::new();
        let order_id = Uuid::new_v4();

        registry.register(order_id, Utc::now() + chrono::Duration::milliseconds(50));
        assert!(registry.cancel(order_id));
        assert!(!registry.cancel(order_id));

        let nothing = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_past_deadline_fires_immediately() {
        let (registry, mut rx) = ExpirationRegistry::new();
        let order_id = Uuid::new_v4();

        registry.register(order_id, Utc::now() - chrono::Duration::seconds(5));

        let expired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expired.order_id, order_id);
    }

    #[tokio::test]
    async fn test_reregistering_replaces_old_timer() {
        let (registry, mut rx) = ExpirationRegistry::new();
        let order_id = Uuid::new_v4();

        registry.register(order_id, Utc::now() + chrono::Duration::milliseconds(20));
        let later = Utc::now() + chrono::Duration::seconds(60);
        registry.register(order_id, later);

        let nothing = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(registry.deadline(order_id), Some(later));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_timers() {
        let (registry, mut rx) = ExpirationRegistry::new();
        for _ in 0..3 {
            registry.register(Uuid::new_v4(), Utc::now() + chrono::Duration::milliseconds(30));
        }

        registry.shutdown();

        let nothing = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
        assert!(registry.is_empty());
    }
}
