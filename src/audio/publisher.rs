//! Energy snapshot publisher: current-value store plus subscriber fan-out.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

use super::energy::EnergySnapshot;

/// Identifies one subscription; pass back to [`EnergyPublisher::unsubscribe`].
pub type SubscriberId = u64;

type Callback = Box<dyn Fn(&EnergySnapshot) + Send>;

/// Turns byte spectra into [`EnergySnapshot`]s and distributes them.
///
/// Consumers either poll [`current`](Self::current) (a render loop reading
/// once per frame) or subscribe for a synchronous callback on every
/// publish. Before the first publish, `current` returns an inert all-zero
/// snapshot, never a missing value.
///
/// Callbacks run on the publishing thread with the registry locked; a
/// callback may read `current`, but must not subscribe or unsubscribe
/// from inside a notification.
pub struct EnergyPublisher {
    current: Mutex<EnergySnapshot>,
    subscribers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_id: AtomicU64,
}

impl EnergyPublisher {
    /// `bin_count` sizes the initial zero snapshot.
    pub fn new(bin_count: usize) -> Self {
        Self {
            current: Mutex::new(EnergySnapshot::zero(bin_count)),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Compute band energies for `bins`, store the resulting snapshot as
    /// current, and notify all subscribers synchronously in subscription
    /// order.
    ///
    /// A panicking subscriber is isolated: it is logged and the remaining
    /// subscribers are still notified.
    pub fn publish(&self, bins: &[u8]) {
        let snapshot = EnergySnapshot::from_bins(bins);
        *self.current.lock().unwrap() = snapshot.clone();

        let subscribers = self.subscribers.lock().unwrap();
        for (id, callback) in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
                warn!(subscriber = id, "energy subscriber panicked during notification");
            }
        }
    }

    /// Register `callback` for every future publish. Snapshots published
    /// before subscribing are not replayed; read `current` for those.
    pub fn subscribe(&self, callback: impl Fn(&EnergySnapshot) + Send + 'static) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns `false` if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// The most recently published snapshot (or the initial zero snapshot).
    pub fn current(&self) -> EnergySnapshot {
        self.current.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
