mod availability;
mod capacity;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;
mod sync;
mod validate;

pub use availability::{
    booked_units, can_accept, possible_units, remaining_units, resolve_slot, slot_remaining_units,
    Tally,
};
pub use capacity::CapacityProvider;
pub use error::EngineError;
pub use mutations::BookingRequest;
pub use store::InMemoryStore;
pub use sync::{linked_document, SyncReport, Synchronizer};

use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::commerce::CommerceLayer;
use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedProductState = Arc<RwLock<ProductState>>;

/// Booking availability and lifecycle engine.
///
/// Each product's state sits behind its own `RwLock`. Availability queries
/// take the read lock; every booking mutation takes the write lock for the
/// whole check-then-write sequence, so concurrent requests against the same
/// product are serialised and cannot both spend the last units.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) commerce: Arc<dyn CommerceLayer>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: EngineConfig,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(config: EngineConfig, commerce: Arc<dyn CommerceLayer>) -> Self {
        Self {
            store: InMemoryStore::new(),
            commerce,
            clock: Arc::new(SystemClock),
            config,
            notify: Arc::new(NotifyHub::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notify(mut self, notify: Arc<NotifyHub>) -> Self {
        self.notify = notify;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    pub fn get_product(&self, id: &Ulid) -> Option<SharedProductState> {
        self.store.get_product(id)
    }

    pub(super) fn product(&self, id: &Ulid) -> Result<SharedProductState, EngineError> {
        self.store.get_product(id).ok_or(EngineError::NotFound(*id))
    }

    /// Apply + notify in one call.
    pub(super) fn commit(&self, ps: &mut ProductState, event: Event) {
        self.store.apply_event(ps, &event);
        self.notify.send(&event);
    }

    /// Lookup booking → product, acquire the product's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Booking, tokio::sync::OwnedRwLockWriteGuard<ProductState>), EngineError> {
        let product_id = self
            .store
            .product_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let ps = self.product(&product_id)?;
        let guard = ps.write_owned().await;
        // The booking may have moved while we waited for the lock.
        let booking = guard
            .booking(*booking_id)
            .cloned()
            .ok_or(EngineError::NotFound(*booking_id))?;
        Ok((booking, guard))
    }
}
