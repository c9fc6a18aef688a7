use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::SharedProductState;

/// In-memory record store: per-product state plus reverse indexes so a
/// booking, slot or line item can be resolved to the product that owns it.
pub struct InMemoryStore {
    products: DashMap<Ulid, SharedProductState>,
    booking_to_product: DashMap<Ulid, Ulid>,
    slot_to_product: DashMap<Ulid, Ulid>,
    line_item_to_booking: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            booking_to_product: DashMap::new(),
            slot_to_product: DashMap::new(),
            line_item_to_booking: DashMap::new(),
        }
    }

    // ── Products ─────────────────────────────────────────────

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn contains_product(&self, id: &Ulid) -> bool {
        self.products.contains_key(id)
    }

    pub fn get_product(&self, id: &Ulid) -> Option<SharedProductState> {
        self.products.get(id).map(|e| e.value().clone())
    }

    pub fn insert_product(&self, id: Ulid, state: SharedProductState) {
        self.products.insert(id, state);
    }

    pub fn product_ids(&self) -> Vec<Ulid> {
        self.products.iter().map(|e| *e.key()).collect()
    }

    // ── Indexes ──────────────────────────────────────────────

    pub fn product_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_product.get(booking_id).map(|e| *e.value())
    }

    pub fn product_for_slot(&self, slot_id: &Ulid) -> Option<Ulid> {
        self.slot_to_product.get(slot_id).map(|e| *e.value())
    }

    pub fn booking_for_line_item(&self, line_item_id: &Ulid) -> Option<Ulid> {
        self.line_item_to_booking.get(line_item_id).map(|e| *e.value())
    }

    // ── Event application ────────────────────────────────────

    /// Apply a change to a product (caller holds its write lock) and keep
    /// the reverse indexes in step.
    pub fn apply_event(&self, ps: &mut ProductState, event: &Event) {
        match event {
            Event::SlotAdded { slot } => {
                ps.upsert_slot(slot.clone());
                self.slot_to_product.insert(slot.id, slot.product_id);
            }
            Event::SlotRemoved { id, .. } => {
                ps.remove_slot(*id);
                self.slot_to_product.remove(id);
            }
            Event::BookingSaved { booking } => {
                if let Some(old) = ps.booking(booking.id)
                    && let Some(old_item) = old.line_item_id
                    && booking.line_item_id != Some(old_item)
                {
                    self.line_item_to_booking.remove(&old_item);
                }
                ps.upsert_booking(booking.clone());
                self.booking_to_product.insert(booking.id, booking.product_id);
                if let Some(item) = booking.line_item_id {
                    self.line_item_to_booking.insert(item, booking.id);
                }
            }
            Event::BookingDeleted { id, product_id } => {
                if let Some(removed) = ps.remove_booking(*id) {
                    if let Some(item) = removed.line_item_id {
                        self.line_item_to_booking.remove(&item);
                    }
                    // A booking moved to another product keeps its index entry.
                    self.booking_to_product
                        .remove_if(id, |_, owner| owner == product_id);
                }
            }
            // Registration is handled at the DashMap level, not here
            Event::ProductRegistered { .. } => {}
        }
    }
}
