use std::collections::HashSet;

use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;

use super::availability::{self, Tally};
use super::EngineError;

/// Read-only capacity view over a bookable product.
///
/// Only fixed- and dated-capacity products can be viewed this way; a
/// `Stocked` product is rejected at construction, so every method here can
/// assume the product has a capacity model. All figures come from the
/// functions in `availability`; the provider contributes its identity and
/// slot set.
pub struct CapacityProvider<'a> {
    product: &'a ProductState,
    config: &'a EngineConfig,
}

impl<'a> CapacityProvider<'a> {
    pub fn new(product: &'a ProductState, config: &'a EngineConfig) -> Result<Self, EngineError> {
        if !product.kind.is_bookable() {
            return Err(EngineError::NotBookable(product.id));
        }
        Ok(Self { product, config })
    }

    pub fn id(&self) -> Ulid {
        self.product.id
    }

    pub fn possible_units(&self, range: &TimeRange) -> i64 {
        availability::possible_units(self.product, range)
    }

    pub fn booked_units(&self, range: &TimeRange) -> i64 {
        availability::booked_units(self.product, range)
    }

    pub fn remaining_units(&self, range: &TimeRange) -> i64 {
        availability::remaining_units(self.product, range)
    }

    pub fn can_accept(&self, quantity: i64, range: &TimeRange) -> bool {
        availability::can_accept(self.product, quantity, range)
    }

    pub fn tally(&self, range: &TimeRange) -> Tally {
        Tally::compute(self.product, range)
    }

    /// Sentinel handed to stock tracking so its decrement logic never
    /// blocks a range-checked product.
    pub fn stock_level(&self) -> i64 {
        self.config.unlimited_stock_level
    }

    pub fn locks_cart(&self) -> bool {
        self.config.lock_cart
    }

    pub fn requires_delivery(&self) -> bool {
        self.config.allow_delivery && self.product.deliver_ticket
    }

    /// Slots that have not ended yet, in ascending start order.
    pub fn current_slots(&self, now: Ms) -> Vec<DateSlot> {
        self.product
            .slots
            .iter()
            .filter(|s| !s.is_past(now))
            .cloned()
            .collect()
    }

    /// Slots a customer must not pick: past, or with nothing left.
    pub fn disabled_slot_ids(&self, now: Ms) -> HashSet<Ulid> {
        self.product
            .slots
            .iter()
            .filter(|s| s.is_past(now) || availability::slot_remaining_units(self.product, s) <= 0)
            .map(|s| s.id)
            .collect()
    }

    pub fn slot_remaining_units(&self, slot: &DateSlot) -> i64 {
        availability::slot_remaining_units(self.product, slot)
    }
}
