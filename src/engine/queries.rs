use std::collections::HashSet;

use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::availability::Tally;
use super::capacity::CapacityProvider;
use super::validate::validate_range;
use super::{Engine, EngineError};

impl Engine {
    /// Run `f` against the product's capacity view under its read lock.
    async fn with_provider<T>(
        &self,
        product_id: Ulid,
        f: impl FnOnce(&CapacityProvider<'_>) -> T,
    ) -> Result<T, EngineError> {
        let ps = self.product(&product_id)?;
        let guard = ps.read().await;
        let provider = CapacityProvider::new(&guard, &self.config)?;
        Ok(f(&provider))
    }

    async fn range_query<T>(
        &self,
        label: &'static str,
        product_id: Ulid,
        range: TimeRange,
        f: impl FnOnce(&CapacityProvider<'_>, &TimeRange) -> T,
    ) -> Result<T, EngineError> {
        validate_range(&range)?;
        metrics::counter!(observability::AVAILABILITY_QUERIES_TOTAL, "query" => label).increment(1);
        self.with_provider(product_id, |p| f(p, &range)).await
    }

    pub async fn possible_units(
        &self,
        product_id: Ulid,
        range: TimeRange,
    ) -> Result<i64, EngineError> {
        self.range_query("possible", product_id, range, |p, r| p.possible_units(r))
            .await
    }

    pub async fn booked_units(
        &self,
        product_id: Ulid,
        range: TimeRange,
    ) -> Result<i64, EngineError> {
        self.range_query("booked", product_id, range, |p, r| p.booked_units(r))
            .await
    }

    pub async fn remaining_units(
        &self,
        product_id: Ulid,
        range: TimeRange,
    ) -> Result<i64, EngineError> {
        self.range_query("remaining", product_id, range, |p, r| p.remaining_units(r))
            .await
    }

    /// Advisory only: nothing is reserved. `request_booking` repeats the
    /// check under the write lock.
    pub async fn can_accept(
        &self,
        product_id: Ulid,
        quantity: i64,
        range: TimeRange,
    ) -> Result<bool, EngineError> {
        if quantity < 0 {
            return Err(EngineError::NegativeQuantity(quantity));
        }
        self.range_query("can_accept", product_id, range, |p, r| p.can_accept(quantity, r))
            .await
    }

    pub async fn tally(&self, product_id: Ulid, range: TimeRange) -> Result<Tally, EngineError> {
        self.range_query("tally", product_id, range, |p, r| p.tally(r))
            .await
    }

    pub async fn stock_level(&self, product_id: Ulid) -> Result<i64, EngineError> {
        self.with_provider(product_id, |p| p.stock_level()).await
    }

    pub async fn locks_cart(&self, product_id: Ulid) -> Result<bool, EngineError> {
        self.with_provider(product_id, |p| p.locks_cart()).await
    }

    pub async fn requires_delivery(&self, product_id: Ulid) -> Result<bool, EngineError> {
        self.with_provider(product_id, |p| p.requires_delivery()).await
    }

    pub async fn current_slots(&self, product_id: Ulid) -> Result<Vec<DateSlot>, EngineError> {
        let now = self.clock.now_ms();
        self.with_provider(product_id, |p| p.current_slots(now)).await
    }

    pub async fn disabled_slot_ids(&self, product_id: Ulid) -> Result<HashSet<Ulid>, EngineError> {
        let now = self.clock.now_ms();
        self.with_provider(product_id, |p| p.disabled_slot_ids(now))
            .await
    }

    pub async fn slot_remaining_units(&self, slot_id: Ulid) -> Result<i64, EngineError> {
        let product_id = self
            .store
            .product_for_slot(&slot_id)
            .ok_or(EngineError::NotFound(slot_id))?;
        let ps = self.product(&product_id)?;
        let guard = ps.read().await;
        let slot = guard.slot(slot_id).ok_or(EngineError::NotFound(slot_id))?;
        let provider = CapacityProvider::new(&guard, &self.config)?;
        Ok(provider.slot_remaining_units(slot))
    }

    /// Stock check for a line item's booking: the unlimited sentinel when
    /// `quantity` still fits the booking's range, otherwise -1.
    pub async fn check_line_item_stock(
        &self,
        line_item_id: Ulid,
        quantity: i64,
    ) -> Result<i64, EngineError> {
        let booking_id = self
            .store
            .booking_for_line_item(&line_item_id)
            .ok_or(EngineError::NotFound(line_item_id))?;
        let booking = self
            .get_booking(&booking_id)
            .await
            .ok_or(EngineError::NotFound(booking_id))?;
        self.with_provider(booking.product_id, |p| {
            if p.can_accept(quantity, &booking.range) {
                p.stock_level()
            } else {
                -1
            }
        })
        .await
    }

    // ── Record lookups ───────────────────────────────────────

    pub async fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        let product_id = self.store.product_for_booking(id)?;
        let ps = self.store.get_product(&product_id)?;
        let guard = ps.read().await;
        guard.booking(*id).cloned()
    }

    pub async fn list_bookings(&self, product_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let ps = self.product(&product_id)?;
        let guard = ps.read().await;
        Ok(guard.bookings.clone())
    }

    pub async fn list_slots(&self, product_id: Ulid) -> Result<Vec<DateSlot>, EngineError> {
        let ps = self.product(&product_id)?;
        let guard = ps.read().await;
        Ok(guard.slots.clone())
    }

    /// Bookings overlapping `range` (inclusive), optionally of one status.
    pub async fn find_overlapping(
        &self,
        product_id: Ulid,
        range: TimeRange,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, EngineError> {
        validate_range(&range)?;
        let ps = self.product(&product_id)?;
        let guard = ps.read().await;
        Ok(guard
            .overlapping(&range)
            .filter(|b| status.is_none_or(|s| b.status == s))
            .cloned()
            .collect())
    }

    /// Bookings whose line items sit on the given document.
    pub async fn bookings_for_document(
        &self,
        document_id: Ulid,
    ) -> Result<Vec<Booking>, EngineError> {
        let doc = self
            .commerce
            .document(document_id)
            .await
            .map_err(|e| EngineError::SyncFailed(e.to_string()))?
            .ok_or(EngineError::NotFound(document_id))?;
        let mut bookings = Vec::new();
        for item_id in &doc.items {
            if let Some(booking_id) = self.store.booking_for_line_item(item_id)
                && let Some(booking) = self.get_booking(&booking_id).await
            {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }

    pub fn list_products(&self) -> Vec<Ulid> {
        self.store.product_ids()
    }
}
