use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{self, status_label};

use super::availability::Tally;
use super::capacity::CapacityProvider;
use super::lifecycle;
use super::sync::{linked_document, SyncReport, Synchronizer};
use super::validate::{validate_booking, validate_name, validate_quantity, validate_range};
use super::{Engine, EngineError};

/// A customer or administrator asking for units of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub product_id: Ulid,
    /// Ignored when `slot_id` is set: the slot's range is used instead.
    pub range: TimeRange,
    pub quantity: i64,
    pub customer_id: Option<Ulid>,
    pub slot_id: Option<Ulid>,
    pub special_instructions: String,
    pub status: BookingStatus,
    /// Administrative override: accept even when capacity is short.
    pub allow_overbook: bool,
}

impl BookingRequest {
    pub fn new(product_id: Ulid, range: TimeRange, quantity: i64) -> Self {
        Self {
            product_id,
            range,
            quantity,
            customer_id: None,
            slot_id: None,
            special_instructions: String::new(),
            status: BookingStatus::Pending,
            allow_overbook: false,
        }
    }

    pub fn for_slot(product_id: Ulid, slot_id: Ulid, quantity: i64) -> Self {
        Self {
            slot_id: Some(slot_id),
            ..Self::new(product_id, TimeRange::new(0, 0), quantity)
        }
    }

    pub fn customer(mut self, customer_id: Ulid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.special_instructions = text.into();
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.status = BookingStatus::Confirmed;
        self
    }

    pub fn allow_overbook(mut self) -> Self {
        self.allow_overbook = true;
        self
    }
}

impl Engine {
    // ── Product administration ───────────────────────────────

    pub async fn register_product(
        &self,
        id: Ulid,
        name: Option<String>,
        kind: ProductKind,
        deliver_ticket: bool,
    ) -> Result<(), EngineError> {
        if self.store.product_count() >= MAX_PRODUCTS {
            return Err(EngineError::LimitExceeded("too many products"));
        }
        validate_name(name.as_deref())?;
        if let ProductKind::FixedCapacity { total_spaces } = kind {
            validate_quantity(total_spaces)?;
        }
        if self.store.contains_product(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let mut ps = ProductState::new(id, name, kind, deliver_ticket);
        let event = Event::ProductRegistered { id, kind };
        self.commit(&mut ps, event);
        self.store.insert_product(id, Arc::new(RwLock::new(ps)));
        info!(product = %id, ?kind, "registered product");
        Ok(())
    }

    pub async fn add_slot(&self, slot: DateSlot) -> Result<(), EngineError> {
        validate_range(&slot.range)?;
        validate_quantity(slot.total_spaces)?;
        if let Some(owner) = self.store.product_for_slot(&slot.id)
            && owner != slot.product_id
        {
            return Err(EngineError::AlreadyExists(slot.id));
        }
        let ps = self.product(&slot.product_id)?;
        let mut guard = ps.write().await;
        if guard.kind != ProductKind::DatedCapacity {
            return Err(EngineError::NotBookable(slot.product_id));
        }
        if guard.slot(slot.id).is_none() && guard.slots.len() >= MAX_SLOTS_PER_PRODUCT {
            return Err(EngineError::LimitExceeded("too many slots on product"));
        }

        debug!(slot = %slot.id, product = %slot.product_id, "slot added");
        self.commit(&mut guard, Event::SlotAdded { slot });
        Ok(())
    }

    pub async fn remove_slot(&self, slot_id: Ulid) -> Result<DateSlot, EngineError> {
        let product_id = self
            .store
            .product_for_slot(&slot_id)
            .ok_or(EngineError::NotFound(slot_id))?;
        let ps = self.product(&product_id)?;
        let mut guard = ps.write().await;
        let slot = guard
            .slot(slot_id)
            .cloned()
            .ok_or(EngineError::NotFound(slot_id))?;
        self.commit(&mut guard, Event::SlotRemoved { id: slot_id, product_id });
        Ok(slot)
    }

    // ── Booking requests ─────────────────────────────────────

    /// Check capacity and create the booking under one product write lock.
    pub async fn request_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        validate_quantity(req.quantity)?;
        let ps = self.product(&req.product_id)?;
        let mut guard = ps.write().await;
        let provider = CapacityProvider::new(&guard, &self.config)?;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_PRODUCT {
            return Err(EngineError::LimitExceeded("too many bookings on product"));
        }

        let range = match req.slot_id {
            Some(slot_id) => self.slot_in(&guard, slot_id)?.range,
            None => req.range,
        };
        validate_range(&range)?;

        let tally = provider.tally(&range);
        metrics::counter!(observability::AVAILABILITY_QUERIES_TOTAL, "query" => "request")
            .increment(1);
        if !tally.can_accept(req.quantity) {
            if !req.allow_overbook {
                metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                info!(
                    product = %req.product_id,
                    requested = req.quantity,
                    remaining = tally.remaining,
                    "booking request rejected"
                );
                return Err(EngineError::CapacityExceeded {
                    requested: req.quantity,
                    remaining: tally.remaining,
                });
            }
            warn!(
                product = %req.product_id,
                requested = req.quantity,
                remaining = tally.remaining,
                "accepting booking beyond capacity"
            );
        }

        let mut booking = Booking::new(Ulid::new(), req.product_id, range, req.quantity);
        booking.customer_id = req.customer_id;
        booking.slot_id = req.slot_id;
        booking.special_instructions = req.special_instructions;
        booking.status = req.status;

        let (booking, _) = self.prepare(&guard, None, booking).await?;
        self.commit_booking(&mut guard, booking.clone(), None);
        Ok(booking)
    }

    /// Save an edited (or brand new) booking through the full pipeline.
    ///
    /// Capacity is NOT checked here: overbooked states are representable and
    /// show up as negative remaining units. Use `request_booking` or
    /// `change_quantity` where a refusal is wanted.
    pub async fn save_booking(&self, booking: Booking) -> Result<Booking, EngineError> {
        if let Some(owner) = self.store.product_for_booking(&booking.id)
            && owner != booking.product_id
        {
            return self.move_booking(owner, booking).await;
        }

        let ps = self.product(&booking.product_id)?;
        let mut guard = ps.write().await;
        let previous = guard.booking(booking.id).cloned();
        if previous.is_none() && guard.bookings.len() >= MAX_BOOKINGS_PER_PRODUCT {
            return Err(EngineError::LimitExceeded("too many bookings on product"));
        }
        let (saved, _) = self.prepare(&guard, previous.as_ref(), booking).await?;
        self.commit_booking(&mut guard, saved.clone(), previous.map(|p| p.status));
        Ok(saved)
    }

    /// Re-home a booking on another product, holding both write locks.
    async fn move_booking(&self, from: Ulid, booking: Booking) -> Result<Booking, EngineError> {
        let to = booking.product_id;
        let old_ps = self.product(&from)?;
        let new_ps = self.product(&to)?;

        // Acquire write locks in sorted order to prevent deadlocks.
        let (mut old_guard, mut new_guard) = if from < to {
            let o = old_ps.write_owned().await;
            let n = new_ps.write_owned().await;
            (o, n)
        } else {
            let n = new_ps.write_owned().await;
            let o = old_ps.write_owned().await;
            (o, n)
        };

        let previous = old_guard
            .booking(booking.id)
            .cloned()
            .ok_or(EngineError::NotFound(booking.id))?;
        let (saved, _) = self.prepare(&new_guard, Some(&previous), booking).await?;

        self.commit(
            &mut old_guard,
            Event::BookingDeleted {
                id: saved.id,
                product_id: from,
            },
        );
        self.commit_booking(&mut new_guard, saved.clone(), Some(previous.status));
        info!(booking = %saved.id, %from, %to, "booking moved to another product");
        Ok(saved)
    }

    // ── Status changes ───────────────────────────────────────

    pub async fn set_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let (mut booking, mut guard) = self.resolve_booking_write(&id).await?;
        let previous = booking.clone();
        booking.transition(status)?;
        let (saved, _) = self.prepare(&guard, Some(&previous), booking).await?;
        self.commit_booking(&mut guard, saved.clone(), Some(previous.status));
        Ok(saved)
    }

    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Confirmed).await
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Cancelled).await
    }

    pub async fn mark_pending(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Pending).await
    }

    /// Change how many units a booking holds. Increases are checked against
    /// the units they would newly commit.
    pub async fn change_quantity(
        &self,
        id: Ulid,
        quantity: i64,
        allow_overbook: bool,
    ) -> Result<Booking, EngineError> {
        validate_quantity(quantity)?;
        let (mut booking, mut guard) = self.resolve_booking_write(&id).await?;
        let previous = booking.clone();

        if quantity > previous.quantity {
            // Pending bookings hold nothing yet; confirmed ones already count.
            let additional = match previous.status {
                BookingStatus::Pending => quantity,
                BookingStatus::Confirmed => quantity - previous.quantity,
                BookingStatus::Cancelled => 0,
            };
            let tally = Tally::compute(&guard, &previous.range);
            if !tally.can_accept(additional) && !allow_overbook {
                metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                return Err(EngineError::CapacityExceeded {
                    requested: additional,
                    remaining: tally.remaining,
                });
            }
        }

        booking.quantity = quantity;
        let (saved, _) = self.prepare(&guard, Some(&previous), booking).await?;
        self.commit_booking(&mut guard, saved.clone(), Some(previous.status));
        Ok(saved)
    }

    // ── Deletion ─────────────────────────────────────────────

    /// Delete a pending booking and its line item. Confirmed and cancelled
    /// bookings are retained.
    pub async fn delete_booking(&self, id: Ulid) -> Result<(), EngineError> {
        let (booking, mut guard) = self.resolve_booking_write(&id).await?;
        if !booking.is_pending() {
            return Err(EngineError::Retained(id));
        }
        if let Some(item_id) = booking.line_item_id {
            self.remove_line_item(item_id).await?;
        }
        let product_id = booking.product_id;
        self.commit(&mut guard, Event::BookingDeleted { id, product_id });
        metrics::counter!(observability::BOOKINGS_DELETED_TOTAL).increment(1);
        info!(booking = %id, "booking deleted");
        Ok(())
    }

    /// Cascade from the commerce layer: a deleted line item takes its
    /// booking with it while that booking is still pending.
    pub async fn line_item_deleted(&self, line_item_id: Ulid) -> Result<bool, EngineError> {
        let Some(booking_id) = self.store.booking_for_line_item(&line_item_id) else {
            return Ok(false);
        };
        let (booking, mut guard) = self.resolve_booking_write(&booking_id).await?;
        if booking.line_item_id != Some(line_item_id) {
            return Ok(false);
        }
        if !booking.is_pending() {
            info!(
                booking = %booking_id,
                status = ?booking.status,
                "line item deleted, booking retained"
            );
            return Ok(false);
        }
        let product_id = booking.product_id;
        self.commit(&mut guard, Event::BookingDeleted { id: booking_id, product_id });
        metrics::counter!(observability::BOOKINGS_DELETED_TOTAL).increment(1);
        info!(booking = %booking_id, item = %line_item_id, "line item deleted, booking removed");
        Ok(true)
    }

    /// Mark a document paid and confirm every booking attached to it.
    /// Returns the ids of bookings confirmed by this call.
    pub async fn document_paid(&self, document_id: Ulid) -> Result<Vec<Ulid>, EngineError> {
        let mut doc = self
            .commerce
            .document(document_id)
            .await
            .map_err(|e| EngineError::SyncFailed(e.to_string()))?
            .ok_or(EngineError::NotFound(document_id))?;
        if !doc.is_paid() {
            doc.paid = true;
            self.commerce
                .update_document(doc.clone())
                .await
                .map_err(|e| EngineError::SyncFailed(e.to_string()))?;
        }

        let mut confirmed = Vec::new();
        for item_id in &doc.items {
            let Some(booking_id) = self.store.booking_for_line_item(item_id) else {
                continue;
            };
            if self
                .get_booking(&booking_id)
                .await
                .is_none_or(|b| b.is_confirmed())
            {
                continue;
            }
            match self.confirm_booking(booking_id).await {
                Ok(_) => confirmed.push(booking_id),
                // Cancelled bookings stay cancelled.
                Err(EngineError::IllegalTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        info!(document = %document_id, confirmed = confirmed.len(), "document paid");
        Ok(confirmed)
    }

    // ── Save pipeline ────────────────────────────────────────

    /// Everything a save does before it is committed. Validation runs after
    /// the instruction pull so copied text is length-checked as well.
    /// Nothing is committed here; on error the product state is untouched.
    async fn prepare(
        &self,
        product: &ProductState,
        previous: Option<&Booking>,
        mut booking: Booking,
    ) -> Result<(Booking, SyncReport), EngineError> {
        if !product.kind.is_bookable() {
            return Err(EngineError::NotBookable(product.id));
        }
        if let Some(slot_id) = booking.slot_id {
            let slot = self.slot_in(product, slot_id)?;
            lifecycle::apply_slot(&mut booking, slot);
        }
        self.reconcile_line_item(&mut booking, previous)?;
        let confirming = lifecycle::check_transition(previous.map(|b| b.status), booking.status)?;

        let document = linked_document(self.commerce.as_ref(), &booking)
            .await
            .map_err(|e| EngineError::SyncFailed(e.to_string()))?;
        if lifecycle::pull_instructions(&mut booking, document.as_ref()) {
            debug!(booking = %booking.id, "special instructions copied from document");
        }
        validate_booking(&booking)?;

        let started = std::time::Instant::now();
        let result = Synchronizer::new(self.commerce.as_ref())
            .run(&mut booking, confirming)
            .await;
        metrics::histogram!(observability::SYNC_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(report) => {
                metrics::counter!(observability::SYNC_WRITES_TOTAL).increment(report.writes as u64);
                if report.promoted {
                    info!(booking = %booking.id, "document promoted to final");
                }
                Ok((booking, report))
            }
            Err(e) => {
                metrics::counter!(observability::SYNC_FAILURES_TOTAL).increment(1);
                Err(e)
            }
        }
    }

    fn commit_booking(
        &self,
        ps: &mut ProductState,
        booking: Booking,
        previous: Option<BookingStatus>,
    ) {
        let id = booking.id;
        let status = booking.status;
        self.commit(ps, Event::BookingSaved { booking });
        metrics::counter!(observability::BOOKINGS_SAVED_TOTAL, "status" => status_label(status))
            .increment(1);
        if previous != Some(status) {
            info!(booking = %id, status = self.config.statuses.label(status), "booking saved");
        } else {
            debug!(booking = %id, "booking saved");
        }
    }

    /// The line item reference is owned by the synchronizer. A stored
    /// booking keeps the one it has; a new booking may not claim one that
    /// already belongs to another booking.
    fn reconcile_line_item(
        &self,
        booking: &mut Booking,
        previous: Option<&Booking>,
    ) -> Result<(), EngineError> {
        match previous {
            Some(prev) => {
                if booking.line_item_id != prev.line_item_id {
                    debug!(booking = %booking.id, "ignoring edited line item reference");
                }
                booking.line_item_id = prev.line_item_id;
            }
            None => {
                if let Some(item_id) = booking.line_item_id
                    && self
                        .store
                        .booking_for_line_item(&item_id)
                        .is_some_and(|owner| owner != booking.id)
                {
                    return Err(EngineError::AlreadyExists(item_id));
                }
            }
        }
        Ok(())
    }

    pub(super) fn slot_in<'p>(
        &self,
        product: &'p ProductState,
        slot_id: Ulid,
    ) -> Result<&'p DateSlot, EngineError> {
        if let Some(slot) = product.slot(slot_id) {
            return Ok(slot);
        }
        match self.store.product_for_slot(&slot_id) {
            Some(_) => Err(EngineError::SlotMismatch {
                slot_id,
                product_id: product.id,
            }),
            None => Err(EngineError::NotFound(slot_id)),
        }
    }

    /// Detach a line item from its document and delete it. The document
    /// edit is undone if the delete fails.
    async fn remove_line_item(&self, item_id: Ulid) -> Result<(), EngineError> {
        let sync_err = |e: crate::commerce::CommerceError| EngineError::SyncFailed(e.to_string());
        let Some(item) = self.commerce.line_item(item_id).await.map_err(sync_err)? else {
            return Ok(());
        };
        let mut restore = None;
        if let Some(doc_id) = item.document_id
            && let Some(mut doc) = self.commerce.document(doc_id).await.map_err(sync_err)?
            && doc.items.contains(&item_id)
        {
            let previous = doc.clone();
            doc.items.retain(|i| *i != item_id);
            self.commerce.update_document(doc).await.map_err(sync_err)?;
            restore = Some(previous);
        }
        if let Err(e) = self.commerce.delete_line_item(item_id).await {
            if let Some(doc) = restore
                && let Err(undo) = self.commerce.update_document(doc).await
            {
                warn!(item = %item_id, "failed to restore document after delete error: {undo}");
            }
            return Err(sync_err(e));
        }
        Ok(())
    }
}
