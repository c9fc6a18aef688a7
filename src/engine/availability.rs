use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────
//
// Every query is a single range scan over the product's sorted bookings
// using the inclusive overlap predicate. Ranges are never expanded into days.

/// Sum of `quantity` over confirmed bookings overlapping `query`.
pub fn booked_units(product: &ProductState, query: &TimeRange) -> i64 {
    product
        .overlapping(query)
        .filter(|b| b.is_confirmed())
        .map(|b| b.quantity)
        .sum()
}

/// The slot whose range overlaps `query`. With several candidates the
/// earliest-starting one wins (`slots` is kept sorted by start).
pub fn resolve_slot<'a>(slots: &'a [DateSlot], query: &TimeRange) -> Option<&'a DateSlot> {
    slots.iter().find(|s| s.range.overlaps(query))
}

/// Total units that exist over `query`.
pub fn possible_units(product: &ProductState, query: &TimeRange) -> i64 {
    match product.kind {
        ProductKind::FixedCapacity { total_spaces } => total_spaces,
        ProductKind::DatedCapacity => {
            resolve_slot(&product.slots, query).map_or(0, |slot| slot.total_spaces)
        }
        ProductKind::Stocked => 0,
    }
}

/// Possible minus booked. Negative means overbooked and is reported as-is.
pub fn remaining_units(product: &ProductState, query: &TimeRange) -> i64 {
    possible_units(product, query) - booked_units(product, query)
}

pub fn can_accept(product: &ProductState, quantity: i64, query: &TimeRange) -> bool {
    remaining_units(product, query) - quantity >= 0
}

/// Remaining units for one slot, measured over the slot's own range.
pub fn slot_remaining_units(product: &ProductState, slot: &DateSlot) -> i64 {
    slot.total_spaces - booked_units(product, &slot.range)
}

/// All three figures for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub possible: i64,
    pub booked: i64,
    pub remaining: i64,
}

impl Tally {
    pub fn compute(product: &ProductState, query: &TimeRange) -> Self {
        let possible = possible_units(product, query);
        let booked = booked_units(product, query);
        Self {
            possible,
            booked,
            remaining: possible - booked,
        }
    }

    pub fn can_accept(&self, quantity: i64) -> bool {
        self.remaining - quantity >= 0
    }

    pub fn is_overbooked(&self) -> bool {
        self.remaining < 0
    }
}
