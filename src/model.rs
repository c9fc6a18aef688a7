use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

/// Closed interval `[start, end]`. Both boundaries belong to the range, so a
/// zero-length range (`start == end`) still covers one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Ms,
    pub end: Ms,
}

impl TimeRange {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "TimeRange start must not be after end");
        Self { start, end }
    }

    /// Like `new`, but returns `None` for an inverted range instead of asserting.
    pub fn checked(start: Ms, end: Ms) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Inclusive intersection: touching boundaries count as overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t <= self.end
    }
}

/// One schedulable occurrence of a dated-capacity product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSlot {
    pub id: Ulid,
    pub product_id: Ulid,
    pub range: TimeRange,
    pub total_spaces: i64,
}

impl DateSlot {
    /// A slot is past once its end instant lies strictly before `now`.
    pub fn is_past(&self, now: Ms) -> bool {
        self.range.end < now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Legal moves: Pending→Confirmed, Pending→Cancelled, Confirmed→Cancelled.
    /// Re-applying the current status is allowed and changes nothing.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Confirmed, Confirmed)
                | (Cancelled, Cancelled)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == BookingStatus::Cancelled
    }
}

/// A reservation of `quantity` units of a product over `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub product_id: Ulid,
    pub customer_id: Option<Ulid>,
    /// Created lazily by the synchronizer on first save.
    pub line_item_id: Option<Ulid>,
    pub range: TimeRange,
    pub quantity: i64,
    pub status: BookingStatus,
    pub special_instructions: String,
    pub slot_id: Option<Ulid>,
}

impl Booking {
    pub fn new(id: Ulid, product_id: Ulid, range: TimeRange, quantity: i64) -> Self {
        Self {
            id,
            product_id,
            customer_id: None,
            line_item_id: None,
            range,
            quantity,
            status: BookingStatus::Pending,
            special_instructions: String::new(),
            slot_id: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// Which products can be booked, and how their capacity is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    /// Ordinary stock-tracked product. Not a capacity provider.
    Stocked,
    /// Constant capacity over every range.
    FixedCapacity { total_spaces: i64 },
    /// Capacity defined per date slot.
    DatedCapacity,
}

impl ProductKind {
    pub fn is_bookable(&self) -> bool {
        !matches!(self, ProductKind::Stocked)
    }
}

#[derive(Debug, Clone)]
pub struct ProductState {
    pub id: Ulid,
    pub name: Option<String>,
    pub kind: ProductKind,
    /// Whether something physical (e.g. a ticket) must be delivered.
    pub deliver_ticket: bool,
    /// Date slots, sorted by `range.start`. Empty unless `DatedCapacity`.
    pub slots: Vec<DateSlot>,
    /// Every booking against this product, sorted by `range.start`.
    pub bookings: Vec<Booking>,
}

impl ProductState {
    pub fn new(id: Ulid, name: Option<String>, kind: ProductKind, deliver_ticket: bool) -> Self {
        Self {
            id,
            name,
            kind,
            deliver_ticket,
            slots: Vec::new(),
            bookings: Vec::new(),
        }
    }

    /// Insert or replace a booking, keeping sort order by range start.
    pub fn upsert_booking(&mut self, booking: Booking) {
        self.remove_booking(booking.id);
        let pos = self
            .bookings
            .partition_point(|b| b.range.start <= booking.range.start);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings whose range overlaps `query` (inclusive on both ends).
    /// Binary search skips everything starting after `query.end`.
    pub fn overlapping(&self, query: &TimeRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start <= query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end >= query.start)
    }

    /// Insert or replace a slot, keeping sort order by range start.
    pub fn upsert_slot(&mut self, slot: DateSlot) {
        self.remove_slot(slot.id);
        let pos = self
            .slots
            .partition_point(|s| s.range.start <= slot.range.start);
        self.slots.insert(pos, slot);
    }

    pub fn remove_slot(&mut self, id: Ulid) -> Option<DateSlot> {
        let pos = self.slots.iter().position(|s| s.id == id)?;
        Some(self.slots.remove(pos))
    }

    pub fn slot(&self, id: Ulid) -> Option<&DateSlot> {
        self.slots.iter().find(|s| s.id == id)
    }
}

/// Change notifications published per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProductRegistered {
        id: Ulid,
        kind: ProductKind,
    },
    SlotAdded {
        slot: DateSlot,
    },
    SlotRemoved {
        id: Ulid,
        product_id: Ulid,
    },
    BookingSaved {
        booking: Booking,
    },
    BookingDeleted {
        id: Ulid,
        product_id: Ulid,
    },
}

impl Event {
    pub fn product_id(&self) -> Ulid {
        match self {
            Event::ProductRegistered { id, .. } => *id,
            Event::SlotAdded { slot } => slot.product_id,
            Event::SlotRemoved { product_id, .. } | Event::BookingDeleted { product_id, .. } => {
                *product_id
            }
            Event::BookingSaved { booking } => booking.product_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booked(start: Ms, end: Ms) -> Booking {
        Booking::new(Ulid::new(), Ulid::new(), TimeRange::new(start, end), 1)
    }

    #[test]
    fn range_basics() {
        let r = TimeRange::new(100, 200);
        assert_eq!(r.duration_ms(), 100);
        assert!(r.contains_instant(100));
        assert!(r.contains_instant(200)); // closed
        assert!(!r.contains_instant(201));
        assert!(TimeRange::checked(200, 100).is_none());
        assert_eq!(TimeRange::checked(100, 100), Some(TimeRange::new(100, 100)));
    }

    #[test]
    fn range_overlap_is_inclusive() {
        let a = TimeRange::new(100, 200);
        let touching = TimeRange::new(200, 300);
        let apart = TimeRange::new(201, 300);
        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn range_overlap_symmetric() {
        let ranges = [
            TimeRange::new(0, 10),
            TimeRange::new(5, 5),
            TimeRange::new(10, 20),
            TimeRange::new(11, 12),
            TimeRange::new(-5, 30),
        ];
        for a in &ranges {
            for b in &ranges {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn zero_length_range_matches_either_boundary() {
        let instant = TimeRange::new(200, 200);
        assert!(instant.overlaps(&TimeRange::new(100, 200)));
        assert!(instant.overlaps(&TimeRange::new(200, 300)));
        assert!(!instant.overlaps(&TimeRange::new(201, 300)));
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn bookings_kept_sorted() {
        let mut ps = ProductState::new(
            Ulid::new(),
            None,
            ProductKind::FixedCapacity { total_spaces: 1 },
            false,
        );
        ps.upsert_booking(booked(300, 400));
        ps.upsert_booking(booked(100, 200));
        ps.upsert_booking(booked(200, 300));
        let starts: Vec<Ms> = ps.bookings.iter().map(|b| b.range.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn upsert_moves_edited_booking() {
        let mut ps = ProductState::new(Ulid::new(), None, ProductKind::DatedCapacity, false);
        let mut b = booked(100, 200);
        ps.upsert_booking(b.clone());
        ps.upsert_booking(booked(300, 400));
        b.range = TimeRange::new(500, 600);
        ps.upsert_booking(b.clone());
        assert_eq!(ps.bookings.len(), 2);
        assert_eq!(ps.bookings[1].id, b.id);
    }

    #[test]
    fn overlapping_counts_touching_boundaries() {
        let mut ps = ProductState::new(
            Ulid::new(),
            None,
            ProductKind::FixedCapacity { total_spaces: 1 },
            false,
        );
        ps.upsert_booking(booked(100, 200));
        ps.upsert_booking(booked(300, 400));
        ps.upsert_booking(booked(1000, 1100));

        let hits: Vec<_> = ps.overlapping(&TimeRange::new(200, 300)).collect();
        assert_eq!(hits.len(), 2);

        let hits: Vec<_> = ps.overlapping(&TimeRange::new(201, 299)).collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn overlapping_large_booking_spanning_query() {
        let mut ps = ProductState::new(
            Ulid::new(),
            None,
            ProductKind::FixedCapacity { total_spaces: 1 },
            false,
        );
        ps.upsert_booking(booked(0, 10_000));
        assert_eq!(ps.overlapping(&TimeRange::new(500, 600)).count(), 1);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut ps = ProductState::new(Ulid::new(), None, ProductKind::DatedCapacity, false);
        ps.upsert_booking(booked(100, 200));
        assert!(ps.remove_booking(Ulid::new()).is_none());
        assert_eq!(ps.bookings.len(), 1);
    }

    #[test]
    fn event_names_its_product() {
        let b = booked(0, 1);
        let event = Event::BookingSaved { booking: b.clone() };
        assert_eq!(event.product_id(), b.product_id);
        let json = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
