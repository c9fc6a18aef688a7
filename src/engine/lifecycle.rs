//! Booking state machine and the rules applied to every save.

use crate::commerce::CommerceDocument;
use crate::model::*;

use super::EngineError;

impl Booking {
    pub fn mark_pending(&mut self) -> Result<(), EngineError> {
        self.transition(BookingStatus::Pending)
    }

    pub fn mark_confirmed(&mut self) -> Result<(), EngineError> {
        self.transition(BookingStatus::Confirmed)
    }

    pub fn mark_cancelled(&mut self) -> Result<(), EngineError> {
        self.transition(BookingStatus::Cancelled)
    }

    /// Set `status` if the move is legal. Cancelled is terminal.
    pub fn transition(&mut self, to: BookingStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(to) {
            return Err(EngineError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Validate the status move from the stored booking (if any) to the one
/// being saved. Returns true when this save confirms the booking.
pub(crate) fn check_transition(
    previous: Option<BookingStatus>,
    next: BookingStatus,
) -> Result<bool, EngineError> {
    let from = previous.unwrap_or(BookingStatus::Pending);
    if !from.can_transition_to(next) {
        return Err(EngineError::IllegalTransition { from, to: next });
    }
    Ok(next == BookingStatus::Confirmed && previous != Some(BookingStatus::Confirmed))
}

/// The slot is authoritative: its range replaces whatever was entered.
pub(crate) fn apply_slot(booking: &mut Booking, slot: &DateSlot) {
    booking.range = slot.range;
}

/// Copy instructions from the linked document when it has some and the
/// booking's copy is empty or differs.
pub(crate) fn pull_instructions(
    booking: &mut Booking,
    document: Option<&CommerceDocument>,
) -> bool {
    let Some(instructions) = document.and_then(|d| d.special_instructions.as_deref()) else {
        return false;
    };
    if instructions.is_empty() || booking.special_instructions == instructions {
        return false;
    }
    booking.special_instructions = instructions.to_string();
    true
}
