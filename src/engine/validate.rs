use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_range(range: &TimeRange) -> Result<(), EngineError> {
    if range.start > range.end {
        return Err(EngineError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    if range.start < MIN_VALID_TIMESTAMP_MS || range.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    // Same cap for bookings, slots and queries: anything stored can be measured.
    if range.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("range too wide"));
    }
    Ok(())
}

pub(crate) fn validate_quantity(quantity: i64) -> Result<(), EngineError> {
    if quantity < 0 {
        return Err(EngineError::NegativeQuantity(quantity));
    }
    if quantity > MAX_QUANTITY {
        return Err(EngineError::LimitExceeded("quantity too large"));
    }
    Ok(())
}

pub(crate) fn validate_booking(booking: &Booking) -> Result<(), EngineError> {
    validate_range(&booking.range)?;
    validate_quantity(booking.quantity)?;
    if booking.special_instructions.len() > MAX_INSTRUCTIONS_LEN {
        return Err(EngineError::LimitExceeded("special instructions too long"));
    }
    Ok(())
}

pub(crate) fn validate_name(name: Option<&str>) -> Result<(), EngineError> {
    if name.is_some_and(|n| n.len() > MAX_NAME_LEN) {
        return Err(EngineError::LimitExceeded("product name too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_at_width_cap_is_valid() {
        assert!(validate_range(&TimeRange::new(0, MAX_QUERY_WINDOW_MS)).is_ok());
        assert_eq!(
            validate_range(&TimeRange::new(0, MAX_QUERY_WINDOW_MS + 1)),
            Err(EngineError::LimitExceeded("range too wide"))
        );
    }

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(
            validate_range(&TimeRange { start: 10, end: 5 }),
            Err(EngineError::InvalidRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn instructions_length_capped() {
        let mut b = Booking::new(ulid::Ulid::new(), ulid::Ulid::new(), TimeRange::new(0, 1), 1);
        b.special_instructions = "x".repeat(MAX_INSTRUCTIONS_LEN);
        assert!(validate_booking(&b).is_ok());
        b.special_instructions.push('x');
        assert!(matches!(validate_booking(&b), Err(EngineError::LimitExceeded(_))));
    }
}
