use ulid::Ulid;

use crate::model::{BookingStatus, Ms};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The product exists but is not a capacity provider.
    NotBookable(Ulid),
    InvalidRange {
        start: Ms,
        end: Ms,
    },
    NegativeQuantity(i64),
    CapacityExceeded {
        requested: i64,
        remaining: i64,
    },
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Confirmed and cancelled bookings are kept for audit.
    Retained(Ulid),
    SlotMismatch {
        slot_id: Ulid,
        product_id: Ulid,
    },
    LimitExceeded(&'static str),
    SyncFailed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::NotBookable(id) => {
                write!(f, "product {id} is not a capacity provider")
            }
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: start {start} is after end {end}")
            }
            EngineError::NegativeQuantity(q) => write!(f, "quantity must not be negative: {q}"),
            EngineError::CapacityExceeded {
                requested,
                remaining,
            } => {
                write!(
                    f,
                    "cannot book {requested} spaces: only {remaining} remaining"
                )
            }
            EngineError::IllegalTransition { from, to } => {
                write!(f, "illegal status transition: {from:?} -> {to:?}")
            }
            EngineError::Retained(id) => {
                write!(f, "booking {id} is not pending and cannot be deleted")
            }
            EngineError::SlotMismatch {
                slot_id,
                product_id,
            } => write!(f, "date slot {slot_id} does not belong to product {product_id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::SyncFailed(e) => write!(f, "synchronization failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
