//! Booking availability and overlap engine.
//!
//! Products with a finite capacity (a fixed number of spaces, or spaces per
//! date slot) are booked over closed time ranges. The engine answers how
//! many units are possible, booked and remaining for any range, accepts or
//! refuses requests, drives each booking through pending → confirmed →
//! cancelled, and mirrors bookings into an external order/invoice layer.

pub mod clock;
pub mod commerce;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;

pub use engine::{BookingRequest, Engine, EngineError};
