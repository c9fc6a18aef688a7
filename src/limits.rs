use crate::model::Ms;

pub const MAX_PRODUCTS: usize = 100_000;
pub const MAX_SLOTS_PER_PRODUCT: usize = 10_000;
pub const MAX_BOOKINGS_PER_PRODUCT: usize = 1_000_000;

/// Largest number of units a single booking may hold.
pub const MAX_QUANTITY: i64 = 1_000_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_INSTRUCTIONS_LEN: usize = 4096;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Widest range a booking, slot or availability query may cover (~10 years).
pub const MAX_QUERY_WINDOW_MS: Ms = 10 * 366 * 24 * 3_600_000;
