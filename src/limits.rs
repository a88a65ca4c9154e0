use crate::model::{DAY_MS, Ms};

pub const MAX_HOTELS_PER_TENANT: usize = 10_000;
pub const MAX_ROOMS_PER_TENANT: usize = 100_000;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 50_000;

/// Hotel, room and category names.
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_ADDRESS_LEN: usize = 100;
pub const MAX_GUEST_NAME_LEN: usize = 50;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;

/// A single reservation may not run longer than a year.
pub const MAX_RESERVATION_SPAN_MS: Ms = 366 * DAY_MS;
/// Availability searches may look up to ten years wide.
pub const MAX_QUERY_WINDOW_MS: Ms = 3660 * DAY_MS;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 128;
