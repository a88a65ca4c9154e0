use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Room category. Anything that isn't one of the well-known labels is kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCategory {
    Standard,
    Deluxe,
    Suite,
    Other(String),
}

impl RoomCategory {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        match label.to_lowercase().as_str() {
            "standard" => RoomCategory::Standard,
            "deluxe" => RoomCategory::Deluxe,
            "suite" => RoomCategory::Suite,
            _ => RoomCategory::Other(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoomCategory::Standard => "Standard",
            RoomCategory::Deluxe => "Deluxe",
            RoomCategory::Suite => "Suite",
            RoomCategory::Other(label) => label,
        }
    }

    /// Standard sorts first, then Deluxe, then everything else by label.
    pub fn rank(&self) -> u8 {
        match self {
            RoomCategory::Standard => 0,
            RoomCategory::Deluxe => 1,
            RoomCategory::Suite | RoomCategory::Other(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotel {
    pub id: Ulid,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
}

/// A committed reservation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest_name: String,
    pub span: Span,
    pub duration_hours: u32,
    pub cost: u64,
    /// Engine-wide creation counter; breaks ties between equal `span.start`.
    pub seq: u64,
}

/// Per-room state: the catalog record plus the room's reservations.
/// One of these sits behind each room's lock.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub name: String,
    pub floor: i32,
    pub category: RoomCategory,
    /// Nightly rate in whole currency units.
    pub rate: u32,
    pub active: bool,
    /// Pairwise non-overlapping, sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(
        id: Ulid,
        hotel_id: Ulid,
        name: String,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    ) -> Self {
        Self {
            id,
            hotel_id,
            name,
            floor,
            category,
            rate,
            active: true,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn find_reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// Reservations whose span overlaps the query window.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.overlaps(query))
    }
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HotelRegistered {
        id: Ulid,
        name: String,
        address: Option<String>,
    },
    HotelDeactivated {
        id: Ulid,
    },
    RoomRegistered {
        id: Ulid,
        hotel_id: Ulid,
        name: String,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    },
    RoomUpdated {
        id: Ulid,
        name: String,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    },
    RoomDeactivated {
        id: Ulid,
    },
    ReservationBooked {
        id: Ulid,
        room_id: Ulid,
        guest_name: String,
        span: Span,
        duration_hours: u32,
        cost: u64,
        seq: u64,
    },
    ReservationCancelled {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// A room joined with its hotel, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: Ulid,
    pub room_name: String,
    pub hotel_id: Ulid,
    pub hotel_name: String,
    pub floor: i32,
    pub category: RoomCategory,
    pub rate: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingReceipt {
    pub reservation_id: Ulid,
    pub room_id: Ulid,
    pub room_name: String,
    pub hotel_name: String,
    pub guest_name: String,
    pub from: Ms,
    pub to: Ms,
    pub duration_hours: u32,
    /// Fractional days, rounded to two decimals. Informational only.
    pub total_days: f64,
    pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    pub reservation_id: Ulid,
    pub guest_name: String,
    pub room_name: String,
    pub hotel_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub guest_name: String,
    pub room_id: Ulid,
    pub room_name: String,
    pub hotel_name: String,
    pub from: Ms,
    pub to: Ms,
    pub duration_hours: u32,
    pub cost: u64,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        RoomState::new(
            Ulid::new(),
            Ulid::new(),
            "101".into(),
            1,
            RoomCategory::Standard,
            100,
        )
    }

    fn reservation(start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            room_id: Ulid::new(),
            guest_name: "Guest".into(),
            span: Span::new(start, end),
            duration_hours: 1,
            cost: 0,
            seq: 0,
        }
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_containment_overlaps() {
        let outer = Span::new(0, 1000);
        let inner = Span::new(400, 500);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(outer.overlaps(&outer));
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(RoomCategory::parse("standard"), RoomCategory::Standard);
        assert_eq!(RoomCategory::parse(" DELUXE "), RoomCategory::Deluxe);
        assert_eq!(RoomCategory::parse("Suite"), RoomCategory::Suite);
        assert_eq!(
            RoomCategory::parse("Penthouse"),
            RoomCategory::Other("Penthouse".into())
        );
        assert_eq!(RoomCategory::parse("Penthouse").as_str(), "Penthouse");
    }

    #[test]
    fn category_rank() {
        assert!(RoomCategory::Standard.rank() < RoomCategory::Deluxe.rank());
        assert!(RoomCategory::Deluxe.rank() < RoomCategory::Suite.rank());
        assert_eq!(
            RoomCategory::Suite.rank(),
            RoomCategory::Other("Attic".into()).rank()
        );
    }

    #[test]
    fn reservation_ordering() {
        let mut rs = room();
        rs.insert_reservation(reservation(300, 400));
        rs.insert_reservation(reservation(100, 200));
        rs.insert_reservation(reservation(200, 300));
        let starts: Vec<Ms> = rs.reservations.iter().map(|r| r.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn remove_reservation() {
        let mut rs = room();
        let r = reservation(100, 200);
        let id = r.id;
        rs.insert_reservation(r);
        assert!(rs.find_reservation(id).is_some());
        assert_eq!(rs.remove_reservation(id).map(|r| r.id), Some(id));
        assert!(rs.reservations.is_empty());
        assert!(rs.remove_reservation(id).is_none());
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut rs = room();
        rs.insert_reservation(reservation(100, 200));
        rs.insert_reservation(reservation(450, 600));
        rs.insert_reservation(reservation(1000, 1100));

        let hits: Vec<_> = rs.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut rs = room();
        rs.insert_reservation(reservation(100, 200));
        rs.insert_reservation(reservation(300, 400));
        assert_eq!(rs.overlapping(&Span::new(200, 300)).count(), 0);
    }

    #[test]
    fn overlapping_single_ms() {
        let mut rs = room();
        rs.insert_reservation(reservation(100, 201));
        assert_eq!(rs.overlapping(&Span::new(200, 300)).count(), 1);
    }

    #[test]
    fn overlapping_empty_room() {
        let rs = room();
        assert_eq!(rs.overlapping(&Span::new(0, 1000)).count(), 0);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::RoomRegistered {
            id: Ulid::new(),
            hotel_id: Ulid::new(),
            name: "204".into(),
            floor: 2,
            category: RoomCategory::Other("Loft".into()),
            rate: 180,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
