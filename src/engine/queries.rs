use std::cmp::Reverse;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{is_free, sort_summaries, summarize};
use super::conflict::validate_window;
use super::{Engine, EngineError};

impl Engine {
    /// Active rooms with no reservation overlapping `[from, to)`, in
    /// category / hotel / room order.
    ///
    /// Each room is read under its own read lock, so every row reflects a
    /// committed state of that room; nothing in flight is ever visible.
    pub async fn query_availability(&self, from: Ms, to: Ms) -> Result<Vec<RoomSummary>, EngineError> {
        let query = validate_window(from, to, self.now_ms())?;
        if query.duration_ms() > MAX_QUERY_WINDOW_MS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }

        let mut free = Vec::new();
        for rs in self.room_handles() {
            let guard = rs.read().await;
            if !guard.active || !is_free(&guard, &query) {
                continue;
            }
            if let Some(hotel_name) = self.active_hotel_name(&guard.hotel_id) {
                free.push(summarize(&guard, hotel_name));
            }
        }
        sort_summaries(&mut free);
        Ok(free)
    }

    /// Every sellable room, same ordering as availability.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms = Vec::new();
        for rs in self.room_handles() {
            let guard = rs.read().await;
            if !guard.active {
                continue;
            }
            if let Some(hotel_name) = self.active_hotel_name(&guard.hotel_id) {
                rooms.push(summarize(&guard, hotel_name));
            }
        }
        sort_summaries(&mut rooms);
        rooms
    }

    /// A room joined with its hotel, whether or not either is still active.
    pub async fn get_room_with_hotel(&self, room_id: Ulid) -> Option<RoomSummary> {
        let rs = self.get_room(&room_id)?;
        let guard = rs.read().await;
        Some(summarize(&guard, self.hotel_name(&guard.hotel_id)))
    }

    pub fn get_hotel(&self, hotel_id: Ulid) -> Option<Hotel> {
        self.hotels.get(&hotel_id).map(|h| h.value().clone())
    }

    /// All reservations, newest `from` first; equal `from` puts the most
    /// recently created first.
    pub async fn list_reservations(&self) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        for rs in self.room_handles() {
            let guard = rs.read().await;
            let hotel_name = self.hotel_name(&guard.hotel_id);
            out.extend(
                guard
                    .reservations
                    .iter()
                    .map(|r| reservation_info(r, &guard, &hotel_name)),
            );
        }
        out.sort_by_key(|r| (Reverse(r.from), Reverse(r.seq)));
        out
    }

    pub async fn get_reservation(&self, reservation_id: Ulid) -> Option<ReservationInfo> {
        let room_id = self.get_room_for_reservation(&reservation_id)?;
        let rs = self.get_room(&room_id)?;
        let guard = rs.read().await;
        let r = guard.find_reservation(reservation_id)?;
        Some(reservation_info(r, &guard, &self.hotel_name(&guard.hotel_id)))
    }
}

fn reservation_info(r: &Reservation, room: &RoomState, hotel_name: &str) -> ReservationInfo {
    ReservationInfo {
        id: r.id,
        guest_name: r.guest_name.clone(),
        room_id: room.id,
        room_name: room.name.clone(),
        hotel_name: hotel_name.to_string(),
        from: r.span.start,
        to: r.span.end,
        duration_hours: r.duration_hours,
        cost: r.cost,
        seq: r.seq,
    }
}
