use std::sync::atomic::Ordering;

use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, validate_guest_name, validate_window};
use super::pricing::{quote, round_days};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Book `room_id` for `[from, to)`.
    ///
    /// The overlap check, the WAL append and the in-memory insert all happen
    /// under the room's write lock, so for any one room concurrent callers
    /// see bookings commit one at a time and a conflicting request can never
    /// slip in between another request's check and its insert.
    pub async fn book_room(
        &self,
        guest_name: &str,
        room_id: Ulid,
        from: Ms,
        to: Ms,
    ) -> Result<BookingReceipt, EngineError> {
        let guest_name = validate_guest_name(guest_name)?;
        let span = validate_window(from, to, self.now_ms())?;
        if span.duration_ms() > MAX_RESERVATION_SPAN_MS {
            return Err(EngineError::LimitExceeded("reservation too long"));
        }

        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(room_id));
        }
        let hotel_name = self
            .active_hotel_name(&guard.hotel_id)
            .ok_or(EngineError::NotFound(room_id))?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        if let Err(e) = check_no_conflict(&guard, &span) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!("booking conflict on room {room_id} for [{from}, {to})");
            return Err(e);
        }

        let q = quote(&span, guard.rate);
        let id = Ulid::new();
        let event = Event::ReservationBooked {
            id,
            room_id,
            guest_name: guest_name.clone(),
            span,
            duration_hours: q.duration_hours,
            cost: q.cost,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        info!("reservation {id}: room {room_id} [{from}, {to}) cost {}", q.cost);

        Ok(BookingReceipt {
            reservation_id: id,
            room_id,
            room_name: guard.name.clone(),
            hotel_name,
            guest_name,
            from,
            to,
            duration_hours: q.duration_hours,
            total_days: round_days(q.total_days),
            cost: q.cost,
        })
    }

    /// Delete a reservation that hasn't finished yet. Runs under the room's
    /// write lock, so it can't interleave with a booking's overlap check.
    pub async fn cancel_reservation(
        &self,
        reservation_id: Ulid,
    ) -> Result<CancellationReceipt, EngineError> {
        let mut guard = self.resolve_reservation_write(&reservation_id).await?;
        // Re-read under the lock: a concurrent cancel may have won.
        let reservation = guard
            .find_reservation(reservation_id)
            .cloned()
            .ok_or(EngineError::NotFound(reservation_id))?;
        if reservation.span.end <= self.now_ms() {
            debug!("refusing to cancel completed reservation {reservation_id}");
            return Err(EngineError::InvalidState("cannot cancel completed reservation"));
        }

        let room_id = guard.id;
        let event = Event::ReservationCancelled {
            id: reservation_id,
            room_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        info!("reservation {reservation_id} cancelled, room {room_id} released");

        Ok(CancellationReceipt {
            reservation_id,
            guest_name: reservation.guest_name,
            room_name: guard.name.clone(),
            hotel_name: self.hotel_name(&guard.hotel_id),
        })
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    ///
    /// Holds the catalog lock and a read lock on every room until the new
    /// file is in place, so no append can land in the old log after the
    /// snapshot was taken.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;

        let mut events = Vec::new();
        let mut hotels: Vec<Hotel> = self.hotels.iter().map(|e| e.value().clone()).collect();
        hotels.sort_by_key(|h| h.id);
        for hotel in hotels {
            events.push(Event::HotelRegistered {
                id: hotel.id,
                name: hotel.name,
                address: hotel.address,
            });
            if !hotel.active {
                events.push(Event::HotelDeactivated { id: hotel.id });
            }
        }

        let mut handles: Vec<_> = self
            .rooms
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        let mut guards = Vec::with_capacity(handles.len());
        for (_, rs) in handles {
            guards.push(rs.read_owned().await);
        }

        for room in &guards {
            events.push(Event::RoomRegistered {
                id: room.id,
                hotel_id: room.hotel_id,
                name: room.name.clone(),
                floor: room.floor,
                category: room.category.clone(),
                rate: room.rate,
            });
            if !room.active {
                events.push(Event::RoomDeactivated { id: room.id });
            }
            for r in &room.reservations {
                events.push(Event::ReservationBooked {
                    id: r.id,
                    room_id: room.id,
                    guest_name: r.guest_name.clone(),
                    span: r.span,
                    duration_hours: r.duration_hours,
                    cost: r.cost,
                    seq: r.seq,
                });
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
