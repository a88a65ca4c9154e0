mod availability;
mod catalog;
mod conflict;
mod error;
mod mutations;
mod pricing;
mod queries;

pub use availability::{is_free, sort_summaries};
pub use error::{EngineError, ValidationError};
pub use pricing::{Quote, quote};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{info, warn};
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first Append, drains whatever else is already queued,
/// then does a single fsync for the whole batch and answers every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, &mut batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = wal.commit(batch.iter().map(|(event, _)| event));
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(ref e) = result {
        warn!("WAL flush of {} events failed: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The reservation engine for one tenant.
///
/// Every room lives behind its own `RwLock`. Anything that decides on and
/// then changes a room's reservations does so while holding that room's
/// write lock, through the WAL append, so two bookings on the same room are
/// strictly ordered while bookings on different rooms never wait on each
/// other.
pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) hotels: DashMap<Ulid, Hotel>,
    /// Reverse lookup: reservation id → room id
    pub(super) reservation_to_room: DashMap<Ulid, Ulid>,
    /// Serializes catalog writes and compaction. Never taken by booking
    /// or cancellation.
    pub(super) catalog_lock: Mutex<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) next_seq: AtomicU64,
}

/// Apply a room-scoped event (caller holds the lock).
fn apply_to_room(rs: &mut RoomState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated {
            name,
            floor,
            category,
            rate,
            ..
        } => {
            rs.name = name.clone();
            rs.floor = *floor;
            rs.category = category.clone();
            rs.rate = *rate;
        }
        Event::RoomDeactivated { .. } => rs.active = false,
        Event::ReservationBooked {
            id,
            room_id,
            guest_name,
            span,
            duration_hours,
            cost,
            seq,
        } => {
            rs.insert_reservation(Reservation {
                id: *id,
                room_id: *room_id,
                guest_name: guest_name.clone(),
                span: *span,
                duration_hours: *duration_hours,
                cost: *cost,
                seq: *seq,
            });
            index.insert(*id, *room_id);
        }
        Event::ReservationCancelled { id, .. } => {
            rs.remove_reservation(*id);
            index.remove(id);
        }
        // Registration and hotel events are handled at the map level
        Event::HotelRegistered { .. }
        | Event::HotelDeactivated { .. }
        | Event::RoomRegistered { .. } => {}
    }
}

/// Extract the room id from a room-scoped event.
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomUpdated { id, .. } | Event::RoomDeactivated { id } => Some(*id),
        Event::ReservationBooked { room_id, .. } | Event::ReservationCancelled { room_id, .. } => {
            Some(*room_id)
        }
        Event::HotelRegistered { .. }
        | Event::HotelDeactivated { .. }
        | Event::RoomRegistered { .. } => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        Self::with_clock(wal_path, Arc::new(SystemClock))
    }

    pub fn with_clock(wal_path: PathBuf, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let hotels = DashMap::new();
        let reservation_to_room = DashMap::new();
        // Replay into plain values first; nothing else can see them yet.
        let mut rooms: HashMap<Ulid, RoomState> = HashMap::new();
        let mut next_seq = 0u64;
        let mut orphaned = 0usize;

        for event in &events {
            match event {
                Event::HotelRegistered { id, name, address } => {
                    hotels.insert(
                        *id,
                        Hotel {
                            id: *id,
                            name: name.clone(),
                            address: address.clone(),
                            active: true,
                        },
                    );
                }
                Event::HotelDeactivated { id } => {
                    if let Some(mut hotel) = hotels.get_mut(id) {
                        hotel.active = false;
                    }
                }
                Event::RoomRegistered {
                    id,
                    hotel_id,
                    name,
                    floor,
                    category,
                    rate,
                } => {
                    let rs = RoomState::new(*id, *hotel_id, name.clone(), *floor, category.clone(), *rate);
                    rooms.insert(*id, rs);
                }
                other => {
                    if let Event::ReservationBooked { seq, .. } = other {
                        next_seq = next_seq.max(seq + 1);
                    }
                    // Reservations only attach to a room that exists
                    match event_room_id(other).and_then(|rid| rooms.get_mut(&rid)) {
                        Some(rs) => apply_to_room(rs, other, &reservation_to_room),
                        None => orphaned += 1,
                    }
                }
            }
        }
        if orphaned > 0 {
            warn!("WAL replay skipped {orphaned} events referencing unknown rooms");
        }

        let engine = Self {
            rooms: DashMap::new(),
            hotels,
            reservation_to_room,
            catalog_lock: Mutex::new(()),
            wal_tx,
            clock,
            next_seq: AtomicU64::new(next_seq),
        };
        for (id, rs) in rooms {
            engine.rooms.insert(id, Arc::new(RwLock::new(rs)));
        }
        info!(
            "engine ready: {} events replayed, {} hotels, {} rooms, {} reservations",
            events.len(),
            engine.hotels.len(),
            engine.rooms.len(),
            engine.reservation_to_room.len()
        );
        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    pub(super) fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of every room handle. Taken up front so no DashMap shard
    /// lock is held across an `.await`.
    pub(super) fn room_handles(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_room_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_room
            .get(reservation_id)
            .map(|e| *e.value())
    }

    /// Hotel name for a room, or `None` when the hotel is missing or
    /// deactivated.
    pub(super) fn active_hotel_name(&self, hotel_id: &Ulid) -> Option<String> {
        self.hotels
            .get(hotel_id)
            .filter(|h| h.active)
            .map(|h| h.name.clone())
    }

    pub(super) fn hotel_name(&self, hotel_id: &Ulid) -> String {
        self.hotels
            .get(hotel_id)
            .map(|h| h.name.clone())
            .unwrap_or_default()
    }

    /// WAL-append then apply, under the caller's write lock.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.reservation_to_room);
        Ok(())
    }

    /// Register a new hotel or room row: WAL first, then the map.
    pub(super) async fn persist_registration(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        match event {
            Event::HotelRegistered { id, name, address } => {
                self.hotels.insert(
                    *id,
                    Hotel {
                        id: *id,
                        name: name.clone(),
                        address: address.clone(),
                        active: true,
                    },
                );
            }
            Event::HotelDeactivated { id } => {
                if let Some(mut hotel) = self.hotels.get_mut(id) {
                    hotel.active = false;
                }
            }
            Event::RoomRegistered {
                id,
                hotel_id,
                name,
                floor,
                category,
                rate,
            } => {
                let rs = RoomState::new(*id, *hotel_id, name.clone(), *floor, category.clone(), *rate);
                self.rooms.insert(*id, Arc::new(RwLock::new(rs)));
            }
            _ => unreachable!("room-scoped events go through persist_and_apply"),
        }
        Ok(())
    }

    /// Lookup reservation → room, acquire the room's write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .get_room_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        Ok(rs.write_owned().await)
    }
}
