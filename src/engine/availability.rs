use std::cmp::Ordering;

use crate::model::*;

/// A room is free for `query` iff none of its reservations overlaps it.
/// Uses the same `Span::overlaps` predicate as the booking path.
pub fn is_free(room: &RoomState, query: &Span) -> bool {
    room.overlapping(query).next().is_none()
}

pub(super) fn summarize(room: &RoomState, hotel_name: String) -> RoomSummary {
    RoomSummary {
        room_id: room.id,
        room_name: room.name.clone(),
        hotel_id: room.hotel_id,
        hotel_name,
        floor: room.floor,
        category: room.category.clone(),
        rate: room.rate,
    }
}

/// Category rank, then category label, then hotel name, room name, and
/// finally room id so that equal-looking rows still have a fixed order.
fn compare_summaries(a: &RoomSummary, b: &RoomSummary) -> Ordering {
    a.category
        .rank()
        .cmp(&b.category.rank())
        .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        .then_with(|| a.hotel_name.cmp(&b.hotel_name))
        .then_with(|| a.room_name.cmp(&b.room_name))
        .then_with(|| a.room_id.cmp(&b.room_id))
}

pub fn sort_summaries(rooms: &mut [RoomSummary]) {
    rooms.sort_by(compare_summaries);
}
