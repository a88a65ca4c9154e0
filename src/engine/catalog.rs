use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::validate_name;
use super::error::ValidationError;
use super::{Engine, EngineError};

fn validate_room_fields(name: &str, category: &RoomCategory, rate: u32) -> Result<String, EngineError> {
    let name = validate_name(name)?;
    if category.as_str().trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if category.as_str().len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("category too long"));
    }
    if rate == 0 {
        return Err(ValidationError::NonPositiveRate.into());
    }
    Ok(name)
}

impl Engine {
    pub async fn register_hotel(
        &self,
        id: Ulid,
        name: &str,
        address: Option<String>,
    ) -> Result<(), EngineError> {
        let name = validate_name(name)?;
        if let Some(ref a) = address
            && a.len() > MAX_ADDRESS_LEN {
                return Err(EngineError::LimitExceeded("address too long"));
            }

        let _catalog = self.catalog_lock.lock().await;
        if self.hotels.len() >= MAX_HOTELS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many hotels"));
        }
        if self.hotels.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::HotelRegistered { id, name, address };
        self.persist_registration(&event).await?;
        info!("hotel {id} registered");
        Ok(())
    }

    /// Soft delete. The hotel's rooms drop out of availability and can no
    /// longer be booked; existing reservations are untouched.
    pub async fn deactivate_hotel(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        if !self.hotels.get(&id).is_some_and(|h| h.active) {
            return Err(EngineError::NotFound(id));
        }
        self.persist_registration(&Event::HotelDeactivated { id }).await?;
        info!("hotel {id} deactivated");
        Ok(())
    }

    pub async fn register_room(
        &self,
        id: Ulid,
        hotel_id: Ulid,
        name: &str,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    ) -> Result<(), EngineError> {
        let name = validate_room_fields(name, &category, rate)?;

        let _catalog = self.catalog_lock.lock().await;
        if self.rooms.len() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.active_hotel_name(&hotel_id).is_none() {
            return Err(EngineError::NotFound(hotel_id));
        }
        let event = Event::RoomRegistered {
            id,
            hotel_id,
            name,
            floor,
            category,
            rate,
        };
        self.persist_registration(&event).await?;
        info!("room {id} registered in hotel {hotel_id}");
        Ok(())
    }

    /// Change a room's catalog fields. Committed reservations keep the cost
    /// they were booked at.
    pub async fn update_room(
        &self,
        id: Ulid,
        name: &str,
        floor: i32,
        category: RoomCategory,
        rate: u32,
    ) -> Result<(), EngineError> {
        let name = validate_room_fields(name, &category, rate)?;

        let _catalog = self.catalog_lock.lock().await;
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::RoomUpdated {
            id,
            name,
            floor,
            category,
            rate,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("room {id} updated");
        Ok(())
    }

    /// Soft delete. Existing reservations stay listed and cancellable.
    pub async fn deactivate_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut guard, &Event::RoomDeactivated { id })
            .await?;
        info!("room {id} deactivated");
        Ok(())
    }
}
