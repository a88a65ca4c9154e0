use crate::limits::*;
use crate::model::*;

use super::availability::is_free;
use super::error::ValidationError;
use super::EngineError;

/// Validate a requested `[from, to)` window against `now` and the hard limits.
///
/// Past bounds are checked before ordering, `from` before `to`, so the error
/// names the first offending bound.
pub(crate) fn validate_window(from: Ms, to: Ms, now: Ms) -> Result<Span, EngineError> {
    if from < now {
        return Err(ValidationError::FromInPast.into());
    }
    if to < now {
        return Err(ValidationError::ToInPast.into());
    }
    if from >= to {
        return Err(ValidationError::InvertedRange.into());
    }
    if from < MIN_VALID_TIMESTAMP_MS || to > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(Span::new(from, to))
}

pub(crate) fn validate_guest_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyGuestName.into());
    }
    if trimmed.len() > MAX_GUEST_NAME_LEN {
        return Err(ValidationError::GuestNameTooLong.into());
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(trimmed.to_string())
}

/// Any committed reservation overlapping `span` is a conflict.
/// Caller must hold the room's write lock for the result to mean anything.
pub(crate) fn check_no_conflict(rs: &RoomState, span: &Span) -> Result<(), EngineError> {
    if is_free(rs, span) {
        Ok(())
    } else {
        Err(EngineError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const NOW: Ms = 1_800_000_000_000;

    #[test]
    fn window_in_future_is_accepted() {
        let span = validate_window(NOW + HOUR_MS, NOW + 2 * HOUR_MS, NOW).unwrap();
        assert_eq!(span.duration_ms(), HOUR_MS);
    }

    #[test]
    fn window_starting_now_is_accepted() {
        assert!(validate_window(NOW, NOW + HOUR_MS, NOW).is_ok());
    }

    #[test]
    fn window_names_the_past_bound() {
        assert_eq!(
            validate_window(NOW - 1, NOW + HOUR_MS, NOW),
            Err(EngineError::Validation(ValidationError::FromInPast))
        );
        // from in the past takes precedence even if to is also past
        assert_eq!(
            validate_window(NOW - 2 * HOUR_MS, NOW - HOUR_MS, NOW),
            Err(EngineError::Validation(ValidationError::FromInPast))
        );
        assert_eq!(
            validate_window(NOW + HOUR_MS, NOW - 1, NOW),
            Err(EngineError::Validation(ValidationError::ToInPast))
        );
    }

    #[test]
    fn window_inverted_or_empty() {
        assert_eq!(
            validate_window(NOW + 2 * HOUR_MS, NOW + HOUR_MS, NOW),
            Err(EngineError::Validation(ValidationError::InvertedRange))
        );
        assert_eq!(
            validate_window(NOW + HOUR_MS, NOW + HOUR_MS, NOW),
            Err(EngineError::Validation(ValidationError::InvertedRange))
        );
    }

    #[test]
    fn window_beyond_valid_range() {
        assert!(matches!(
            validate_window(NOW, MAX_VALID_TIMESTAMP_MS + 1, NOW),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn guest_name_is_trimmed() {
        assert_eq!(validate_guest_name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
        assert_eq!(
            validate_guest_name("   "),
            Err(EngineError::Validation(ValidationError::EmptyGuestName))
        );
        assert_eq!(
            validate_guest_name(&"x".repeat(MAX_GUEST_NAME_LEN + 1)),
            Err(EngineError::Validation(ValidationError::GuestNameTooLong))
        );
        // trailing whitespace doesn't count towards the limit
        let padded = format!("{}   ", "x".repeat(MAX_GUEST_NAME_LEN));
        assert!(validate_guest_name(&padded).is_ok());
    }

    #[test]
    fn conflict_detection() {
        let mut rs = RoomState::new(
            Ulid::new(),
            Ulid::new(),
            "1".into(),
            1,
            RoomCategory::Standard,
            100,
        );
        rs.insert_reservation(Reservation {
            id: Ulid::new(),
            room_id: rs.id,
            guest_name: "A".into(),
            span: Span::new(1000, 2000),
            duration_hours: 1,
            cost: 0,
            seq: 0,
        });
        assert_eq!(check_no_conflict(&rs, &Span::new(1500, 2500)), Err(EngineError::Conflict));
        assert_eq!(check_no_conflict(&rs, &Span::new(500, 1001)), Err(EngineError::Conflict));
        assert!(check_no_conflict(&rs, &Span::new(2000, 3000)).is_ok());
        assert!(check_no_conflict(&rs, &Span::new(0, 1000)).is_ok());
    }
}
