use ulid::Ulid;

/// Malformed or out-of-range input. Each variant names the offending field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvertedRange,
    FromInPast,
    ToInPast,
    EmptyGuestName,
    GuestNameTooLong,
    EmptyName,
    NonPositiveRate,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvertedRange => write!(f, "'to' must be after 'from'"),
            ValidationError::FromInPast => write!(f, "'from' cannot be in the past"),
            ValidationError::ToInPast => write!(f, "'to' cannot be in the past"),
            ValidationError::EmptyGuestName => write!(f, "guest name is required"),
            ValidationError::GuestNameTooLong => write!(f, "guest name too long"),
            ValidationError::EmptyName => write!(f, "name is required"),
            ValidationError::NonPositiveRate => write!(f, "rate must be a positive integer"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The requested window overlaps a committed reservation, which is not
    /// named.
    Conflict,
    InvalidState(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "invalid input: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict => {
                write!(f, "room is already reserved for the selected time period")
            }
            EngineError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
