use thiserror::Error;

use crate::domain::reservation::Location;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("No parking spaces available for the selected dates at {}", .location.display_name())]
    CapacityExceeded { location: Location },

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Payment provider error: {message}")]
    Payment { message: String, transient: bool },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_location() {
        let err = DomainError::CapacityExceeded {
            location: Location::Saudagata,
        };
        assert_eq!(
            err.to_string(),
            "No parking spaces available for the selected dates at Saudagata"
        );
    }
}
