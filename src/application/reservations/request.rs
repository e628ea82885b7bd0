//! Reservation request validation
//!
//! Checks run in a fixed order and the first failure is reported.

use chrono::NaiveDate;
use validator::ValidateEmail;

use crate::domain::reservation::{DateRange, Location};
use crate::domain::{DomainError, DomainResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest stay a single reservation may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Unvalidated reservation input as received from a client.
#[derive(Debug, Clone, Default)]
pub struct ReservationRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub license_plate: Option<String>,
    pub no_license_plate: bool,
}

/// Reservation input that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReservation {
    pub full_name: String,
    pub email: String,
    pub location: Location,
    pub range: DateRange,
    pub license_plate: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| DomainError::validation("Invalid date format, expected YYYY-MM-DD"))
}

impl ReservationRequest {
    pub fn validate(&self, today: NaiveDate) -> DomainResult<ValidReservation> {
        let full_name = present(&self.full_name);
        let email = present(&self.email);
        let start = present(&self.start_date);
        let end = present(&self.end_date);
        let location = present(&self.location);
        let plate = present(&self.license_plate);

        let (Some(full_name), Some(email), Some(start), Some(end), Some(location)) =
            (full_name, email, start, end, location)
        else {
            return Err(DomainError::validation("Missing required fields"));
        };
        if plate.is_none() && !self.no_license_plate {
            return Err(DomainError::validation("Missing required fields"));
        }

        let location = location
            .parse::<Location>()
            .map_err(|_| DomainError::validation("Invalid location"))?;

        if !email.validate_email() {
            return Err(DomainError::validation("Invalid email address"));
        }

        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if start < today {
            return Err(DomainError::validation("Start date cannot be in the past"));
        }
        let range = DateRange::new(start, end)
            .ok_or_else(|| DomainError::validation("End date must be after start date"))?;
        if range.nights() > MAX_STAY_NIGHTS {
            return Err(DomainError::validation(format!(
                "Stays longer than {MAX_STAY_NIGHTS} nights are not supported"
            )));
        }

        let license_plate = if self.no_license_plate {
            None
        } else {
            plate.map(str::to_uppercase)
        };

        Ok(ValidReservation {
            full_name: full_name.to_string(),
            email: email.to_string(),
            location,
            range,
            license_plate,
        })
    }
}
