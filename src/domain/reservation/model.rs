//! Reservation domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Concurrent capacity-holding reservations allowed at a constrained location.
pub const CONSTRAINED_LOCATION_CAPACITY: u64 = 2;

/// Parking locations. The set is closed: anything else is rejected at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Location {
    JensZetlitzGate,
    Saudagata,
    TorbjornHornklovesGate,
}

impl Location {
    pub const ALL: [Location; 3] = [
        Location::JensZetlitzGate,
        Location::Saudagata,
        Location::TorbjornHornklovesGate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JensZetlitzGate => "jens-zetlitz-gate",
            Self::Saudagata => "saudagata",
            Self::TorbjornHornklovesGate => "torbjorn-hornkloves-gate",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JensZetlitzGate => "Jens Zetlitz gate",
            Self::Saudagata => "Saudagata",
            Self::TorbjornHornklovesGate => "Torbjørn Hornkløves gate",
        }
    }

    /// Capacity limit, or `None` when the location is unlimited.
    pub fn capacity(&self) -> Option<u64> {
        match self {
            Self::Saudagata => Some(CONSTRAINED_LOCATION_CAPACITY),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown location: {0}")]
pub struct UnknownLocation(pub String);

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationStatus {
    /// Awaiting payment confirmation; holds capacity
    Pending,
    /// Paid; holds capacity
    Completed,
    /// Checkout hold lapsed without payment
    Expired,
    /// Checkout session could not be created
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the reservation occupies a slot at a capacity-constrained
    /// location. Released rows (expired, cancelled) do not.
    pub fn holds_capacity(&self) -> bool {
        matches!(self, Self::Pending | Self::Completed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// Half-open calendar date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` unless `end` is strictly after `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    /// Touching ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Billable nights, never less than one.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days().max(1)
    }
}

/// Nightly rate applied to every location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    /// Minor currency units (øre for NOK) per night
    pub nightly_rate: i64,
    pub currency: String,
}

impl Pricing {
    pub fn new(nightly_rate: i64, currency: impl Into<String>) -> Self {
        Self {
            nightly_rate,
            currency: currency.into(),
        }
    }

    pub fn total_for(&self, range: &DateRange) -> i64 {
        range.nights() * self.nightly_rate
    }
}

/// A reservation ready to be admitted in `pending` state.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub full_name: String,
    pub email: String,
    pub range: DateRange,
    pub license_plate: Option<String>,
    pub location: Location,
    pub nights: i32,
    pub total_price: i64,
    pub currency: String,
    pub payment_reference: String,
}

impl NewReservation {
    pub fn generate_payment_reference() -> String {
        format!("res_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Parking reservation
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `None` means the plate is not yet known
    pub license_plate: Option<String>,
    pub location: Location,
    pub nights: i32,
    pub total_price: i64,
    pub currency: String,
    pub payment_reference: String,
    pub checkout_session_id: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn no_license_plate(&self) -> bool {
        self.license_plate.is_none()
    }

    /// Plate reduced to its last four characters, e.g. `****2345`.
    pub fn masked_license_plate(&self) -> Option<String> {
        self.license_plate.as_deref().map(mask_plate)
    }
}

fn mask_plate(plate: &str) -> String {
    let chars: Vec<char> = plate.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

// ── Tests ──────────────────────────────────────────────────────
