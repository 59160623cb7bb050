//! Core types for the booking core
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for prices)
//! - Time-ordered identifiers (UUIDv7)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Raw 16-byte key form
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| crate::Error::InvalidRequest(format!("bad identifier {:?}: {}", s, e)))
            }
        }
    };
}

uuid_id!(
    /// Train identifier
    TrainId
);
uuid_id!(
    /// User identifier
    UserId
);
uuid_id!(
    /// Booking entry identifier
    BookingId
);

/// Role assigned to a user by the access gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May register trains
    Admin,
    /// May query and book
    Customer,
}

impl Role {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(crate::Error::InvalidRequest(format!("unknown role {:?}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller identity handed to the core by the access gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user
    pub user_id: UserId,
    /// Role of that user
    pub role: Role,
}

impl Principal {
    /// Create principal
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Reject anyone but administrators
    pub fn require_admin(&self) -> crate::Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Customer => Err(crate::Error::Forbidden(format!(
                "user {} is not authorized to perform this action",
                self.user_id
            ))),
        }
    }
}

/// Registered user (owned by the access gateway)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Unique login name
    pub username: String,
    /// Opaque credential hash produced by the gateway
    pub credential_hash: String,
    /// Role
    pub role: Role,
}

impl User {
    /// Identity + role pair for core calls
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }
}

/// Scheduled train with its seat inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    /// Train ID
    pub id: TrainId,
    /// Unique train name
    pub name: String,
    /// Departure station label
    pub source: String,
    /// Arrival station label
    pub destination: String,
    /// Departure time
    pub departure_time: DateTime<Utc>,
    /// Arrival time
    pub arrival_time: DateTime<Utc>,
    /// Fixed capacity
    pub total_seats: u32,
    /// Seats not yet booked
    pub available_seats: u32,
    /// Fare per seat
    pub price: Decimal,
}

impl Train {
    /// Build a fresh train from a validated spec; every seat starts available
    pub fn from_spec(spec: TrainSpec) -> Self {
        Self {
            id: TrainId::new(),
            name: spec.name,
            source: spec.source,
            destination: spec.destination,
            departure_time: spec.departure_time,
            arrival_time: spec.arrival_time,
            total_seats: spec.total_seats,
            available_seats: spec.total_seats,
            price: spec.price,
        }
    }

    /// Seats sold so far
    pub fn booked_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.available_seats)
    }
}

/// Administrator request to register a train
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Unique train name
    pub name: String,
    /// Departure station label
    pub source: String,
    /// Arrival station label
    pub destination: String,
    /// Departure time
    #[serde(with = "timestamp_format")]
    pub departure_time: DateTime<Utc>,
    /// Arrival time
    #[serde(with = "timestamp_format")]
    pub arrival_time: DateTime<Utc>,
    /// Fixed capacity
    pub total_seats: u32,
    /// Fare per seat; a JSON number or a decimal string
    #[serde(with = "price_format")]
    pub price: Decimal,
}

impl TrainSpec {
    /// Check creation constraints
    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("source", &self.source),
            ("destination", &self.destination),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::InvalidSpec(format!("{} is required", field)));
            }
        }

        if self.departure_time >= self.arrival_time {
            return Err(crate::Error::InvalidSpec(
                "departure_time must be before arrival_time".to_string(),
            ));
        }

        if self.total_seats == 0 {
            return Err(crate::Error::InvalidSpec(
                "total_seats must be positive".to_string(),
            ));
        }

        if self.price < Decimal::ZERO {
            return Err(crate::Error::InvalidSpec(
                "price must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Ledger entry for one successful reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEntry {
    /// Booking ID
    pub id: BookingId,
    /// Who booked
    pub user_id: UserId,
    /// Which train
    pub train_id: TrainId,
    /// Seats taken by this booking
    pub seats_booked: u32,
    /// Commit time, assigned by the engine
    pub booking_time: DateTime<Utc>,
}

/// Booking joined with train display fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    /// Booking ID
    pub booking_id: BookingId,
    /// Train ID
    pub train_id: TrainId,
    /// Train name
    pub train_name: String,
    /// Seats taken by this booking
    pub seats_booked: u32,
    /// Commit time
    pub booking_time: DateTime<Utc>,
    /// Train departure
    pub departure: DateTime<Utc>,
    /// Train arrival
    pub arrival: DateTime<Utc>,
}

impl BookingDetails {
    /// Join an entry with its train
    pub fn join(entry: &BookingEntry, train: &Train) -> Self {
        Self {
            booking_id: entry.id,
            train_id: train.id,
            train_name: train.name.clone(),
            seats_booked: entry.seats_booked,
            booking_time: entry.booking_time,
            departure: train.departure_time,
            arrival: train.arrival_time,
        }
    }
}

/// Availability row for a route query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainAvailability {
    /// Train ID
    pub train_id: TrainId,
    /// Train name
    pub train_name: String,
    /// Seats left (may be stale by one transaction)
    pub available_seats: u32,
}

impl From<&Train> for TrainAvailability {
    fn from(train: &Train) -> Self {
        Self {
            train_id: train.id,
            train_name: train.name.clone(),
            available_seats: train.available_seats,
        }
    }
}

/// Booking request as received from the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Train to book on
    pub train_id: TrainId,
    /// Seats wanted; one when omitted
    #[serde(default = "default_seats_to_book")]
    pub seats_to_book: u32,
}

fn default_seats_to_book() -> u32 {
    1
}

/// Result of a committed reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// New ledger entry
    pub booking_id: BookingId,
    /// Train booked
    pub train_id: TrainId,
    /// Seats taken
    pub seats_booked: u32,
    /// Counter value after the commit
    pub available_seats: u32,
    /// Commit time
    pub booking_time: DateTime<Utc>,
}

/// Result of an inventory audit for one train
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAudit {
    /// Train audited
    pub train_id: TrainId,
    /// Capacity
    pub total_seats: u32,
    /// Counter value
    pub available_seats: u32,
    /// Σ seats_booked over the train's ledger entries
    pub booked_seats: u64,
    /// Number of ledger entries
    pub booking_count: usize,
}

impl InventoryAudit {
    /// `available + booked == total` and `available <= total`
    pub fn is_consistent(&self) -> bool {
        self.available_seats <= self.total_seats
            && u64::from(self.available_seats) + self.booked_seats == u64::from(self.total_seats)
    }
}

/// Transport timestamp format: `YYYY-MM-DDTHH:MM:SS`, interpreted as UTC.
/// RFC 3339 input is accepted as well.
pub mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// strftime pattern
    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Parse a transport timestamp
    pub fn parse(s: &str) -> crate::Result<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| crate::Error::InvalidSpec(format!("bad timestamp {:?}: {}", s, e)))
    }

    /// serde serializer
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    /// serde deserializer
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Transport fare format
///
/// Clients send the fare as a JSON number; a decimal string is accepted too
/// and keeps exact cents. Fares are written back as decimal strings.
pub mod price_format {
    use rust_decimal::Decimal;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::str::FromStr;

    struct PriceVisitor;

    impl<'de> Visitor<'de> for PriceVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a fare as a number or decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
            Decimal::try_from(v).map_err(|e| E::custom(format!("bad price {}: {}", v, e)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
            Decimal::from_str(v.trim())
                .or_else(|_| Decimal::from_scientific(v.trim()))
                .map_err(|e| E::custom(format!("bad price {:?}: {}", v, e)))
        }
    }

    /// serde serializer
    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    /// serde deserializer
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PriceVisitor)
    }
}
