//! Railway Booking Core
//!
//! Seat-inventory booking core for a train ticketing service.
//!
//! # Architecture
//!
//! - **Train Catalog**: train rows and their seat counters
//! - **Booking Ledger**: append-only booking entries
//! - **Reservation Engine**: per-train serialized check-and-decrement,
//!   committed together with the ledger entry in one RocksDB write batch
//! - **Access Gateway**: user directory and the `(user_id, role)` principal
//!
//! # Invariants
//!
//! - Seat conservation: available + Σ(seats booked) == total, per train
//! - Counter bounds: 0 ≤ available ≤ total
//! - All-or-nothing: a reservation writes both the counter and the ledger entry, or neither
//! - Per-train ordering: reservations on one train are strictly serialized

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod types;
pub mod storage;
pub mod catalog;
pub mod ledger;
pub mod engine;
pub mod gateway;
pub mod service;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result, StatusCategory};
pub use types::{
    BookingDetails, BookingEntry, BookingId, BookingRequest, InventoryAudit, Principal,
    Reservation, Role, Train, TrainAvailability, TrainId, TrainSpec, User, UserId,
};
pub use storage::Storage;
pub use catalog::TrainCatalog;
pub use ledger::BookingLedger;
pub use engine::ReservationEngine;
pub use gateway::UserDirectory;
pub use service::{BookingService, Outcome};
pub use config::Config;
pub use metrics::Metrics;
