//! Booking ledger
//!
//! Append-only record of bookings. Entries are only ever written through
//! [`BookingLedger::record_booking`], which stages them into the caller's
//! [`StorageTxn`] so they commit together with the seat counter change.

use crate::{
    storage::StorageTxn,
    types::{BookingDetails, BookingEntry, BookingId, TrainId, UserId},
    Error, Result, Storage,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Booking ledger
pub struct BookingLedger {
    storage: Arc<Storage>,
}

impl BookingLedger {
    /// Create ledger over shared storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Stage a new entry into an open transaction
    pub(crate) fn record_booking(
        &self,
        txn: &mut StorageTxn<'_>,
        user_id: UserId,
        train_id: TrainId,
        seats_booked: u32,
        booking_time: DateTime<Utc>,
    ) -> Result<BookingEntry> {
        if seats_booked == 0 {
            return Err(Error::InvalidRequest(
                "seats_booked must be positive".to_string(),
            ));
        }

        let entry = BookingEntry {
            id: BookingId::new(),
            user_id,
            train_id,
            seats_booked,
            booking_time,
        };
        txn.append_booking(&entry)?;

        Ok(entry)
    }

    /// A user's bookings by booking time, joined with train display fields
    ///
    /// Returns [`Error::NoBookings`] when the user has none.
    pub fn list_bookings(&self, user_id: UserId) -> Result<Vec<BookingDetails>> {
        let mut entries = self.storage.bookings_for_user(user_id)?;
        if entries.is_empty() {
            return Err(Error::NoBookings(user_id.to_string()));
        }

        entries.sort_by(|a, b| {
            a.booking_time
                .cmp(&b.booking_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut trains = HashMap::new();
        let mut details = Vec::with_capacity(entries.len());
        for entry in &entries {
            if !trains.contains_key(&entry.train_id) {
                let train = self.storage.get_train(entry.train_id)?;
                trains.insert(entry.train_id, train);
            }
            if let Some(train) = trains.get(&entry.train_id) {
                details.push(BookingDetails::join(entry, train));
            }
        }

        Ok(details)
    }

    /// Every entry recorded against a train
    pub fn bookings_for_train(&self, train_id: TrainId) -> Result<Vec<BookingEntry>> {
        self.storage.bookings_for_train(train_id)
    }

    /// Get entry by ID
    pub fn get_booking(&self, booking_id: BookingId) -> Result<BookingEntry> {
        self.storage.get_booking(booking_id)
    }
}
