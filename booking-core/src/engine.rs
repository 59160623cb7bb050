//! Seat reservation engine
//!
//! Reservations are serialized per train: each train ID maps to its own
//! async mutex, and the counter is read, checked and written back while
//! that mutex is held. Trains never share a lock, so bookings on different
//! trains run in parallel.
//!
//! ```text
//!   reserve_seats(train A) ──┐
//!   reserve_seats(train A) ──┼──► lock(A) ──► read A ──► check ──► WriteBatch {
//!                            │                                       A.available -= n,
//!   reserve_seats(train B) ──┴──► lock(B) ──► ...                    ledger entry }
//! ```
//!
//! Nothing is awaited while a train lock is held, so a caller that gives up
//! (timeout, dropped future) can only do so before the commit starts.

use crate::{
    gateway::UserDirectory,
    ledger::BookingLedger,
    metrics::Metrics,
    storage::StorageTxn,
    types::{InventoryAudit, Principal, Reservation, TrainId, UserId},
    Error, Result, Storage,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;

/// Seat reservation engine
pub struct ReservationEngine {
    storage: Arc<Storage>,
    ledger: Arc<BookingLedger>,
    directory: Arc<UserDirectory>,

    /// One lock per train that has been booked or audited
    locks: DashMap<TrainId, Arc<Mutex<()>>>,

    metrics: Metrics,
}

impl ReservationEngine {
    /// Create engine
    pub fn new(
        storage: Arc<Storage>,
        ledger: Arc<BookingLedger>,
        directory: Arc<UserDirectory>,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            ledger,
            directory,
            locks: DashMap::new(),
            metrics,
        }
    }

    /// Atomically take `seats_requested` seats on a train for the caller
    ///
    /// All-or-nothing: either the counter is decremented and one ledger entry
    /// is written, or nothing changes.
    pub async fn reserve_seats(
        &self,
        principal: &Principal,
        train_id: TrainId,
        seats_requested: u32,
    ) -> Result<Reservation> {
        if seats_requested == 0 {
            return Err(Error::InvalidRequest(
                "seats_requested must be at least 1".to_string(),
            ));
        }

        let user = self.directory.resolve(principal.user_id)?;

        // Unknown trains never get a lock entry
        self.storage.get_train(train_id)?;

        let started = Instant::now();
        let lock = self.train_lock(train_id);
        let _guard = lock.lock().await;
        self.metrics
            .record_lock_wait(started.elapsed().as_secs_f64());

        let result = self.reserve_locked(user.user_id, train_id, seats_requested);

        self.metrics
            .record_reservation_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(reservation) => {
                self.metrics.record_reservation(seats_requested);
                tracing::info!(
                    train_id = %train_id,
                    user_id = %user.user_id,
                    booking_id = %reservation.booking_id,
                    seats = seats_requested,
                    available_seats = reservation.available_seats,
                    "Seats reserved"
                );
            }
            Err(Error::InsufficientSeats { available, .. }) => {
                self.metrics.record_rejection();
                tracing::warn!(
                    train_id = %train_id,
                    user_id = %user.user_id,
                    requested = seats_requested,
                    available = *available,
                    "Reservation rejected: insufficient seats"
                );
            }
            Err(e) => {
                if matches!(e, Error::TransactionFailed(_)) {
                    self.metrics.record_commit_failure();
                }
                tracing::error!(
                    train_id = %train_id,
                    user_id = %user.user_id,
                    error = %e,
                    "Reservation failed"
                );
            }
        }

        result
    }

    /// Read-decide-write; caller holds the train's lock
    fn reserve_locked(
        &self,
        user_id: UserId,
        train_id: TrainId,
        seats_requested: u32,
    ) -> Result<Reservation> {
        let mut train = self
            .storage
            .get_train(train_id)
            .map_err(Error::into_transaction_failure)?;

        if train.available_seats < seats_requested {
            return Err(Error::InsufficientSeats {
                requested: seats_requested,
                available: train.available_seats,
            });
        }

        train.available_seats -= seats_requested;
        let booking_time = Utc::now();

        let mut txn = self.storage.begin();
        txn.put_train(&train)
            .map_err(Error::into_transaction_failure)?;
        let entry = self
            .ledger
            .record_booking(&mut txn, user_id, train_id, seats_requested, booking_time)
            .map_err(Error::into_transaction_failure)?;
        commit_off_worker(txn).map_err(Error::into_transaction_failure)?;

        Ok(Reservation {
            booking_id: entry.id,
            train_id,
            seats_booked: entry.seats_booked,
            available_seats: train.available_seats,
            booking_time,
        })
    }

    /// Check `available + Σ booked == total` for one train against the ledger
    pub async fn verify_inventory(&self, train_id: TrainId) -> Result<InventoryAudit> {
        self.storage.get_train(train_id)?;

        let lock = self.train_lock(train_id);
        let _guard = lock.lock().await;

        let train = self.storage.get_train(train_id)?;
        let entries = self.ledger.bookings_for_train(train_id)?;

        let audit = InventoryAudit {
            train_id,
            total_seats: train.total_seats,
            available_seats: train.available_seats,
            booked_seats: entries.iter().map(|e| u64::from(e.seats_booked)).sum(),
            booking_count: entries.len(),
        };

        if !audit.is_consistent() {
            tracing::error!(
                train_id = %train_id,
                total = audit.total_seats,
                available = audit.available_seats,
                booked = audit.booked_seats,
                "Inventory drift detected"
            );
            return Err(Error::InvariantViolation(format!(
                "train {}: available {} + booked {} != total {}",
                train_id, audit.available_seats, audit.booked_seats, audit.total_seats
            )));
        }

        Ok(audit)
    }

    /// Audit every train in the catalog
    pub async fn verify_all(&self) -> Result<Vec<InventoryAudit>> {
        let trains = self.storage.all_trains()?;
        let mut audits = Vec::with_capacity(trains.len());
        for train in trains {
            audits.push(self.verify_inventory(train.id).await?);
        }
        Ok(audits)
    }

    pub(crate) fn train_lock(&self, train_id: TrainId) -> Arc<Mutex<()>> {
        self.locks.entry(train_id).or_default().clone()
    }
}

/// Commit a batch without stalling the async worker on a synced WAL write
///
/// `block_in_place` is only available on the multi-threaded runtime; a
/// current-thread runtime commits inline.
fn commit_off_worker(txn: StorageTxn<'_>) -> Result<()> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| txn.commit())
        }
        _ => txn.commit(),
    }
}
