//! Train catalog
//!
//! Owns train rows and their seat counters. Creation is admin-only and
//! serialized so the unique-name check and the insert cannot interleave.
//! Reads take no lock and may observe a counter one reservation behind.

use crate::{
    metrics::Metrics,
    types::{Principal, Train, TrainAvailability, TrainId, TrainSpec},
    Error, Result, Storage,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Train catalog
pub struct TrainCatalog {
    storage: Arc<Storage>,
    create_lock: Mutex<()>,
    metrics: Metrics,
}

impl TrainCatalog {
    /// Create catalog over shared storage
    pub fn new(storage: Arc<Storage>, metrics: Metrics) -> Self {
        Self {
            storage,
            create_lock: Mutex::new(()),
            metrics,
        }
    }

    /// Register a train; `available_seats` starts at `total_seats`
    pub fn create_train(&self, principal: &Principal, spec: TrainSpec) -> Result<TrainId> {
        principal.require_admin()?;
        spec.validate()?;

        let _guard = self.create_lock.lock();

        if self.storage.train_id_by_name(&spec.name)?.is_some() {
            return Err(Error::DuplicateName(format!(
                "train with name {:?} already exists",
                spec.name
            )));
        }

        let train = Train::from_spec(spec);

        let mut txn = self.storage.begin();
        txn.insert_train(&train)?;
        txn.commit()?;

        self.metrics.record_train_created();

        tracing::info!(
            train_id = %train.id,
            name = %train.name,
            source = %train.source,
            destination = %train.destination,
            total_seats = train.total_seats,
            created_by = %principal.user_id,
            "Train created"
        );

        Ok(train.id)
    }

    /// Trains running from `source` to `destination`, with current seat counts
    pub fn get_availability(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<TrainAvailability>> {
        let trains = self.storage.trains_on_route(source, destination)?;

        tracing::debug!(
            source,
            destination,
            matches = trains.len(),
            "Availability query"
        );

        Ok(trains.iter().map(TrainAvailability::from).collect())
    }

    /// Get train by ID
    pub fn get_train(&self, train_id: TrainId) -> Result<Train> {
        self.storage.get_train(train_id)
    }

    /// All trains in creation order
    pub fn list_trains(&self) -> Result<Vec<Train>> {
        self.storage.all_trains()
    }
}
