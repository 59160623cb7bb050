//! Booking service facade
//!
//! Wires the catalog, ledger, directory and reservation engine over one
//! storage handle and exposes the operations a transport serves. Results are
//! plain `Result`s; [`Outcome`] turns them into records a transport can
//! serialize as-is.
//!
//! # Example
//!
//! ```no_run
//! use booking_core::{BookingService, Config};
//!
//! #[tokio::main]
//! async fn main() -> booking_core::Result<()> {
//!     let service = BookingService::open(Config::default()).await?;
//!
//!     let rows = service.seat_availability("Delhi", "Mumbai")?;
//!     println!("{} trains", rows.len());
//!
//!     service.shutdown()
//! }
//! ```

use crate::{
    catalog::TrainCatalog,
    engine::ReservationEngine,
    error::StatusCategory,
    gateway::UserDirectory,
    ledger::BookingLedger,
    metrics::Metrics,
    storage::StorageStats,
    types::{
        BookingDetails, BookingRequest, InventoryAudit, Principal, Reservation, Role, Train,
        TrainAvailability, TrainId, TrainSpec, User, UserId,
    },
    Config, Error, Result, Storage,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Booking service
pub struct BookingService {
    storage: Arc<Storage>,
    directory: Arc<UserDirectory>,
    catalog: TrainCatalog,
    ledger: Arc<BookingLedger>,
    engine: ReservationEngine,
    metrics: Metrics,
    request_timeout: Duration,
}

impl BookingService {
    /// Open storage and construct every component
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        let directory = Arc::new(UserDirectory::new(storage.clone()));
        let ledger = Arc::new(BookingLedger::new(storage.clone()));
        let catalog = TrainCatalog::new(storage.clone(), metrics.clone());
        metrics.set_train_count(catalog.list_trains()?.len());
        let engine = ReservationEngine::new(
            storage.clone(),
            ledger.clone(),
            directory.clone(),
            metrics.clone(),
        );

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            data_dir = ?config.data_dir,
            "Booking service ready"
        );

        Ok(Self {
            storage,
            directory,
            catalog,
            ledger,
            engine,
            metrics,
            request_timeout: Duration::from_millis(config.service.request_timeout_ms),
        })
    }

    /// Register a user with a gateway-produced credential hash
    pub fn register_user(&self, username: &str, credential_hash: &str, role: Role) -> Result<User> {
        self.directory.register(username, credential_hash, role)
    }

    /// Resolve an authenticated user ID
    pub fn principal(&self, user_id: UserId) -> Result<Principal> {
        self.directory.resolve(user_id)
    }

    /// Find a user by username (for the gateway's login step)
    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        self.directory.find_by_username(username)
    }

    /// Register a train (admin only)
    pub fn add_train(&self, principal: &Principal, spec: TrainSpec) -> Result<TrainId> {
        self.catalog.create_train(principal, spec)
    }

    /// Seat availability on a route
    pub fn seat_availability(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<TrainAvailability>> {
        self.catalog.get_availability(source, destination)
    }

    /// Get train by ID
    pub fn train(&self, train_id: TrainId) -> Result<Train> {
        self.catalog.get_train(train_id)
    }

    /// Book seats, bounded by the configured request timeout
    ///
    /// On timeout nothing has been applied and the call fails with
    /// [`Error::TransactionFailed`].
    pub async fn book_seat(
        &self,
        principal: &Principal,
        request: BookingRequest,
    ) -> Result<Reservation> {
        let reservation = self.engine.reserve_seats(
            principal,
            request.train_id,
            request.seats_to_book,
        );

        match tokio::time::timeout(self.request_timeout, reservation).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.record_timeout();
                tracing::warn!(
                    train_id = %request.train_id,
                    user_id = %principal.user_id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Booking timed out waiting for train lock"
                );
                Err(Error::TransactionFailed(format!(
                    "booking on train {} timed out",
                    request.train_id
                )))
            }
        }
    }

    /// The caller's bookings
    pub fn booking_details(&self, principal: &Principal) -> Result<Vec<BookingDetails>> {
        self.ledger.list_bookings(principal.user_id)
    }

    /// Audit every train's counter against the ledger
    pub async fn audit(&self) -> Result<Vec<InventoryAudit>> {
        self.engine.verify_all().await
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Flush storage before exit
    pub fn shutdown(&self) -> Result<()> {
        self.storage.flush()?;
        tracing::info!("Booking service shut down");
        Ok(())
    }
}

/// Error payload of an [`Outcome`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error kind
    pub kind: &'static str,
    /// Human-readable message
    pub message: String,
    /// Client or server fault
    pub category: StatusCategory,
    /// Safe to retry unchanged
    pub retryable: bool,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            category: err.status(),
            retryable: err.is_retryable(),
        }
    }
}

/// Success payload or typed failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBody<T> {
    /// Operation succeeded
    Data(T),
    /// Operation failed
    Error(ErrorBody),
}

/// Serializable operation result with an HTTP-style status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    /// Status code a transport should use
    pub http_status: u16,
    /// Payload
    #[serde(flatten)]
    pub body: OutcomeBody<T>,
}

impl<T> Outcome<T> {
    /// 200 on success
    pub fn ok(result: Result<T>) -> Self {
        Self::with_success_status(result, 200)
    }

    /// 201 on success, for operations that create something
    pub fn created(result: Result<T>) -> Self {
        Self::with_success_status(result, 201)
    }

    fn with_success_status(result: Result<T>, status: u16) -> Self {
        match result {
            Ok(data) => Self {
                http_status: status,
                body: OutcomeBody::Data(data),
            },
            Err(err) => Self {
                http_status: err.http_status(),
                body: OutcomeBody::Error(ErrorBody::from(&err)),
            },
        }
    }

    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.body, OutcomeBody::Data(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal::Decimal;

    async fn create_test_service(timeout_ms: u64) -> (BookingService, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config.service.request_timeout_ms = timeout_ms;

        (BookingService::open(config).await.unwrap(), temp_dir)
    }

    fn spec(name: &str) -> TrainSpec {
        let departure = Utc::now() + ChronoDuration::days(2);
        TrainSpec {
            name: name.to_string(),
            source: "Delhi".to_string(),
            destination: "Lucknow".to_string(),
            departure_time: departure,
            arrival_time: departure + ChronoDuration::hours(6),
            total_seats: 4,
            price: Decimal::new(110000, 2),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_flow() {
        let (service, _temp) = create_test_service(1_000).await;

        let admin = service.register_user("ops", "h", Role::Admin).unwrap();
        let admin = service.principal(admin.id).unwrap();
        let rider = service.register_user("rider", "h", Role::Customer).unwrap();
        let rider = service.principal(rider.id).unwrap();

        let train_id = service.add_train(&admin, spec("Lucknow Mail")).unwrap();

        let rows = service.seat_availability("Delhi", "Lucknow").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].available_seats, 4);

        let reservation = service
            .book_seat(
                &rider,
                BookingRequest {
                    train_id,
                    seats_to_book: 3,
                },
            )
            .await
            .unwrap();
        assert_eq!(reservation.available_seats, 1);

        let details = service.booking_details(&rider).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].train_name, "Lucknow Mail");
        assert_eq!(details[0].seats_booked, 3);

        let audits = service.audit().await.unwrap();
        assert!(audits.iter().all(InventoryAudit::is_consistent));

        service.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_outcome_for_empty_bookings() {
        let (service, _temp) = create_test_service(1_000).await;
        let rider = service.register_user("new", "h", Role::Customer).unwrap();

        let outcome = Outcome::ok(service.booking_details(&rider.principal()));
        assert!(!outcome.is_success());
        assert_eq!(outcome.http_status, 404);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["error"]["kind"], "no_bookings");
        assert_eq!(json["error"]["category"], "client_error");
    }

    #[tokio::test]
    async fn test_outcome_for_created_train() {
        let (service, _temp) = create_test_service(1_000).await;
        let admin = service.register_user("root", "h", Role::Admin).unwrap();

        let outcome = Outcome::created(service.add_train(&admin.principal(), spec("Kashi")));
        assert!(outcome.is_success());
        assert_eq!(outcome.http_status, 201);

        let forbidden = Outcome::created(service.add_train(
            &Principal::new(admin.id, Role::Customer),
            spec("Kashi 2"),
        ));
        assert_eq!(forbidden.http_status, 403);
    }

    #[tokio::test]
    async fn test_train_gauge_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.rocksdb.sync_writes = false;

        {
            let service = BookingService::open(config.clone()).await.unwrap();
            let admin = service.register_user("root", "h", Role::Admin).unwrap();
            service.add_train(&admin.principal(), spec("Sealdah")).unwrap();
            service.add_train(&admin.principal(), spec("Darjeeling")).unwrap();
            service.shutdown().unwrap();
        }

        let service = BookingService::open(config).await.unwrap();
        assert_eq!(service.metrics().trains_total.get(), 2);
    }

    #[tokio::test]
    async fn test_booking_times_out_while_train_locked() {
        let (service, _temp) = create_test_service(50).await;
        let admin = service.register_user("root", "h", Role::Admin).unwrap();
        let rider = service.register_user("rider", "h", Role::Customer).unwrap();
        let train_id = service
            .add_train(&admin.principal(), spec("Padmavat"))
            .unwrap();

        let lock = service.engine.train_lock(train_id);
        let held = lock.lock().await;

        let err = service
            .book_seat(
                &rider.principal(),
                BookingRequest {
                    train_id,
                    seats_to_book: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransactionFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(service.metrics().timeouts_total.get(), 1);
        assert_eq!(service.metrics().commit_failures_total.get(), 0);

        drop(held);
        assert_eq!(service.train(train_id).unwrap().available_seats, 4);
        assert!(service.booking_details(&rider.principal()).is_err());
    }
}
