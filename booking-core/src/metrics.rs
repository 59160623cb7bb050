//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring reservations.
//!
//! # Metrics
//!
//! - `booking_reservations_total` - Committed reservations
//! - `booking_seats_booked_total` - Seats sold across all trains
//! - `booking_rejections_total` - Reservations refused for lack of seats
//! - `booking_commit_failures_total` - Reservations aborted by a storage fault
//! - `booking_timeouts_total` - Bookings that gave up waiting for a train's lock
//! - `booking_trains_total` - Trains in the catalog
//! - `booking_reservation_duration_seconds` - End-to-end reservation latency
//! - `booking_lock_wait_seconds` - Time spent waiting for a train's lock

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed reservations
    pub reservations_total: IntCounter,

    /// Seats sold
    pub seats_booked_total: IntCounter,

    /// Insufficient-seat rejections
    pub rejections_total: IntCounter,

    /// Aborted commits
    pub commit_failures_total: IntCounter,

    /// Request timeouts
    pub timeouts_total: IntCounter,

    /// Trains in the catalog
    pub trains_total: IntGauge,

    /// Reservation latency
    pub reservation_duration: Histogram,

    /// Per-train lock wait
    pub lock_wait: Histogram,

    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let reservations_total =
            IntCounter::new("booking_reservations_total", "Committed reservations")?;
        registry.register(Box::new(reservations_total.clone()))?;

        let seats_booked_total =
            IntCounter::new("booking_seats_booked_total", "Seats sold across all trains")?;
        registry.register(Box::new(seats_booked_total.clone()))?;

        let rejections_total = IntCounter::new(
            "booking_rejections_total",
            "Reservations refused for lack of seats",
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let commit_failures_total = IntCounter::new(
            "booking_commit_failures_total",
            "Reservations aborted by a storage fault",
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        let timeouts_total = IntCounter::new(
            "booking_timeouts_total",
            "Bookings that gave up waiting for a train's lock",
        )?;
        registry.register(Box::new(timeouts_total.clone()))?;

        let trains_total = IntGauge::new("booking_trains_total", "Trains in the catalog")?;
        registry.register(Box::new(trains_total.clone()))?;

        let reservation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "booking_reservation_duration_seconds",
                "End-to-end reservation latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(reservation_duration.clone()))?;

        let lock_wait = Histogram::with_opts(
            HistogramOpts::new(
                "booking_lock_wait_seconds",
                "Time spent waiting for a train's reservation lock",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(lock_wait.clone()))?;

        Ok(Self {
            reservations_total,
            seats_booked_total,
            rejections_total,
            commit_failures_total,
            timeouts_total,
            trains_total,
            reservation_duration,
            lock_wait,
            registry,
        })
    }

    /// Record a committed reservation
    pub fn record_reservation(&self, seats: u32) {
        self.reservations_total.inc();
        self.seats_booked_total.inc_by(u64::from(seats));
    }

    /// Record an insufficient-seat rejection
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Record an aborted commit
    pub fn record_commit_failure(&self) {
        self.commit_failures_total.inc();
    }

    /// Record a booking that timed out before reaching its commit
    pub fn record_timeout(&self) {
        self.timeouts_total.inc();
    }

    /// Seed the train gauge from the stored catalog
    pub fn set_train_count(&self, count: usize) {
        self.trains_total.set(count as i64);
    }

    /// Record train creation
    pub fn record_train_created(&self) {
        self.trains_total.inc();
    }

    /// Record reservation duration
    pub fn record_reservation_duration(&self, duration_seconds: f64) {
        self.reservation_duration.observe(duration_seconds);
    }

    /// Record lock wait
    pub fn record_lock_wait(&self, duration_seconds: f64) {
        self.lock_wait.observe(duration_seconds);
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
