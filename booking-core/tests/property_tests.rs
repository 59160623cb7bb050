//! Property-based tests for seat inventory invariants
//!
//! These tests use proptest to verify:
//! - Seat conservation: available + Σ(seats booked) == total
//! - Counter bounds: 0 ≤ available ≤ total
//! - All-or-nothing: a rejected request leaves counter and ledger untouched
//! - Agreement with a sequential model of the same request stream

use booking_core::{
    BookingRequest, BookingService, Config, Error, Principal, Role, TrainId, TrainSpec,
};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

struct Harness {
    service: BookingService,
    riders: Vec<Principal>,
    train_id: TrainId,
    _temp: tempfile::TempDir,
}

async fn create_harness(total_seats: u32, riders: usize) -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    config.rocksdb.sync_writes = false;

    let service = BookingService::open(config).await.unwrap();
    let admin = service
        .register_user("admin", "hash", Role::Admin)
        .unwrap()
        .principal();

    let departure = Utc::now() + Duration::days(7);
    let train_id = service
        .add_train(
            &admin,
            TrainSpec {
                name: "Vande Bharat".to_string(),
                source: "Varanasi".to_string(),
                destination: "New Delhi".to_string(),
                departure_time: departure,
                arrival_time: departure + Duration::hours(8),
                total_seats,
                price: Decimal::new(175500, 2),
            },
        )
        .unwrap();

    let riders = (0..riders)
        .map(|i| {
            service
                .register_user(&format!("rider-{}", i), "hash", Role::Customer)
                .unwrap()
                .principal()
        })
        .collect();

    Harness {
        service,
        riders,
        train_id,
        _temp: temp_dir,
    }
}

/// Strategy for a stream of (rider index, seats requested)
fn requests_strategy() -> impl Strategy<Value = Vec<(usize, u32)>> {
    prop::collection::vec((0usize..3, 0u32..6), 1..25)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the counter always equals total minus the ledger sum
    #[test]
    fn prop_seat_conservation(total_seats in 1u32..30, requests in requests_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = create_harness(total_seats, 3).await;

            for (rider, seats) in requests {
                let _ = h
                    .service
                    .book_seat(
                        &h.riders[rider],
                        BookingRequest { train_id: h.train_id, seats_to_book: seats },
                    )
                    .await;

                let train = h.service.train(h.train_id).unwrap();
                prop_assert!(train.available_seats <= train.total_seats);
            }

            let audits = h.service.audit().await.unwrap();
            prop_assert_eq!(audits.len(), 1);
            prop_assert!(audits[0].is_consistent());
            prop_assert_eq!(
                u64::from(audits[0].available_seats) + audits[0].booked_seats,
                u64::from(total_seats)
            );
            Ok(())
        })?;
    }

    /// Property: outcomes match a sequential all-or-nothing model
    #[test]
    fn prop_matches_sequential_model(total_seats in 1u32..30, requests in requests_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = create_harness(total_seats, 3).await;
            let mut model_available = total_seats;
            let mut model_bookings = [0usize; 3];

            for (rider, seats) in requests {
                let result = h
                    .service
                    .book_seat(
                        &h.riders[rider],
                        BookingRequest { train_id: h.train_id, seats_to_book: seats },
                    )
                    .await;

                match result {
                    Ok(reservation) => {
                        prop_assert!(seats >= 1 && seats <= model_available);
                        model_available -= seats;
                        model_bookings[rider] += 1;
                        prop_assert_eq!(reservation.available_seats, model_available);
                    }
                    Err(Error::InvalidRequest(_)) => prop_assert_eq!(seats, 0),
                    Err(Error::InsufficientSeats { requested, available }) => {
                        prop_assert_eq!(requested, seats);
                        prop_assert_eq!(available, model_available);
                        prop_assert!(seats > model_available);
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }

            prop_assert_eq!(
                h.service.train(h.train_id).unwrap().available_seats,
                model_available
            );

            for (rider, expected) in h.riders.iter().zip(model_bookings) {
                match h.service.booking_details(rider) {
                    Ok(details) => prop_assert_eq!(details.len(), expected),
                    Err(Error::NoBookings(_)) => prop_assert_eq!(expected, 0),
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_sold_out_train_leaves_ledger_unchanged() {
    let h = create_harness(2, 2).await;

    let first = h
        .service
        .book_seat(
            &h.riders[0],
            BookingRequest {
                train_id: h.train_id,
                seats_to_book: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(first.available_seats, 0);

    for _ in 0..3 {
        let err = h
            .service
            .book_seat(
                &h.riders[1],
                BookingRequest {
                    train_id: h.train_id,
                    seats_to_book: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientSeats { .. }));
        assert!(!err.is_retryable());
    }

    let audit = h.service.audit().await.unwrap().remove(0);
    assert_eq!(audit.available_seats, 0);
    assert_eq!(audit.booking_count, 1);
    assert!(matches!(
        h.service.booking_details(&h.riders[1]),
        Err(Error::NoBookings(_))
    ));
}

#[tokio::test]
async fn test_zero_seat_request_never_books() {
    let h = create_harness(5, 1).await;

    let err = h
        .service
        .book_seat(
            &h.riders[0],
            BookingRequest {
                train_id: h.train_id,
                seats_to_book: 0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(err.http_status(), 400);

    assert_eq!(h.service.train(h.train_id).unwrap().available_seats, 5);
    assert!(h.service.booking_details(&h.riders[0]).is_err());
}
