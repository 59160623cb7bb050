//! Concurrency and durability tests
//!
//! Many tasks race for the same seats; the store must never oversell and
//! the counter must always match the ledger.

use booking_core::{
    BookingRequest, BookingService, Config, Error, Principal, Role, TrainId, TrainSpec,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    config.rocksdb.sync_writes = false;
    config.service.request_timeout_ms = 30_000;
    config
}

fn train_spec(name: &str, total_seats: u32) -> TrainSpec {
    let departure = Utc::now() + Duration::days(1);
    TrainSpec {
        name: name.to_string(),
        source: "Ahmedabad".to_string(),
        destination: "Mumbai".to_string(),
        departure_time: departure,
        arrival_time: departure + Duration::hours(7),
        total_seats,
        price: Decimal::new(95000, 2),
    }
}

fn admin(service: &BookingService) -> Principal {
    service
        .register_user("controller", "hash", Role::Admin)
        .unwrap()
        .principal()
}

fn riders(service: &BookingService, n: usize) -> Vec<Principal> {
    (0..n)
        .map(|i| {
            service
                .register_user(&format!("passenger-{}", i), "hash", Role::Customer)
                .unwrap()
                .principal()
        })
        .collect()
}

async fn book(
    service: &BookingService,
    principal: &Principal,
    train_id: TrainId,
    seats: u32,
) -> booking_core::Result<u32> {
    service
        .book_seat(
            principal,
            BookingRequest {
                train_id,
                seats_to_book: seats,
            },
        )
        .await
        .map(|r| r.seats_booked)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_k_of_n_single_seat_requests_succeed() {
    let temp = tempfile::tempdir().unwrap();
    let service = Arc::new(BookingService::open(test_config(&temp)).await.unwrap());
    let admin = admin(&service);
    let train_id = service.add_train(&admin, train_spec("Karnavati", 25)).unwrap();
    let riders = riders(&service, 100);

    let mut tasks = Vec::new();
    for rider in riders {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            book(&service, &rider, train_id, 1).await
        }));
    }

    let mut successes = 0;
    let mut sold_out = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::InsufficientSeats { .. }) => sold_out += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(successes, 25);
    assert_eq!(sold_out, 75);
    assert_eq!(service.train(train_id).unwrap().available_seats, 0);

    let audit = service.audit().await.unwrap().remove(0);
    assert_eq!(audit.booking_count, 25);
    assert!(audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_mixed_sizes_never_oversell() {
    let temp = tempfile::tempdir().unwrap();
    let service = Arc::new(BookingService::open(test_config(&temp)).await.unwrap());
    let admin = admin(&service);
    let train_id = service.add_train(&admin, train_spec("Gujarat Mail", 40)).unwrap();
    let riders = riders(&service, 60);

    let mut tasks = Vec::new();
    for (i, rider) in riders.into_iter().enumerate() {
        let service = service.clone();
        let seats = (i % 4) as u32 + 1;
        tasks.push(tokio::spawn(async move {
            book(&service, &rider, train_id, seats).await
        }));
    }

    let mut sold = 0u32;
    for task in tasks {
        match task.await.unwrap() {
            Ok(seats) => sold += seats,
            Err(Error::InsufficientSeats { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    let train = service.train(train_id).unwrap();
    assert!(sold <= 40);
    assert_eq!(train.available_seats, 40 - sold);

    let audit = service.audit().await.unwrap().remove(0);
    assert_eq!(audit.booked_seats, u64::from(sold));
    assert!(audit.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_trains_are_booked_independently() {
    let temp = tempfile::tempdir().unwrap();
    let service = Arc::new(BookingService::open(test_config(&temp)).await.unwrap());
    let admin = admin(&service);

    let trains: Vec<TrainId> = (0..4)
        .map(|i| {
            service
                .add_train(&admin, train_spec(&format!("Shuttle {}", i), 10 + i))
                .unwrap()
        })
        .collect();
    let riders = riders(&service, 15);

    let mut tasks = Vec::new();
    for &train_id in &trains {
        for rider in &riders {
            let service = service.clone();
            let rider = *rider;
            tasks.push(tokio::spawn(async move {
                (train_id, book(&service, &rider, train_id, 1).await.is_ok())
            }));
        }
    }

    let mut per_train = std::collections::HashMap::new();
    for task in tasks {
        let (train_id, ok) = task.await.unwrap();
        if ok {
            *per_train.entry(train_id).or_insert(0u32) += 1;
        }
    }

    for (i, train_id) in trains.iter().enumerate() {
        assert_eq!(per_train.get(train_id).copied(), Some(10 + i as u32));
        assert_eq!(service.train(*train_id).unwrap().available_seats, 0);
    }

    let audits = service.audit().await.unwrap();
    assert_eq!(audits.len(), 4);
    assert!(audits.iter().all(|a| a.is_consistent()));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();

    let (train_id, rider) = {
        let service = BookingService::open(test_config(&temp)).await.unwrap();
        let admin = admin(&service);
        let train_id = service.add_train(&admin, train_spec("Saurashtra", 6)).unwrap();
        let rider = riders(&service, 1).remove(0);

        book(&service, &rider, train_id, 4).await.unwrap();
        service.shutdown().unwrap();
        (train_id, rider)
    };

    let service = BookingService::open(test_config(&temp)).await.unwrap();
    assert_eq!(service.train(train_id).unwrap().available_seats, 2);
    assert_eq!(service.principal(rider.user_id).unwrap(), rider);

    let details = service.booking_details(&rider).unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].seats_booked, 4);
    assert_eq!(details[0].train_name, "Saurashtra");

    let err = service
        .add_train(&admin_again(&service), train_spec("Saurashtra", 6))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName(_)));
}

fn admin_again(service: &BookingService) -> Principal {
    service
        .find_user("controller")
        .unwrap()
        .unwrap()
        .principal()
}
