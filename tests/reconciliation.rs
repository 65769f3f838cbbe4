//! End-to-end behaviour of the reconciliation engine through the public API.

use std::{sync::Barrier, thread};

use bloodbank::{
    BloodType, Config, Directory, Error, InventoryStore, ReconciliationEngine, RequestLedger,
    RequestStatus,
};
use chrono::NaiveDate;
use test_case::test_case;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn fulfilment_draws_stock_and_closes_the_request() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);

    let unit = engine.add_unit("A+", 10, date("2024-01-15"), None).unwrap();
    let request = engine
        .add_request("St Mary's", "A+", 2, date("2024-02-01"))
        .unwrap();

    engine.fulfill_request(request, date("2024-02-01")).unwrap();

    assert_eq!(inventory.find_unit(unit).unwrap().quantity(), 8);
    assert_eq!(
        ledger.find(request).unwrap().status(),
        RequestStatus::Fulfilled
    );
}

#[test]
fn shortfall_is_rejected_without_side_effects() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);

    let unit = engine.add_unit("O-", 5, date("2024-01-20"), None).unwrap();
    let request = engine
        .add_request("St Mary's", "O-", 10, date("2024-02-01"))
        .unwrap();
    let units_before = inventory.list_all_units();

    let result = engine.fulfill_request(request, date("2024-02-01"));

    assert!(matches!(result, Err(Error::InsufficientStock { .. })));
    assert_eq!(inventory.list_all_units(), units_before);
    assert_eq!(inventory.find_unit(unit).unwrap().quantity(), 5);
    assert_eq!(ledger.find(request).unwrap().status(), RequestStatus::Pending);
}

#[test]
fn purge_removes_stock_past_its_shelf_life() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);

    engine.add_unit("B+", 3, date("2023-10-01"), None).unwrap();

    let report = engine.purge_expired_stock(date("2024-01-01"));

    assert_eq!(report.count(), 1);
    assert_eq!(engine.total_available("B+", date("2024-01-01")), Ok(0));
}

#[test_case("2024-01-01", "2024-02-11", 4; "day 41 is usable")]
#[test_case("2024-01-01", "2024-02-12", 0; "day 42 is expired")]
#[test_case("2024-01-20", "2024-03-01", 4; "leap february day 41")]
#[test_case("2024-01-20", "2024-03-02", 0; "leap february day 42")]
#[test_case("2023-01-20", "2023-03-02", 4; "common february day 41")]
#[test_case("2023-01-20", "2023-03-03", 0; "common february day 42")]
fn availability_follows_the_expiry_boundary(donated: &str, as_of: &str, expected: u64) {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);
    engine.add_unit("AB-", 4, date(donated), None).unwrap();

    assert_eq!(engine.total_available("AB-", date(as_of)), Ok(expected));
}

#[test]
fn oldest_stock_is_used_first() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);

    let d3 = engine.add_unit("O+", 4, date("2024-01-30"), None).unwrap();
    let d1 = engine.add_unit("O+", 4, date("2024-01-10"), None).unwrap();
    let d2 = engine.add_unit("O+", 4, date("2024-01-20"), None).unwrap();
    let request = engine.add_request("H1", "O+", 3, date("2024-02-01")).unwrap();

    engine.fulfill_request(request, date("2024-02-01")).unwrap();

    let quantity = |id| inventory.find_unit(id).unwrap().quantity();
    assert_eq!((quantity(d1), quantity(d2), quantity(d3)), (1, 4, 4));
}

#[test]
fn finished_requests_reject_every_further_change() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);
    engine.add_unit("A-", 5, date("2024-01-20"), None).unwrap();

    let fulfilled = engine.add_request("H1", "A-", 1, date("2024-02-01")).unwrap();
    let cancelled = engine.add_request("H1", "A-", 1, date("2024-02-01")).unwrap();
    engine.fulfill_request(fulfilled, date("2024-02-01")).unwrap();
    engine.cancel_request(cancelled).unwrap();

    for (id, status) in [
        (fulfilled, RequestStatus::Fulfilled),
        (cancelled, RequestStatus::Cancelled),
    ] {
        for next in RequestStatus::ALL {
            assert!(ledger.set_status(id, next).is_err());
        }
        assert!(engine.fulfill_request(id, date("2024-02-01")).is_err());
        assert!(engine.cancel_request(id).is_err());
        assert!(engine.update_request(id, None, Some(2), None).is_err());
        assert_eq!(ledger.find(id).unwrap().status(), status);
    }
    assert_eq!(engine.total_available("A-", date("2024-02-01")), Ok(4));
}

#[test]
fn concurrent_fulfilment_never_over_allocates() {
    const THREADS: usize = 8;
    const REQUESTS_PER_THREAD: usize = 25;

    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);
    let day = date("2024-02-01");

    // 100 units of stock against 200 requests of 1
    for _ in 0..10 {
        engine.add_unit("O-", 10, date("2024-01-25"), None).unwrap();
    }
    let requests: Vec<_> = (0..THREADS * REQUESTS_PER_THREAD)
        .map(|_| engine.add_request("H1", "O-", 1, day).unwrap())
        .collect();

    let barrier = Barrier::new(THREADS + 1);
    let served: usize = thread::scope(|scope| {
        let handles: Vec<_> = requests
            .chunks(REQUESTS_PER_THREAD)
            .enumerate()
            .map(|(n, chunk)| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let mut served = 0;
                    for &id in chunk {
                        if engine.fulfill_request(id, day).is_ok() {
                            served += 1;
                        }
                        // interleave purges, which must not disturb fresh stock
                        if n == 0 {
                            engine.purge_expired_stock(day);
                        }
                    }
                    served
                })
            })
            .collect();

        // a concurrent purge thread touching the same blood type
        scope.spawn(|| {
            barrier.wait();
            for _ in 0..50 {
                engine.purge_expired_stock(day);
            }
        });

        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(served, 100);
    assert_eq!(inventory.total_available(BloodType::ONegative, day), 0);
    assert_eq!(ledger.list_by_status(RequestStatus::Fulfilled).len(), 100);
    assert_eq!(ledger.list_by_status(RequestStatus::Pending).len(), 100);
    assert!(inventory.list_all_units().iter().all(|unit| unit.quantity() == 0));
}

#[test]
fn fulfilment_and_cancellation_race_to_a_single_outcome() {
    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);
    let day = date("2024-02-01");
    engine.add_unit("B-", 100, date("2024-01-30"), None).unwrap();

    let requests: Vec<_> = (0..50)
        .map(|_| engine.add_request("H1", "B-", 2, day).unwrap())
        .collect();

    thread::scope(|scope| {
        scope.spawn(|| {
            for &id in &requests {
                let _ = engine.fulfill_request(id, day);
            }
        });
        scope.spawn(|| {
            for &id in requests.iter().rev() {
                let _ = engine.cancel_request(id);
            }
        });
    });

    let fulfilled = ledger.list_by_status(RequestStatus::Fulfilled).len() as u64;
    assert_eq!(ledger.list_by_status(RequestStatus::Pending).len(), 0);
    assert_eq!(
        inventory.total_available(BloodType::BNegative, day),
        100 - 2 * fulfilled
    );
}

#[test]
fn changing_blood_type_during_fulfilment_draws_from_one_shelf() {
    const REQUESTS: u32 = 200;
    const AMOUNT: u32 = 3;

    let inventory = InventoryStore::default();
    let ledger = RequestLedger::default();
    let engine = ReconciliationEngine::new(&inventory, &ledger);
    let day = date("2024-02-01");
    let stock = u64::from(REQUESTS * AMOUNT);

    engine.add_unit("A+", i64::from(REQUESTS * AMOUNT), date("2024-01-25"), None).unwrap();
    engine.add_unit("B+", i64::from(REQUESTS * AMOUNT), date("2024-01-25"), None).unwrap();
    let requests: Vec<_> = (0..REQUESTS)
        .map(|_| engine.add_request("H1", "A+", i64::from(AMOUNT), day).unwrap())
        .collect();

    let barrier = Barrier::new(2);
    thread::scope(|scope| {
        scope.spawn(|| {
            barrier.wait();
            for &id in &requests {
                let _ = engine.update_request(id, Some("B+"), None, None);
            }
        });
        scope.spawn(|| {
            barrier.wait();
            for &id in &requests {
                engine.fulfill_request(id, day).unwrap();
            }
        });
    });

    let mut served = [0_u64; 2];
    for &id in &requests {
        let request = ledger.find(id).unwrap();
        assert_eq!(request.status(), RequestStatus::Fulfilled);
        match request.blood_type() {
            BloodType::APositive => served[0] += u64::from(AMOUNT),
            BloodType::BPositive => served[1] += u64::from(AMOUNT),
            other => panic!("unexpected blood type {other}"),
        }
    }
    assert_eq!(served[0] + served[1], stock);
    assert_eq!(inventory.total_available(BloodType::APositive, day), stock - served[0]);
    assert_eq!(inventory.total_available(BloodType::BPositive, day), stock - served[1]);
}

#[test]
fn a_directory_round_trip_preserves_the_bank() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("bank");

    let directory = Directory::init(root.clone(), Config::default()).unwrap();
    let engine = directory.engine();
    let unit = engine.add_unit("A+", 10, date("2024-01-15"), Some("D7")).unwrap();
    let fulfilled = engine.add_request("H1", "A+", 4, date("2024-02-01")).unwrap();
    let pending = engine.add_request("H2", "A+", 9, date("2024-02-01")).unwrap();
    engine.fulfill_all_pending(date("2024-02-01"));
    directory.flush().unwrap();

    let reopened = Directory::new(root).load_all().unwrap();
    assert_eq!(reopened.inventory().list_all_units(), directory.inventory().list_all_units());
    assert_eq!(reopened.ledger().list_all_requests(), directory.ledger().list_all_requests());
    assert_eq!(reopened.inventory().find_unit(unit).unwrap().quantity(), 6);
    assert_eq!(
        reopened.ledger().find(fulfilled).unwrap().status(),
        RequestStatus::Fulfilled
    );
    assert!(reopened.ledger().find(pending).unwrap().is_pending());

    let next = reopened
        .engine()
        .add_request("H3", "O+", 1, date("2024-02-02"))
        .unwrap();
    assert_eq!(next.get(), 3);
}
