mod common;

use futures::future::join_all;
use rust_decimal_macros::dec;

use common::{driver, offer, passenger, request_params, ride_params, Harness};
use rideboard::api::{BidAPI, BookingAPI, RideAPI, RideRequestAPI};
use rideboard::entities::{BidSort, BidStatus};
use rideboard::error::ErrorKind;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_accepts_leave_one_winner() {
    let h = Harness::new();
    let rider = passenger();

    let request = h
        .engine
        .create_request(rider.clone(), request_params(h.now()))
        .await
        .unwrap();

    let mut bids = Vec::new();
    for price in [dec!(22), dec!(26), dec!(30), dec!(34)] {
        bids.push(
            h.engine
                .create_bid(driver(), request.id, offer(price))
                .await
                .unwrap(),
        );
    }

    let attempts = bids.iter().map(|bid| {
        let engine = h.engine.clone();
        let rider = rider.clone();
        let bid_id = bid.id;
        tokio::spawn(async move { engine.accept_bid(rider, bid_id).await })
    });

    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| err.kind == ErrorKind::InvalidState));

    let listed = h
        .engine
        .request_bids(rider, request.id, BidSort::Status)
        .await
        .unwrap();
    let accepted = listed
        .iter()
        .filter(|bid| bid.status == BidStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_credit_posts_only_one_ride() {
    let h = Harness::new();
    let driver = driver();
    h.fund(&driver, 1).await;

    let attempts = [5, 10, 15, 20].into_iter().map(|hours| {
        let engine = h.engine.clone();
        let driver = driver.clone();
        let params = ride_params(h.now(), hours, 3);
        tokio::spawn(async move { engine.post_ride(driver, params).await })
    });

    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| err.code == 150));

    assert_eq!(h.balance(&driver).await, 0);
    assert_eq!(h.engine.driver_rides(driver).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seat_goes_to_one_passenger() {
    let h = Harness::new();
    let driver = driver();
    h.fund(&driver, 1).await;

    let ride = h
        .engine
        .post_ride(driver.clone(), ride_params(h.now(), 24, 1))
        .await
        .unwrap();

    let attempts = (0..5).map(|_| {
        let engine = h.engine.clone();
        let rider = passenger();
        tokio::spawn(async move { engine.create_booking(rider, ride.id, 1).await })
    });

    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| err.code == 151));

    let ride = h.engine.find_ride(driver, ride.id).await.unwrap();
    assert_eq!(ride.available_seats, 0);
}
