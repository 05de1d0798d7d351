mod common;

use chrono::Duration;
use rust_decimal_macros::dec;

use common::{driver, offer, passenger, request_params, Harness};
use rideboard::api::{BidAPI, MaintenanceAPI, RideRequestAPI};
use rideboard::entities::{BidSort, BidStatus, RequestStatus};
use rideboard::error::ErrorKind;

#[tokio::test]
async fn sweep_closes_lapsed_requests_once() {
    let h = Harness::new();
    let rider = passenger();

    let request = h
        .engine
        .create_request(rider.clone(), request_params(h.now()))
        .await
        .unwrap();
    h.engine
        .create_bid(driver(), request.id, offer(dec!(30)))
        .await
        .unwrap();

    h.clock.advance(Duration::days(3) + Duration::hours(3));

    let report = h.engine.sweep_expired(h.admin.clone()).await.unwrap();
    assert_eq!((report.closed_requests, report.rejected_bids), (1, 1));

    let request = h
        .engine
        .find_request(rider.clone(), request.id)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Closed);

    let bids = h
        .engine
        .request_bids(rider, request.id, BidSort::Price)
        .await
        .unwrap();
    assert!(bids.iter().all(|bid| bid.status == BidStatus::Rejected));

    let again = h.engine.sweep_expired(h.admin.clone()).await.unwrap();
    assert_eq!((again.closed_requests, again.rejected_bids), (0, 0));
}

#[tokio::test]
async fn sweep_rejects_lapsed_bids_on_open_requests() {
    let h = Harness::new();
    let rider = passenger();
    let driver = driver();

    let request = h
        .engine
        .create_request(rider.clone(), request_params(h.now()))
        .await
        .unwrap();
    h.engine
        .create_bid(driver.clone(), request.id, offer(dec!(30)))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(25));

    let report = h.engine.sweep_expired(h.admin.clone()).await.unwrap();
    assert_eq!((report.closed_requests, report.rejected_bids), (0, 1));

    let request = h.engine.find_request(rider, request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Open);

    // the driver is free to bid again
    let fresh = h
        .engine
        .create_bid(driver, request.id, offer(dec!(28)))
        .await
        .unwrap();
    assert_eq!(fresh.status, BidStatus::Pending);
}

#[tokio::test]
async fn only_admins_sweep() {
    let h = Harness::new();

    let err = h.engine.sweep_expired(passenger()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = h.engine.sweep_expired(driver()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn lapsed_requests_drop_out_of_listings_before_any_sweep() {
    let h = Harness::new();
    let rider = passenger();

    let mut short_lived = request_params(h.now());
    short_lived.expires_at = Some(h.now() + Duration::hours(1));
    let lapsing = h
        .engine
        .create_request(rider.clone(), short_lived)
        .await
        .unwrap();
    let lasting = h
        .engine
        .create_request(rider.clone(), request_params(h.now()))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(2));

    let listed = h.engine.open_requests(passenger()).await.unwrap();
    assert!(listed.iter().all(|request| request.id != lapsing.id));
    assert!(listed.iter().any(|request| request.id == lasting.id));

    let err = h
        .engine
        .create_bid(driver(), lapsing.id, offer(dec!(30)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Expired);
}
