mod handlers;
mod identity;

pub use identity::identify;

use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::DynAPI;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{bids, bookings, credits, maintenance, payments, requests, rides};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/requests", post(requests::create).get(requests::list_open))
        .route("/requests/:id", get(requests::find))
        .route("/requests/:id/cancel", patch(requests::cancel))
        .route(
            "/requests/:id/bids",
            get(requests::list_bids).post(bids::create),
        )
        .route("/bids/:id", patch(bids::update))
        .route("/bids/:id/withdraw", patch(bids::withdraw))
        .route("/bids/:id/accept", patch(bids::accept))
        .route("/bids/:id/reject", patch(bids::reject))
        .route(
            "/credits/packages",
            get(credits::list_packages).post(credits::create_package),
        )
        .route(
            "/credits/packages/:id/deactivate",
            patch(credits::deactivate_package),
        )
        .route("/credits/purchase", post(credits::purchase))
        .route("/drivers/:driver_id/credits", get(credits::account))
        .route(
            "/drivers/:driver_id/credits/transactions",
            get(credits::transactions),
        )
        .route("/drivers/:driver_id/credits/refund", post(credits::refund))
        .route("/rides", post(rides::create).get(rides::list_active))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/rides/:id/complete", patch(rides::complete))
        .route(
            "/rides/:id/bookings",
            get(rides::list_bookings).post(rides::book),
        )
        .route("/bookings/:id", get(bookings::find))
        .route("/bookings/:id/cancel", patch(bookings::cancel))
        .route("/bookings/:id/status", patch(bookings::update_status))
        .route("/me/requests", get(requests::list_mine))
        .route("/me/bids", get(bids::list_mine))
        .route("/me/rides", get(rides::list_mine))
        .route("/me/bookings", get(bookings::list_mine))
        .route("/payments/confirm", post(payments::confirm))
        .route("/maintenance/sweep", post(maintenance::sweep))
        .layer(Extension(api))
}

pub async fn serve(api: DynAPI, addr: SocketAddr) -> Result<(), Error> {
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!(%err, "server error");
            unexpected_error()
        })
}
