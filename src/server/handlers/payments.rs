use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::DriverCredit;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct ConfirmParams {
    payment_id: String,
    succeeded: bool,
}

pub async fn confirm(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<ConfirmParams>,
) -> Result<Json<Option<DriverCredit>>, Error> {
    let lot = api
        .confirm_payment(user, params.payment_id, params.succeeded)
        .await?;

    Ok(lot.into())
}
