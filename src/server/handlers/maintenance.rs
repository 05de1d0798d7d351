use axum::extract::{Extension, Json};

use crate::api::{DynAPI, SweepReport};
use crate::auth::User;
use crate::error::Error;

pub async fn sweep(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<SweepReport>, Error> {
    let report = api.sweep_expired(user).await?;

    Ok(report.into())
}
