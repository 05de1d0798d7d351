use axum::extract::{Extension, Json, Path};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{CreditAccount, CreditPackage, CreditTransaction, DriverCredit};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreatePackageParams {
    name: String,
    credits: u32,
    price: Decimal,
}

#[derive(Serialize, Deserialize)]
pub struct PurchaseParams {
    package_id: Uuid,
    payment_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RefundParams {
    credits: u32,
    reason: String,
}

pub async fn list_packages(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<CreditPackage>>, Error> {
    let packages = api.list_packages(user).await?;

    Ok(packages.into())
}

pub async fn create_package(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreatePackageParams>,
) -> Result<Json<CreditPackage>, Error> {
    let package = api
        .create_package(user, params.name, params.credits, params.price)
        .await?;

    Ok(package.into())
}

pub async fn deactivate_package(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<CreditPackage>, Error> {
    let package = api.deactivate_package(user, id).await?;

    Ok(package.into())
}

pub async fn purchase(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<PurchaseParams>,
) -> Result<Json<DriverCredit>, Error> {
    let lot = api
        .purchase_credits(user, params.package_id, params.payment_id)
        .await?;

    Ok(lot.into())
}

pub async fn account(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<CreditAccount>, Error> {
    let account = api.credit_account(user, driver_id).await?;

    Ok(account.into())
}

pub async fn transactions(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<Vec<CreditTransaction>>, Error> {
    let transactions = api.credit_transactions(user, driver_id).await?;

    Ok(transactions.into())
}

pub async fn refund(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(driver_id): Path<Uuid>,
    Json(params): Json<RefundParams>,
) -> Result<Json<DriverCredit>, Error> {
    let lot = api
        .refund_credits(user, driver_id, params.credits, params.reason)
        .await?;

    Ok(lot.into())
}
