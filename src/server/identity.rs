use async_trait::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::error::{unauthenticated_error, Error};

const USER_ID: &str = "x-user-id";
const USER_ROLE: &str = "x-user-role";
const PHONE_VERIFIED: &str = "x-phone-verified";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Reads the caller identity that the gateway attaches to every request.
pub fn identify(headers: &HeaderMap) -> Result<User, Error> {
    let id = header(headers, USER_ID)
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(unauthenticated_error)?;

    let role: Role = header(headers, USER_ROLE)
        .ok_or_else(unauthenticated_error)?
        .trim()
        .parse()?;

    let phone_verified = match header(headers, PHONE_VERIFIED).map(str::trim) {
        None => false,
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => return Err(unauthenticated_error()),
    };

    Ok(User {
        id,
        role,
        phone_verified,
    })
}

#[async_trait]
impl<B> FromRequest<B> for User
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        identify(req.headers())
    }
}
