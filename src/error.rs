use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Internal,
    Unauthenticated,
    NotFound,
    Forbidden,
    InvalidState,
    Expired,
    Conflict,
    InsufficientResource,
    ValidationFailed,
}

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    fn new(code: i32, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    fn status_code(&self) -> StatusCode {
        match (self.kind, self.code) {
            (ErrorKind::Internal, _) => StatusCode::INTERNAL_SERVER_ERROR,
            (ErrorKind::Unauthenticated, _) => StatusCode::UNAUTHORIZED,
            (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
            (ErrorKind::Forbidden, _) => StatusCode::FORBIDDEN,
            (ErrorKind::InvalidState, _) | (ErrorKind::Conflict, _) => StatusCode::CONFLICT,
            (ErrorKind::Expired, _) => StatusCode::GONE,
            (ErrorKind::InsufficientResource, INSUFFICIENT_CREDITS) => {
                StatusCode::PAYMENT_REQUIRED
            }
            (ErrorKind::InsufficientResource, _) => StatusCode::CONFLICT,
            (ErrorKind::ValidationFailed, _) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map_or(false, |code| code == UNIQUE_VIOLATION);

        if is_unique_violation {
            return conflict_error();
        }

        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        authorization_engine_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self.kind {
            ErrorKind::Internal => "Internal Server Error",
            _ => self.message.as_str(),
        };

        let body = Json(json!({
            "code": self.code,
            "kind": self.kind,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// internal (1..=99)

pub fn env_var_error(err: env::VarError) -> Error {
    tracing::error!(%err, "environment variable error");
    Error::new(1, ErrorKind::Internal, "environment variable error")
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!(?err, "database error");
    Error::new(2, ErrorKind::Internal, "database error")
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    tracing::warn!(%err, "reqwest error");
    Error::new(3, ErrorKind::Internal, "reqwest error")
}

pub fn upstream_error() -> Error {
    Error::new(4, ErrorKind::Internal, "upstream error")
}

pub fn unexpected_error() -> Error {
    Error::new(5, ErrorKind::Internal, "unexpected error")
}

pub fn authorization_engine_error(err: oso::OsoError) -> Error {
    tracing::error!(%err, "authorization engine error");
    Error::new(6, ErrorKind::Internal, "authorization engine error")
}

// not found

pub fn request_not_found_error() -> Error {
    Error::new(100, ErrorKind::NotFound, "ride request not found")
}

pub fn bid_not_found_error() -> Error {
    Error::new(101, ErrorKind::NotFound, "bid not found")
}

pub fn ride_not_found_error() -> Error {
    Error::new(102, ErrorKind::NotFound, "ride not found")
}

pub fn booking_not_found_error() -> Error {
    Error::new(103, ErrorKind::NotFound, "booking not found")
}

pub fn package_not_found_error() -> Error {
    Error::new(104, ErrorKind::NotFound, "credit package not found")
}

pub fn lot_not_found_error() -> Error {
    Error::new(105, ErrorKind::NotFound, "credit lot not found")
}

pub fn payment_not_found_error() -> Error {
    Error::new(106, ErrorKind::NotFound, "payment not found")
}

// forbidden

pub fn forbidden_error() -> Error {
    Error::new(110, ErrorKind::Forbidden, "forbidden")
}

pub fn self_bid_forbidden_error() -> Error {
    Error::new(111, ErrorKind::Forbidden, "cannot bid on your own ride request")
}

pub fn self_booking_forbidden_error() -> Error {
    Error::new(112, ErrorKind::Forbidden, "cannot book your own ride")
}

// invalid state

pub fn request_not_open_error() -> Error {
    Error::new(120, ErrorKind::InvalidState, "ride request is not open")
}

pub fn bid_not_pending_error() -> Error {
    Error::new(121, ErrorKind::InvalidState, "bid is not pending")
}

pub fn ride_not_active_error() -> Error {
    Error::new(122, ErrorKind::InvalidState, "ride is not active")
}

pub fn invalid_booking_transition_error() -> Error {
    Error::new(123, ErrorKind::InvalidState, "invalid booking status transition")
}

pub fn payment_already_settled_error() -> Error {
    Error::new(124, ErrorKind::InvalidState, "payment already settled")
}

// expired

pub fn request_expired_error() -> Error {
    Error::new(130, ErrorKind::Expired, "ride request has expired")
}

pub fn bid_expired_error() -> Error {
    Error::new(131, ErrorKind::Expired, "bid has expired")
}

// conflict

pub fn conflict_error() -> Error {
    Error::new(140, ErrorKind::Conflict, "conflict")
}

pub fn duplicate_bid_error() -> Error {
    Error::new(
        141,
        ErrorKind::Conflict,
        "an active bid by this driver already exists for the ride request",
    )
}

pub fn duplicate_booking_error() -> Error {
    Error::new(
        142,
        ErrorKind::Conflict,
        "an active booking by this passenger already exists for the ride",
    )
}

pub fn schedule_conflict_error() -> Error {
    Error::new(
        143,
        ErrorKind::Conflict,
        "another active ride departs within two hours of this one",
    )
}

// insufficient resource

const INSUFFICIENT_CREDITS: i32 = 150;

pub fn insufficient_credits_error() -> Error {
    Error::new(
        INSUFFICIENT_CREDITS,
        ErrorKind::InsufficientResource,
        "insufficient credits",
    )
}

pub fn seats_unavailable_error() -> Error {
    Error::new(151, ErrorKind::InsufficientResource, "not enough seats available")
}

// validation

pub fn budget_violation_error() -> Error {
    Error::new(
        160,
        ErrorKind::ValidationFailed,
        "price offer is outside the requested budget",
    )
}

pub fn time_window_violation_error() -> Error {
    Error::new(
        161,
        ErrorKind::ValidationFailed,
        "proposed time is outside the requested time window",
    )
}

pub fn invalid_input_error(message: impl Into<String>) -> Error {
    Error::new(162, ErrorKind::ValidationFailed, message)
}

pub fn content_rejected_error(reasons: &[String]) -> Error {
    let message = if reasons.is_empty() {
        "content rejected by moderation".to_string()
    } else {
        format!("content rejected by moderation: {}", reasons.join(", "))
    };

    Error::new(163, ErrorKind::ValidationFailed, message)
}

// authentication

pub fn unauthenticated_error() -> Error {
    Error::new(170, ErrorKind::Unauthenticated, "missing or malformed identity")
}

pub fn phone_not_verified_error() -> Error {
    Error::new(171, ErrorKind::Forbidden, "phone number is not verified")
}
