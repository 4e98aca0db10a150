use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::distance::DistanceError;
use crate::workflows::donation::DonationError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Donation(DonationError),
    Maps(DistanceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Donation(err) => write!(f, "donation workflow error: {}", err),
            AppError::Maps(err) => write!(f, "maps client error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Donation(err) => Some(err),
            AppError::Maps(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Donation(DonationError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Donation(DonationError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            AppError::Donation(DonationError::InvalidState(_)) => StatusCode::CONFLICT,
            AppError::Donation(DonationError::ExternalService(_)) | AppError::Maps(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Donation(DonationError::Repository(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<DonationError> for AppError {
    fn from(value: DonationError) -> Self {
        Self::Donation(value)
    }
}

impl From<DistanceError> for AppError {
    fn from(value: DistanceError) -> Self {
        Self::Maps(value)
    }
}
