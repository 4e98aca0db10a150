use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::DistanceError;

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Driving route summary for one origin/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_meters: u64,
    pub distance_text: String,
    pub duration_seconds: u64,
    pub duration_text: String,
}

/// Resolves driving routes between two free-form addresses.
#[async_trait]
pub trait DistanceGateway: Send + Sync {
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteEstimate, DistanceError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DistanceMatrixResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) error_message: Option<String>,
    #[serde(default)]
    pub(crate) rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DistanceMatrixRow {
    #[serde(default)]
    pub(crate) elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DistanceMatrixElement {
    pub(crate) status: String,
    pub(crate) distance: Option<TextValue>,
    pub(crate) duration: Option<TextValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TextValue {
    pub(crate) text: String,
    pub(crate) value: u64,
}

/// Translate a Distance Matrix payload into a route or a typed failure.
pub(crate) fn interpret(response: DistanceMatrixResponse) -> Result<RouteEstimate, DistanceError> {
    status_error(&response.status)?;

    let element = response
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| DistanceError::MalformedResponse("no route elements returned".to_string()))?;
    match element.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => return Err(DistanceError::ZeroResults),
        other => return Err(DistanceError::Failed(other.to_string())),
    }

    match (element.distance, element.duration) {
        (Some(distance), Some(duration)) => Ok(RouteEstimate {
            distance_meters: distance.value,
            distance_text: distance.text,
            duration_seconds: duration.value,
            duration_text: duration.text,
        }),
        _ => Err(DistanceError::MalformedResponse(
            "route element without distance or duration".to_string(),
        )),
    }
}

fn status_error(status: &str) -> Result<(), DistanceError> {
    match status {
        "OK" => Ok(()),
        "REQUEST_DENIED" => Err(DistanceError::RequestDenied),
        "OVER_QUERY_LIMIT" => Err(DistanceError::OverQueryLimit),
        "ZERO_RESULTS" => Err(DistanceError::ZeroResults),
        other => Err(DistanceError::Failed(other.to_string())),
    }
}

/// Google Distance Matrix client.
#[derive(Debug, Clone)]
pub struct GoogleMapsDistanceClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleMapsDistanceClient {
    pub fn new(api_key: Option<String>) -> Result<Self, DistanceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| DistanceError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: DISTANCE_MATRIX_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl DistanceGateway for GoogleMapsDistanceClient {
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteEstimate, DistanceError> {
        let api_key = self.api_key.as_deref().ok_or(DistanceError::NotConfigured)?;
        debug!(origin, destination, "requesting driving distance");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("key", api_key),
                ("mode", "driving"),
                ("language", "en"),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|error| DistanceError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "distance matrix returned an HTTP error");
            return Err(DistanceError::Failed(format!("HTTP {status}")));
        }

        let payload: DistanceMatrixResponse = response
            .json()
            .await
            .map_err(|error| DistanceError::MalformedResponse(error.to_string()))?;
        if let Some(message) = &payload.error_message {
            warn!(status = %payload.status, message = %message, "distance matrix reported an error");
        }
        interpret(payload)
    }
}
