//! Driving distance between donor home addresses and the collection facility.

pub mod address;
pub mod client;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::donation::{ProfileId, RepositoryError};

pub use address::{origin_address, FacilityAddress};
pub use client::{DistanceGateway, GoogleMapsDistanceClient, RouteEstimate};
pub use router::distance_router;
pub use service::DistanceService;

/// Last known route from a profile's home to the facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDistance {
    pub profile_id: ProfileId,
    pub distance_meters: u64,
    pub distance_text: String,
    pub duration_seconds: u64,
    pub duration_text: String,
    pub calculated_at: DateTime<Utc>,
}

impl ProfileDistance {
    pub fn kilometers(&self) -> f64 {
        self.distance_meters as f64 / 1000.0
    }
}

/// Storage for computed distances, one row per profile.
pub trait DistanceRepository: Send + Sync {
    /// Insert or replace the distance stored for `distance.profile_id`.
    fn save_distance(&self, distance: &ProfileDistance) -> Result<(), RepositoryError>;
    fn distance(&self, profile: ProfileId) -> Result<Option<ProfileDistance>, RepositoryError>;
    /// Stored distances no longer than `max_meters`, nearest first.
    fn distances_within(&self, max_meters: u64) -> Result<Vec<ProfileDistance>, RepositoryError>;
}

/// Failure reported by, or while talking to, the distance provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistanceError {
    #[error("maps API key is not configured")]
    NotConfigured,
    #[error("maps request denied, check the API key, billing, and API restrictions")]
    RequestDenied,
    #[error("maps query limit exceeded")]
    OverQueryLimit,
    #[error("no route found between the addresses")]
    ZeroResults,
    #[error("failed to calculate distance: {0}")]
    Failed(String),
    #[error("maps transport error: {0}")]
    Transport(String),
    #[error("unexpected maps response: {0}")]
    MalformedResponse(String),
}
