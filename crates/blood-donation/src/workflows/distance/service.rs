use std::sync::Arc;

use tracing::{error, info};

use super::address::{origin_address, FacilityAddress};
use super::client::DistanceGateway;
use super::{DistanceError, DistanceRepository, ProfileDistance};
use crate::clock::Clock;
use crate::workflows::donation::{
    ArgumentError, DonationError, DonationRepository, DonationValidator, ProfileId,
};

/// Computes and stores how far each donor lives from the facility.
pub struct DistanceService<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
    validator: DonationValidator<R>,
    facility: FacilityAddress,
    clock: Arc<dyn Clock>,
}

impl<R, G> DistanceService<R, G>
where
    R: DonationRepository + DistanceRepository + 'static,
    G: DistanceGateway + 'static,
{
    pub fn new(
        repository: Arc<R>,
        gateway: Arc<G>,
        facility: FacilityAddress,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator: DonationValidator::new(Arc::clone(&repository)),
            repository,
            gateway,
            facility,
            clock,
        }
    }

    pub fn facility(&self) -> &FacilityAddress {
        &self.facility
    }

    /// Look up the driving route for `profile_id` and persist it.
    pub async fn calculate(&self, profile_id: ProfileId) -> Result<ProfileDistance, DonationError> {
        let profile = self.validator.profile(profile_id)?;
        let origin = origin_address(&profile);
        if origin.is_empty() {
            return Err(ArgumentError::MissingAddress(profile.id).into());
        }
        let destination = self.facility.formatted();
        if destination.is_empty() {
            return Err(DistanceError::Failed("facility address is not configured".to_string()).into());
        }

        let route = self
            .gateway
            .route(&origin, &destination)
            .await
            .map_err(|failure| {
                error!(profile = %profile.id, error = %failure, "distance lookup failed");
                failure
            })?;

        let distance = ProfileDistance {
            profile_id: profile.id,
            distance_meters: route.distance_meters,
            distance_text: route.distance_text,
            duration_seconds: route.duration_seconds,
            duration_text: route.duration_text,
            calculated_at: self.clock.now(),
        };
        self.repository.save_distance(&distance)?;
        info!(profile = %profile.id, meters = distance.distance_meters, "profile distance stored");
        Ok(distance)
    }

    pub fn stored(&self, profile_id: ProfileId) -> Result<Option<ProfileDistance>, DonationError> {
        self.validator.profile(profile_id)?;
        Ok(self.repository.distance(profile_id)?)
    }

    /// Profiles with a stored distance of at most `max_km`, nearest first.
    pub fn profiles_within(&self, max_km: f64) -> Result<Vec<ProfileDistance>, DonationError> {
        if !max_km.is_finite() || max_km < 0.0 {
            return Err(ArgumentError::InvalidDistance(max_km.to_string()).into());
        }
        let max_meters = (max_km * 1000.0).round() as u64;
        Ok(self.repository.distances_within(max_meters)?)
    }
}
