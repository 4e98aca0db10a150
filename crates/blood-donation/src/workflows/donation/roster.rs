use std::collections::BTreeSet;
use std::sync::Arc;

use super::domain::{Account, BloodUnit, EventId, EventRegistration, Profile, ProfileId, TimeSlotId};
use super::error::DonationError;
use super::paging::{AccountSortKey, Page, PageRequest, ProfileSortKey};
use super::repository::{DonationRepository, RepositoryError};
use super::validator::DonationValidator;

/// Read-side views over an event's active (non-cancelled) registrations.
pub struct DonorRoster<R> {
    repository: Arc<R>,
    validator: DonationValidator<R>,
}

impl<R> Clone for DonorRoster<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            validator: self.validator.clone(),
        }
    }
}

impl<R: DonationRepository> DonorRoster<R> {
    pub fn new(repository: Arc<R>) -> Self {
        let validator = DonationValidator::new(Arc::clone(&repository));
        Self {
            repository,
            validator,
        }
    }

    pub fn active_registrations(
        &self,
        event_id: EventId,
    ) -> Result<Vec<EventRegistration>, DonationError> {
        let mut registrations = self.repository.registrations_for_event(event_id)?;
        registrations.retain(|registration| registration.status.is_active());
        Ok(registrations)
    }

    /// Profile IDs holding an active registration for the event.
    pub fn registered_profile_ids(
        &self,
        event_id: EventId,
    ) -> Result<BTreeSet<ProfileId>, DonationError> {
        Ok(self
            .active_registrations(event_id)?
            .into_iter()
            .map(|registration| registration.profile_id)
            .collect())
    }

    pub fn donor_profiles(&self, event_id: EventId) -> Result<Vec<Profile>, DonationError> {
        self.validator.event(event_id)?;
        self.active_registrations(event_id)?
            .iter()
            .map(|registration| self.validator.profile(registration.profile_id))
            .collect()
    }

    pub fn donor_profiles_page(
        &self,
        event_id: EventId,
        request: &PageRequest<ProfileSortKey>,
    ) -> Result<Page<Profile>, DonationError> {
        let profiles = self.donor_profiles(event_id)?;
        Ok(request.apply(profiles))
    }

    /// Accounts of the active donors booked into one time slot.
    pub fn donors_page(
        &self,
        event_id: EventId,
        time_slot_id: TimeSlotId,
        request: &PageRequest<AccountSortKey>,
    ) -> Result<Page<Account>, DonationError> {
        let event = self.validator.event(event_id)?;
        let slot = self.validator.slot_of(&event, time_slot_id)?;

        let accounts = self
            .active_registrations(event.id)?
            .into_iter()
            .filter(|registration| registration.time_slot_id == Some(slot.id))
            .map(|registration| {
                self.repository
                    .account(registration.account_id)?
                    .ok_or(RepositoryError::NotFound)
            })
            .collect::<Result<Vec<Account>, RepositoryError>>()?;
        Ok(request.apply(accounts))
    }

    pub fn blood_units(&self, event_id: EventId) -> Result<Vec<BloodUnit>, DonationError> {
        self.validator.event(event_id)?;
        Ok(self.repository.blood_units_for_event(event_id)?)
    }

    /// Active registrations currently holding a place in `slot`.
    pub fn slot_occupancy(
        &self,
        event_id: EventId,
        slot: TimeSlotId,
    ) -> Result<usize, DonationError> {
        Ok(self
            .active_registrations(event_id)?
            .iter()
            .filter(|registration| registration.time_slot_id == Some(slot))
            .count())
    }
}
