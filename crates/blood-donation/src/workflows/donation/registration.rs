use std::sync::Arc;

use tracing::{info, warn};

use super::checkin::CheckinTokenManager;
use super::domain::{
    DonationEvent, EventId, EventRegistration, EventStatus, NewRegistration, Profile, ProfileId,
    RegistrationStatus, TimeSlotId,
};
use super::error::{ArgumentError, DonationError, StateViolation};
use super::repository::{
    DonationRepository, Notification, NotificationSender, RegistrationCommit, RepositoryError,
};
use super::validator::DonationValidator;
use crate::clock::Clock;

/// Donor-facing sign-up for approved events and the status moves made at the desk.
pub struct RegistrationDesk<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    validator: DonationValidator<R>,
    tokens: CheckinTokenManager<R>,
}

impl<R, N> RegistrationDesk<R, N>
where
    R: DonationRepository,
    N: NotificationSender,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: DonationValidator::new(Arc::clone(&repository)),
            tokens: CheckinTokenManager::new(Arc::clone(&repository), clock),
            repository,
            notifier,
        }
    }

    /// Register one of the account's profiles, attaching a fresh check-in token.
    pub fn register(
        &self,
        event_id: EventId,
        email: &str,
        profile_id: ProfileId,
        time_slot_id: Option<TimeSlotId>,
        form: String,
    ) -> Result<EventRegistration, DonationError> {
        let event = self.validator.event_in_status(event_id, EventStatus::Approved)?;
        let account = self.validator.account_by_email(email)?;
        let profile = self.validator.profile(profile_id)?;
        if profile.account_id != account.id {
            return Err(ArgumentError::ForeignProfile(profile.id).into());
        }

        let existing = self
            .repository
            .registration_for_profile(event.id, profile.id)?;
        if let Some(existing) = &existing {
            if existing.status.is_active() {
                return Err(StateViolation::AlreadyRegistered(profile.id).into());
            }
        }

        let slot_capacity = match time_slot_id {
            Some(slot_id) => Some(self.validator.slot_of(&event, slot_id)?.max_capacity),
            None => None,
        };

        let token = self.tokens.issue(&profile, &event);
        let commit = RegistrationCommit {
            registration: NewRegistration {
                event_id: event.id,
                account_id: account.id,
                profile_id: profile.id,
                time_slot_id,
                form,
                checkin_token: Some(token.token.clone()),
            },
            reactivates: existing.map(|cancelled| cancelled.id),
            slot_capacity,
            token,
        };
        let registration = self
            .repository
            .commit_registration(commit)
            .map_err(|error| match (error, time_slot_id) {
                (RepositoryError::SlotFull, Some(slot)) => {
                    DonationError::InvalidState(StateViolation::SlotFull(slot))
                }
                (RepositoryError::Conflict, _) => {
                    DonationError::InvalidState(StateViolation::AlreadyRegistered(profile.id))
                }
                (error, _) => DonationError::from(error),
            })?;

        info!(
            event = %event.id,
            profile = %profile.id,
            registration = %registration.id,
            "donor registered"
        );
        self.confirm(&account.email, &profile, &event);
        Ok(registration)
    }

    pub fn check_in(
        &self,
        event_id: EventId,
        profile_id: ProfileId,
    ) -> Result<EventRegistration, DonationError> {
        self.transition(event_id, profile_id, RegistrationStatus::CheckedIn, |status| {
            status == RegistrationStatus::Registered
        })
    }

    pub fn cancel(
        &self,
        event_id: EventId,
        profile_id: ProfileId,
    ) -> Result<EventRegistration, DonationError> {
        self.transition(event_id, profile_id, RegistrationStatus::Cancelled, |status| {
            matches!(
                status,
                RegistrationStatus::Registered | RegistrationStatus::CheckedIn
            )
        })
    }

    fn transition(
        &self,
        event_id: EventId,
        profile_id: ProfileId,
        to: RegistrationStatus,
        allowed: impl Fn(RegistrationStatus) -> bool,
    ) -> Result<EventRegistration, DonationError> {
        let event = self.validator.event(event_id)?;
        let profile = self.validator.profile(profile_id)?;
        let mut registration = self.validator.registration(&profile, &event)?;
        if !allowed(registration.status) {
            return Err(StateViolation::RegistrationTransition {
                profile: profile.id,
                from: registration.status,
                to,
            }
            .into());
        }

        registration.status = to;
        self.repository.update_registration(&registration)?;
        info!(event = %event.id, profile = %profile.id, status = to.label(), "registration updated");
        Ok(registration)
    }

    fn confirm(&self, recipient: &str, profile: &Profile, event: &DonationEvent) {
        let notification = Notification {
            recipient: recipient.to_string(),
            subject: format!("Registration confirmed: {}", event.name),
            body: format!(
                "{} is registered for {} on {} at {}. Bring your check-in code to the desk.",
                profile.name, event.name, event.donation_date, event.address
            ),
        };
        if let Err(error) = self.notifier.send(notification) {
            warn!(event = %event.id, profile = %profile.id, %error, "registration confirmation not delivered");
        }
    }
}
