use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::domain::{CheckinProfile, CheckinToken, DonationEvent, EventId, Profile};
use super::error::{DonationError, Missing, StateViolation};
use super::repository::DonationRepository;
use super::validator::DonationValidator;
use crate::clock::Clock;

/// Issues and resolves the single-use tokens donors present at the check-in desk.
///
/// Tokens have no revocation path: they are VALID through `expires_on` and
/// EXPIRED afterwards, evaluated whenever a token is looked up.
pub struct CheckinTokenManager<R> {
    repository: Arc<R>,
    validator: DonationValidator<R>,
    clock: Arc<dyn Clock>,
}

impl<R> Clone for CheckinTokenManager<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            validator: self.validator.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: DonationRepository> CheckinTokenManager<R> {
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        let validator = DonationValidator::new(Arc::clone(&repository));
        Self {
            repository,
            validator,
            clock,
        }
    }

    /// Issue a token for `profile`, valid until the day after the event. It is
    /// stored together with the registration that carries it.
    pub fn issue(&self, profile: &Profile, event: &DonationEvent) -> CheckinToken {
        let token = CheckinToken {
            token: Uuid::new_v4().to_string(),
            profile_id: profile.id,
            created_on: self.clock.today(),
            expires_on: event.donation_date + Duration::days(1),
        };
        debug!(profile = %profile.id, event = %event.id, expires_on = %token.expires_on, "issued check-in token");
        token
    }

    /// Resolve a scanned token into the donor's check-in view.
    pub fn resolve(
        &self,
        token: &str,
        operator_email: &str,
        event_id: EventId,
    ) -> Result<CheckinProfile, DonationError> {
        let event = self.validator.event(event_id)?;
        let token = self
            .repository
            .token(token)?
            .ok_or(DonationError::NotFound(Missing::Token))?;
        self.ensure_valid(&token)?;

        let profile = self.validator.profile(token.profile_id)?;
        info!(operator = operator_email, profile = %profile.id, event = %event.id, "resolved check-in token");
        self.checkin_view(profile, &event)
    }

    /// Manual fallback when the donor cannot present a token.
    pub fn resolve_by_personal_id(
        &self,
        personal_id: &str,
        event_id: EventId,
    ) -> Result<CheckinProfile, DonationError> {
        let event = self.validator.event(event_id)?;
        let profile = self.validator.profile_by_personal_id(personal_id)?;
        self.checkin_view(profile, &event)
    }

    /// Token attached to the registration `email` holds for `event_id`.
    pub fn token_for_registration(
        &self,
        event_id: EventId,
        email: &str,
    ) -> Result<String, DonationError> {
        let event = self.validator.event(event_id)?;
        let account = self.validator.account_by_email(email)?;
        let registration = self
            .repository
            .registration_for_account(event.id, account.id)?
            .ok_or_else(|| Missing::AccountRegistration {
                event: event.id,
                email: email.to_string(),
            })?;

        let value = registration
            .checkin_token
            .ok_or(Missing::RegistrationToken(event.id))?;
        let token = self
            .repository
            .token(&value)?
            .ok_or(Missing::RegistrationToken(event.id))?;
        self.ensure_valid(&token)?;
        Ok(token.token)
    }

    fn ensure_valid(&self, token: &CheckinToken) -> Result<(), DonationError> {
        if token.is_expired(self.clock.today()) {
            return Err(StateViolation::TokenExpired {
                expired_on: token.expires_on,
            }
            .into());
        }
        Ok(())
    }

    fn checkin_view(
        &self,
        profile: Profile,
        event: &DonationEvent,
    ) -> Result<CheckinProfile, DonationError> {
        let registration = self.validator.registration(&profile, event)?;
        Ok(CheckinProfile {
            profile,
            form: registration.form,
            status: registration.status,
        })
    }
}
