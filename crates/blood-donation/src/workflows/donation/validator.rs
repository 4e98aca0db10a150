use std::collections::BTreeSet;
use std::sync::Arc;

use super::domain::{
    Account, BloodUnitRecord, DonationEvent, DonationTimeSlot, EventId, EventRegistration,
    EventSpec, EventStatus, Profile, ProfileId, TimeSlotId,
};
use super::error::{ArgumentError, DonationError, Missing, StateViolation};
use super::repository::DonationRepository;

/// Outcome requested by an administrator reviewing a pending event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDecision {
    Approve,
    Reject,
}

impl EventDecision {
    pub fn parse(action: &str) -> Result<Self, ArgumentError> {
        match action {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(ArgumentError::UnknownAction(other.to_string())),
        }
    }

    pub const fn status(self) -> EventStatus {
        match self {
            Self::Approve => EventStatus::Approved,
            Self::Reject => EventStatus::Rejected,
        }
    }

    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Reject => "rejected",
        }
    }
}

/// Existence and state preconditions shared by the donation services.
pub struct DonationValidator<R> {
    repository: Arc<R>,
}

impl<R> Clone for DonationValidator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: DonationRepository> DonationValidator<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn event(&self, id: EventId) -> Result<DonationEvent, DonationError> {
        self.repository
            .event(id)?
            .ok_or_else(|| Missing::Event(id).into())
    }

    pub fn event_in_status(
        &self,
        id: EventId,
        expected: EventStatus,
    ) -> Result<DonationEvent, DonationError> {
        let event = self.event(id)?;
        if event.status != expected {
            return Err(StateViolation::EventStatus {
                event: id,
                status: event.status,
                expected,
            }
            .into());
        }
        Ok(event)
    }

    pub fn profile(&self, id: ProfileId) -> Result<Profile, DonationError> {
        self.repository
            .profile(id)?
            .ok_or_else(|| Missing::Profile(id).into())
    }

    pub fn profile_by_personal_id(&self, personal_id: &str) -> Result<Profile, DonationError> {
        self.repository
            .profile_by_personal_id(personal_id)?
            .ok_or_else(|| Missing::PersonalId(personal_id.to_string()).into())
    }

    pub fn account_by_email(&self, email: &str) -> Result<Account, DonationError> {
        self.repository
            .account_by_email(email)?
            .ok_or_else(|| Missing::Account(email.to_string()).into())
    }

    /// Registration of `profile` at `event`, looked up the way the check-in desk does.
    pub fn registration(
        &self,
        profile: &Profile,
        event: &DonationEvent,
    ) -> Result<EventRegistration, DonationError> {
        self.repository
            .registration_for_profile(event.id, profile.id)?
            .ok_or_else(|| {
                Missing::ProfileRegistration {
                    event: event.id,
                    profile: profile.id,
                }
                .into()
            })
    }

    /// Slot lookup distinguishing unknown slots from slots of another event.
    pub fn slot_of(
        &self,
        event: &DonationEvent,
        slot: TimeSlotId,
    ) -> Result<DonationTimeSlot, DonationError> {
        if let Some(found) = event.slot(slot) {
            return Ok(found.clone());
        }
        match self.repository.time_slot(slot)? {
            Some(_) => Err(ArgumentError::ForeignTimeSlot {
                event: event.id,
                slot,
            }
            .into()),
            None => Err(Missing::TimeSlot(slot).into()),
        }
    }

    pub fn validate_event_spec(&self, spec: &EventSpec) -> Result<(), ArgumentError> {
        if spec.name.trim().is_empty() {
            return Err(ArgumentError::BlankEventName);
        }
        if spec.time_slots.is_empty() {
            return Err(ArgumentError::NoTimeSlots);
        }
        for slot in &spec.time_slots {
            let reason = if slot.start_time >= slot.end_time {
                Some("start must be before end")
            } else if slot.max_capacity == 0 {
                Some("capacity must be positive")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ArgumentError::InvalidTimeSlot {
                    start: slot.start_time.format("%H:%M").to_string(),
                    end: slot.end_time.format("%H:%M").to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Structural checks on a recording batch: non-empty, one record per profile, sane volumes.
    pub fn validate_batch(&self, records: &[BloodUnitRecord]) -> Result<(), ArgumentError> {
        if records.is_empty() {
            return Err(ArgumentError::EmptyBatch);
        }

        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for record in records {
            if !seen.insert(record.profile_id) {
                duplicates.insert(record.profile_id);
            }
        }
        if !duplicates.is_empty() {
            return Err(ArgumentError::DuplicateRecords(
                duplicates.into_iter().collect(),
            ));
        }

        if let Some(record) = records
            .iter()
            .find(|record| !(record.volume_ml.is_finite() && record.volume_ml > 0.0))
        {
            return Err(ArgumentError::InvalidVolume {
                profile: record.profile_id,
            });
        }
        Ok(())
    }
}
