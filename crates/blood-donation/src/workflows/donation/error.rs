use chrono::NaiveDate;

use super::domain::{AccountId, EventId, EventStatus, ProfileId, RegistrationStatus, TimeSlotId};
use super::repository::RepositoryError;
use crate::workflows::distance::DistanceError;

/// Error raised by the donation services.
#[derive(Debug, thiserror::Error)]
pub enum DonationError {
    #[error("not found: {0}")]
    NotFound(Missing),
    #[error("invalid argument: {0}")]
    InvalidArgument(ArgumentError),
    #[error("invalid state: {0}")]
    InvalidState(StateViolation),
    #[error("external service failure: {0}")]
    ExternalService(#[from] DistanceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<Missing> for DonationError {
    fn from(value: Missing) -> Self {
        Self::NotFound(value)
    }
}

impl From<ArgumentError> for DonationError {
    fn from(value: ArgumentError) -> Self {
        Self::InvalidArgument(value)
    }
}

impl From<StateViolation> for DonationError {
    fn from(value: StateViolation) -> Self {
        Self::InvalidState(value)
    }
}

/// Entity lookup that came back empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Missing {
    #[error("donation event {0}")]
    Event(EventId),
    #[error("profile {0}")]
    Profile(ProfileId),
    #[error("profile with personal id {0}")]
    PersonalId(String),
    #[error("account with email {0}")]
    Account(String),
    #[error("donor account {0}")]
    Donor(AccountId),
    #[error("time slot {0}")]
    TimeSlot(TimeSlotId),
    #[error("check-in token")]
    Token,
    #[error("registration for profile {profile} at event {event}")]
    ProfileRegistration { event: EventId, profile: ProfileId },
    #[error("registration for {email} at event {event}")]
    AccountRegistration { event: EventId, email: String },
    #[error("check-in token for registration at event {0}")]
    RegistrationToken(EventId),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("unsupported verification action '{0}', expected 'approve' or 'reject'")]
    UnknownAction(String),
    #[error("recording batch is empty")]
    EmptyBatch,
    #[error("profiles appear more than once in the batch: {0:?}")]
    DuplicateRecords(Vec<ProfileId>),
    #[error("the following registered profiles are missing in the records: {0:?}")]
    MissingRecords(Vec<ProfileId>),
    #[error("record for profile {profile} has a non-positive volume")]
    InvalidVolume { profile: ProfileId },
    #[error("unknown sort key '{0}'")]
    UnknownSortKey(String),
    #[error("page size {size} must be between 1 and {max}")]
    PageSize { size: usize, max: usize },
    #[error("date range start {start} is after end {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("date range needs both start and end")]
    IncompleteDateRange,
    #[error("event name must not be blank")]
    BlankEventName,
    #[error("an event needs at least one time slot")]
    NoTimeSlots,
    #[error("time slot {start}-{end} is invalid: {reason}")]
    InvalidTimeSlot {
        start: String,
        end: String,
        reason: &'static str,
    },
    #[error("time slot {slot} does not belong to event {event}")]
    ForeignTimeSlot { event: EventId, slot: TimeSlotId },
    #[error("profile {0} does not belong to the requesting account")]
    ForeignProfile(ProfileId),
    #[error("profile {0} has no address to measure from")]
    MissingAddress(ProfileId),
    #[error("distance '{0}' must be a non-negative number of kilometers")]
    InvalidDistance(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    #[error("check-in token expired on {expired_on}")]
    TokenExpired { expired_on: NaiveDate },
    #[error("profile {0} is not registered for this event")]
    NotRegistered(ProfileId),
    #[error("profile {profile} is not checked in for this event (status {status:?})")]
    NotCheckedIn {
        profile: ProfileId,
        status: RegistrationStatus,
    },
    #[error("event {event} is {status:?}, expected {expected:?}")]
    EventStatus {
        event: EventId,
        status: EventStatus,
        expected: EventStatus,
    },
    #[error("event {0} is completed and can no longer be decided")]
    EventClosed(EventId),
    #[error("profile {0} already holds an active registration for this event")]
    AlreadyRegistered(ProfileId),
    #[error("registration for profile {profile} cannot move from {from:?} to {to:?}")]
    RegistrationTransition {
        profile: ProfileId,
        from: RegistrationStatus,
        to: RegistrationStatus,
    },
    #[error("time slot {0} is full")]
    SlotFull(TimeSlotId),
}

impl DonationError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DonationError::NotFound(_) | DonationError::Repository(RepositoryError::NotFound)
        )
    }
}
