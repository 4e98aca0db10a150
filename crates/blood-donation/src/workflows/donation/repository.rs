use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Account, AccountId, AccountRole, BloodType, BloodUnit, CheckinToken, DonationDates,
    DonationEvent, DonationTimeSlot, EventId, EventRegistration, NewBloodUnit, NewDonationEvent,
    NewRegistration, Profile, ProfileId, RegistrationId, TimeSlotId, TimeSlotSpec,
};

/// Account row before the repository assigns an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub role: AccountRole,
}

/// Profile row before the repository assigns an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub account_id: AccountId,
    pub name: String,
    pub personal_id: String,
    pub blood_type: Option<BloodType>,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
}

/// Every write produced by one recording batch. Applied all at once or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingCommit {
    pub event_id: EventId,
    pub donations: Vec<DonationDates>,
    pub units: Vec<NewBloodUnit>,
    /// Registrations that must still be CHECKED_IN and move to COMPLETED.
    pub registrations: Vec<RegistrationId>,
}

/// A sign-up written together with its check-in token.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationCommit {
    pub registration: NewRegistration,
    /// Cancelled registration reused instead of inserting a new row.
    pub reactivates: Option<RegistrationId>,
    /// Capacity of the requested slot, checked against its active registrations.
    pub slot_capacity: Option<u32>,
    pub token: CheckinToken,
}

/// Storage abstraction so the donation services can be exercised in isolation.
///
/// Each method is atomic on its own; multi-row writes that must stay consistent
/// (`create_event`, `commit_recording`) are single calls.
pub trait DonationRepository: Send + Sync {
    fn insert_account(&self, account: NewAccount) -> Result<Account, RepositoryError>;
    fn account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;
    fn account_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    fn insert_profile(&self, profile: NewProfile) -> Result<Profile, RepositoryError>;
    fn profile(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError>;
    fn profile_by_personal_id(&self, personal_id: &str)
        -> Result<Option<Profile>, RepositoryError>;
    fn update_profile(&self, profile: &Profile) -> Result<(), RepositoryError>;
    /// Profiles whose next eligible donation date is on or before `day`.
    fn profiles_eligible_by(&self, day: NaiveDate) -> Result<Vec<Profile>, RepositoryError>;
    /// Set `eligibility_notified_on` while the profile is still eligible from
    /// `eligible_on`. Returns `false` when a newer donation moved that date.
    fn mark_eligibility_notified(
        &self,
        profile: ProfileId,
        eligible_on: NaiveDate,
        notified_on: NaiveDate,
    ) -> Result<bool, RepositoryError>;

    /// Persist an event together with its slots.
    fn create_event(
        &self,
        event: NewDonationEvent,
        slots: Vec<TimeSlotSpec>,
    ) -> Result<DonationEvent, RepositoryError>;
    fn event(&self, id: EventId) -> Result<Option<DonationEvent>, RepositoryError>;
    fn events(&self) -> Result<Vec<DonationEvent>, RepositoryError>;
    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DonationEvent>, RepositoryError>;
    fn time_slot(&self, id: TimeSlotId) -> Result<Option<DonationTimeSlot>, RepositoryError>;
    /// Save status and decision fields; slots are immutable once created.
    fn update_event(&self, event: &DonationEvent) -> Result<(), RepositoryError>;

    /// Insert or reactivate a registration and store its token, failing with
    /// `SlotFull` once the slot holds `slot_capacity` active registrations.
    fn commit_registration(
        &self,
        commit: RegistrationCommit,
    ) -> Result<EventRegistration, RepositoryError>;
    fn update_registration(&self, registration: &EventRegistration)
        -> Result<(), RepositoryError>;
    fn registration_for_profile(
        &self,
        event: EventId,
        profile: ProfileId,
    ) -> Result<Option<EventRegistration>, RepositoryError>;
    fn registration_for_account(
        &self,
        event: EventId,
        account: AccountId,
    ) -> Result<Option<EventRegistration>, RepositoryError>;
    fn registrations_for_event(
        &self,
        event: EventId,
    ) -> Result<Vec<EventRegistration>, RepositoryError>;

    fn token(&self, token: &str) -> Result<Option<CheckinToken>, RepositoryError>;

    /// Apply a recording batch and complete the event. Only the donation dates
    /// of each profile are written.
    fn commit_recording(&self, commit: RecordingCommit) -> Result<Vec<BloodUnit>, RepositoryError>;
    fn blood_units_for_event(&self, event: EventId) -> Result<Vec<BloodUnit>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("time slot is full")]
    SlotFull,
    #[error("concurrent modification: {0}")]
    Stale(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound donor messaging (e-mail in production).
pub trait NotificationSender: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}
