//! Blood donation workflows: event scheduling and review, donor registration
//! and check-in, batch recording of collected units, and eligibility reminders.

pub mod checkin;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod paging;
pub mod recording;
pub mod registration;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod validator;

#[cfg(test)]
mod tests;

pub use checkin::CheckinTokenManager;
pub use domain::{
    Account, AccountId, AccountRole, BloodType, BloodUnit, BloodUnitId, BloodUnitRecord,
    BloodUnitStatus, CheckinProfile, CheckinToken, ComponentType, DonationDates, DonationEvent,
    DonationTimeSlot, DonationType, EventId, EventRegistration, EventSpec, EventStatus, Profile,
    ProfileId, RegistrationId, RegistrationStatus, TimeSlotId, TimeSlotSpec,
};
pub use eligibility::{EligibilityNotifier, EligibilityScan};
pub use error::{ArgumentError, DonationError, Missing, StateViolation};
pub use lifecycle::DonationEventLifecycle;
pub use memory::InMemoryDonationStore;
pub use paging::{AccountSortKey, EventSortKey, Page, PageRequest, ProfileSortKey, MAX_PAGE_SIZE};
pub use recording::{BloodDonationRecorder, RecordingReceipt};
pub use registration::RegistrationDesk;
pub use repository::{
    DonationRepository, NewAccount, NewProfile, Notification, NotificationError,
    NotificationSender, RecordingCommit, RegistrationCommit, RepositoryError,
};
pub use roster::DonorRoster;
pub use router::donation_router;
pub use service::DonationService;
pub use validator::{DonationValidator, EventDecision};
