use std::fmt;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a scheduled blood drive.
    EventId
);
numeric_id!(TimeSlotId);
numeric_id!(RegistrationId);
numeric_id!(
    /// Identifier of a donor profile (one account may own several).
    ProfileId
);
numeric_id!(AccountId);
numeric_id!(BloodUnitId);

/// Kind of collection performed at an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationType {
    WholeBlood,
    Platelets,
}

impl DonationType {
    /// Waiting period before the donor may give again.
    pub fn deferral(self) -> Duration {
        match self {
            DonationType::WholeBlood => Duration::weeks(12),
            DonationType::Platelets => Duration::weeks(3),
        }
    }

    pub const fn component(self) -> ComponentType {
        match self {
            DonationType::WholeBlood => ComponentType::WholeBlood,
            DonationType::Platelets => ComponentType::Platelets,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DonationType::WholeBlood => "whole_blood",
            DonationType::Platelets => "platelets",
        }
    }
}

/// Lifecycle of a donation event. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl EventStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered,
    CheckedIn,
    Completed,
    Cancelled,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::CheckedIn => "checked_in",
            RegistrationStatus::Completed => "completed",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled registrations never count towards an event's donor roster.
    pub const fn is_active(self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const fn label(self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    WholeBlood,
    Platelets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BloodUnitStatus {
    Stored,
    Used,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRole {
    Member,
    Staff,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub role: AccountRole,
}

/// Donor identity. Donation dates are only ever written by the recording workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub account_id: AccountId,
    pub name: String,
    pub personal_id: String,
    pub blood_type: Option<BloodType>,
    pub address: Option<String>,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub last_donation_date: Option<NaiveDate>,
    pub next_eligible_donation_date: Option<NaiveDate>,
    #[serde(default)]
    pub eligibility_notified_on: Option<NaiveDate>,
}

impl Profile {
    /// Stamp a donation taken on `donated_on` and derive the next eligibility date.
    pub fn record_donation(&mut self, donated_on: NaiveDate, donation_type: DonationType) {
        self.apply(&DonationDates::after(self.id, donated_on, donation_type));
    }

    pub fn apply(&mut self, dates: &DonationDates) {
        self.last_donation_date = Some(dates.last_donation_date);
        self.next_eligible_donation_date = Some(dates.next_eligible_donation_date);
    }
}

/// The only profile fields a recorded donation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationDates {
    pub profile_id: ProfileId,
    pub last_donation_date: NaiveDate,
    pub next_eligible_donation_date: NaiveDate,
}

impl DonationDates {
    pub fn after(profile_id: ProfileId, donated_on: NaiveDate, donation_type: DonationType) -> Self {
        Self {
            profile_id,
            last_donation_date: donated_on,
            next_eligible_donation_date: donated_on + donation_type.deferral(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationTimeSlot {
    pub id: TimeSlotId,
    pub event_id: EventId,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationEvent {
    pub id: EventId,
    pub name: String,
    pub address: String,
    pub donation_date: NaiveDate,
    pub donation_type: DonationType,
    pub status: EventStatus,
    pub created_by: AccountId,
    pub decided_by: Option<AccountId>,
    pub time_slots: Vec<DonationTimeSlot>,
}

impl DonationEvent {
    pub fn slot(&self, id: TimeSlotId) -> Option<&DonationTimeSlot> {
        self.time_slots.iter().find(|slot| slot.id == id)
    }
}

/// Requested time window when scheduling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotSpec {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: u32,
}

/// Staff-submitted description of a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    pub address: String,
    pub donation_date: NaiveDate,
    pub donation_type: DonationType,
    pub time_slots: Vec<TimeSlotSpec>,
}

/// Event row before the repository assigns identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonationEvent {
    pub name: String,
    pub address: String,
    pub donation_date: NaiveDate,
    pub donation_type: DonationType,
    pub created_by: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinToken {
    pub token: String,
    pub profile_id: ProfileId,
    pub created_on: NaiveDate,
    pub expires_on: NaiveDate,
}

impl CheckinToken {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.expires_on
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub time_slot_id: Option<TimeSlotId>,
    pub status: RegistrationStatus,
    /// Screening questionnaire as submitted by the donor, stored verbatim.
    pub form: String,
    pub checkin_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub event_id: EventId,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub time_slot_id: Option<TimeSlotId>,
    pub form: String,
    pub checkin_token: Option<String>,
}

/// Per-donor entry of a recording batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodUnitRecord {
    pub profile_id: ProfileId,
    pub volume_ml: f64,
    pub blood_type: BloodType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodUnit {
    pub id: BloodUnitId,
    pub event_id: EventId,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub volume_ml: f64,
    pub blood_type: BloodType,
    pub component_type: ComponentType,
    pub status: BloodUnitStatus,
    pub collected_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBloodUnit {
    pub event_id: EventId,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub volume_ml: f64,
    pub blood_type: BloodType,
    pub component_type: ComponentType,
    pub collected_on: NaiveDate,
}

/// Check-in view returned to the on-site operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinProfile {
    pub profile: Profile,
    pub form: String,
    pub status: RegistrationStatus,
}
