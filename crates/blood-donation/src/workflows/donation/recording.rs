//! Batch recording of collected blood units at the close of a donation event.
//!
//! A batch must account for every donor still registered for the event. All
//! records are validated before anything is written, and the writes are handed
//! to the repository as one [`RecordingCommit`], so a batch either lands in full
//! or leaves no trace. Batches for the same event are serialized in-process;
//! the lock for an event is only held while a batch for it is in flight.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::domain::{
    BloodUnit, BloodUnitRecord, DonationDates, DonationEvent, EventId, EventStatus, NewBloodUnit,
    RegistrationStatus,
};
use super::error::{ArgumentError, DonationError, Missing, StateViolation};
use super::repository::{DonationRepository, RecordingCommit};
use super::roster::DonorRoster;
use super::validator::DonationValidator;

/// Per-event mutexes handed out on demand and dropped once no batch holds them.
#[derive(Debug, Default)]
struct EventLocks {
    locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
}

impl EventLocks {
    fn for_event(&self, event: EventId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("event lock table poisoned");
        Arc::clone(locks.entry(event).or_default())
    }

    fn release(&self, event: EventId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().expect("event lock table poisoned");
        // The table's copy plus ours: nobody else is waiting on this event.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&event);
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().expect("event lock table poisoned").len()
    }
}

/// Result of a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingReceipt {
    pub event_id: EventId,
    pub units: Vec<BloodUnit>,
}

impl RecordingReceipt {
    pub fn message(&self) -> String {
        format!(
            "Successfully recorded {} blood donation(s)",
            self.units.len()
        )
    }
}

pub struct BloodDonationRecorder<R> {
    repository: Arc<R>,
    validator: DonationValidator<R>,
    roster: DonorRoster<R>,
    locks: EventLocks,
}

impl<R: DonationRepository> BloodDonationRecorder<R> {
    pub fn new(repository: Arc<R>) -> Self {
        let validator = DonationValidator::new(Arc::clone(&repository));
        let roster = DonorRoster::new(Arc::clone(&repository));
        Self {
            repository,
            validator,
            roster,
            locks: EventLocks::default(),
        }
    }

    /// Record one blood unit per checked-in donor and complete the event.
    pub fn record_batch(
        &self,
        event_id: EventId,
        records: &[BloodUnitRecord],
        operator_email: &str,
    ) -> Result<RecordingReceipt, DonationError> {
        let event_id = self.validator.event(event_id)?.id;

        let lock = self.locks.for_event(event_id);
        let outcome = {
            let _serialized = lock.lock().expect("event recording lock poisoned");
            self.record_serialized(event_id, records, operator_email)
        };
        self.locks.release(event_id, lock);
        outcome
    }

    /// Events with a batch currently in flight.
    pub fn events_in_flight(&self) -> usize {
        self.locks.len()
    }

    fn record_serialized(
        &self,
        event_id: EventId,
        records: &[BloodUnitRecord],
        operator_email: &str,
    ) -> Result<RecordingReceipt, DonationError> {
        // Re-read under the lock: an earlier batch may have completed the event.
        let event = self.validator.event(event_id)?;
        self.validator.validate_batch(records)?;
        if event.status != EventStatus::Approved {
            return Err(StateViolation::EventStatus {
                event: event.id,
                status: event.status,
                expected: EventStatus::Approved,
            }
            .into());
        }
        let operator = self.validator.account_by_email(operator_email)?;

        let registered = self.roster.registered_profile_ids(event.id)?;
        let submitted: BTreeSet<_> = records.iter().map(|record| record.profile_id).collect();
        let missing: Vec<_> = registered.difference(&submitted).copied().collect();
        if !missing.is_empty() {
            warn!(event = %event.id, missing = ?missing, "recording batch does not cover the roster");
            return Err(ArgumentError::MissingRecords(missing).into());
        }

        let commit = self.plan(&event, records)?;
        let units = self.repository.commit_recording(commit)?;

        info!(
            event = %event.id,
            operator = %operator.email,
            units = units.len(),
            "blood donations recorded, event completed"
        );
        Ok(RecordingReceipt {
            event_id: event.id,
            units,
        })
    }

    /// Validate every record and collect the writes; nothing is persisted here.
    fn plan(
        &self,
        event: &DonationEvent,
        records: &[BloodUnitRecord],
    ) -> Result<RecordingCommit, DonationError> {
        let mut commit = RecordingCommit {
            event_id: event.id,
            donations: Vec::with_capacity(records.len()),
            units: Vec::with_capacity(records.len()),
            registrations: Vec::with_capacity(records.len()),
        };

        for record in records {
            let profile = self.validator.profile(record.profile_id)?;
            let registration = self
                .repository
                .registration_for_profile(event.id, profile.id)?
                .ok_or(StateViolation::NotRegistered(profile.id))?;
            if registration.status != RegistrationStatus::CheckedIn {
                return Err(StateViolation::NotCheckedIn {
                    profile: profile.id,
                    status: registration.status,
                }
                .into());
            }

            let donor = self
                .repository
                .account(registration.account_id)?
                .ok_or(Missing::Donor(registration.account_id))?;

            commit.units.push(NewBloodUnit {
                event_id: event.id,
                account_id: donor.id,
                profile_id: profile.id,
                volume_ml: record.volume_ml,
                blood_type: record.blood_type,
                component_type: event.donation_type.component(),
                collected_on: event.donation_date,
            });
            commit.donations.push(DonationDates::after(
                profile.id,
                event.donation_date,
                event.donation_type,
            ));
            commit.registrations.push(registration.id);
        }

        Ok(commit)
    }
}
