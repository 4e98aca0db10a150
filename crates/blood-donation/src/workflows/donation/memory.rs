use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::domain::{
    Account, AccountId, BloodUnit, BloodUnitId, BloodUnitStatus, CheckinToken, DonationEvent,
    DonationTimeSlot, EventId, EventRegistration, EventStatus, NewDonationEvent, Profile, ProfileId, RegistrationId, RegistrationStatus, TimeSlotId,
    TimeSlotSpec,
};
use super::repository::{
    DonationRepository, NewAccount, NewProfile, RecordingCommit, RegistrationCommit,
    RepositoryError,
};
use crate::workflows::distance::{DistanceRepository, ProfileDistance};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    profiles: BTreeMap<ProfileId, Profile>,
    events: BTreeMap<EventId, DonationEvent>,
    registrations: BTreeMap<RegistrationId, EventRegistration>,
    tokens: HashMap<String, CheckinToken>,
    blood_units: BTreeMap<BloodUnitId, BloodUnit>,
    distances: HashMap<ProfileId, ProfileDistance>,
    sequence: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Mutex-guarded tables backing the demo service and the test suites.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDonationStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDonationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("donation store mutex poisoned")
    }

    pub fn registration(&self, id: RegistrationId) -> Option<EventRegistration> {
        self.lock().registrations.get(&id).cloned()
    }

    pub fn blood_unit_count(&self) -> usize {
        self.lock().blood_units.len()
    }
}

impl DonationRepository for InMemoryDonationStore {
    fn insert_account(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut tables = self.lock();
        let taken = tables
            .accounts
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&account.email));
        if taken {
            return Err(RepositoryError::Conflict);
        }
        let account = Account {
            id: AccountId(tables.next_id()),
            email: account.email,
            role: account.role,
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    fn insert_profile(&self, profile: NewProfile) -> Result<Profile, RepositoryError> {
        let mut tables = self.lock();
        if !tables.accounts.contains_key(&profile.account_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables
            .profiles
            .values()
            .any(|existing| existing.personal_id == profile.personal_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let profile = Profile {
            id: ProfileId(tables.next_id()),
            account_id: profile.account_id,
            name: profile.name,
            personal_id: profile.personal_id,
            blood_type: profile.blood_type,
            address: profile.address,
            ward: profile.ward,
            district: profile.district,
            city: profile.city,
            last_donation_date: None,
            next_eligible_donation_date: None,
            eligibility_notified_on: None,
        };
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn profile(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.lock().profiles.get(&id).cloned())
    }

    fn profile_by_personal_id(
        &self,
        personal_id: &str,
    ) -> Result<Option<Profile>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .profiles
            .values()
            .find(|profile| profile.personal_id == personal_id.trim())
            .cloned())
    }

    fn update_profile(&self, profile: &Profile) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        match tables.profiles.get_mut(&profile.id) {
            Some(stored) => {
                *stored = profile.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn profiles_eligible_by(&self, day: NaiveDate) -> Result<Vec<Profile>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .profiles
            .values()
            .filter(|profile| {
                profile
                    .next_eligible_donation_date
                    .is_some_and(|eligible| eligible <= day)
            })
            .cloned()
            .collect())
    }

    fn mark_eligibility_notified(
        &self,
        profile: ProfileId,
        eligible_on: NaiveDate,
        notified_on: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let stored = tables
            .profiles
            .get_mut(&profile)
            .ok_or(RepositoryError::NotFound)?;
        if stored.next_eligible_donation_date != Some(eligible_on) {
            return Ok(false);
        }
        stored.eligibility_notified_on = Some(notified_on);
        Ok(true)
    }

    fn create_event(
        &self,
        event: NewDonationEvent,
        slots: Vec<TimeSlotSpec>,
    ) -> Result<DonationEvent, RepositoryError> {
        let mut tables = self.lock();
        let event_id = EventId(tables.next_id());
        let time_slots = slots
            .into_iter()
            .map(|spec| DonationTimeSlot {
                id: TimeSlotId(tables.next_id()),
                event_id,
                start_time: spec.start_time,
                end_time: spec.end_time,
                max_capacity: spec.max_capacity,
            })
            .collect();

        let event = DonationEvent {
            id: event_id,
            name: event.name,
            address: event.address,
            donation_date: event.donation_date,
            donation_type: event.donation_type,
            status: EventStatus::Pending,
            created_by: event.created_by,
            decided_by: None,
            time_slots,
        };
        tables.events.insert(event_id, event.clone());
        Ok(event)
    }

    fn event(&self, id: EventId) -> Result<Option<DonationEvent>, RepositoryError> {
        Ok(self.lock().events.get(&id).cloned())
    }

    fn events(&self) -> Result<Vec<DonationEvent>, RepositoryError> {
        Ok(self.lock().events.values().cloned().collect())
    }

    fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DonationEvent>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .events
            .values()
            .filter(|event| event.donation_date >= start && event.donation_date <= end)
            .cloned()
            .collect())
    }

    fn time_slot(&self, id: TimeSlotId) -> Result<Option<DonationTimeSlot>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .events
            .values()
            .flat_map(|event| event.time_slots.iter())
            .find(|slot| slot.id == id)
            .cloned())
    }

    fn update_event(&self, event: &DonationEvent) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        match tables.events.get_mut(&event.id) {
            Some(stored) => {
                stored.status = event.status;
                stored.decided_by = event.decided_by;
                stored.name = event.name.clone();
                stored.address = event.address.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn commit_registration(
        &self,
        commit: RegistrationCommit,
    ) -> Result<EventRegistration, RepositoryError> {
        let mut tables = self.lock();
        let RegistrationCommit {
            registration,
            reactivates,
            slot_capacity,
            token,
        } = commit;

        if tables.tokens.contains_key(&token.token) {
            return Err(RepositoryError::Conflict);
        }
        let current = tables
            .registrations
            .values()
            .find(|existing| {
                existing.event_id == registration.event_id
                    && existing.profile_id == registration.profile_id
            })
            .map(|existing| (existing.id, existing.status));
        let id = match (current, reactivates) {
            (None, None) => None,
            (Some((id, RegistrationStatus::Cancelled)), Some(expected)) if id == expected => Some(id),
            (Some((id, status)), Some(_)) => {
                return Err(RepositoryError::Stale(format!(
                    "registration {id} is {}",
                    status.label()
                )))
            }
            (Some(_), None) => return Err(RepositoryError::Conflict),
            (None, Some(_)) => return Err(RepositoryError::NotFound),
        };

        if let (Some(slot), Some(capacity)) = (registration.time_slot_id, slot_capacity) {
            let taken = tables
                .registrations
                .values()
                .filter(|existing| {
                    existing.event_id == registration.event_id
                        && existing.time_slot_id == Some(slot)
                        && existing.status.is_active()
                })
                .count();
            if taken >= capacity as usize {
                return Err(RepositoryError::SlotFull);
            }
        }

        let id = match id {
            Some(id) => id,
            None => RegistrationId(tables.next_id()),
        };
        let registration = EventRegistration {
            id,
            event_id: registration.event_id,
            account_id: registration.account_id,
            profile_id: registration.profile_id,
            time_slot_id: registration.time_slot_id,
            status: RegistrationStatus::Registered,
            form: registration.form,
            checkin_token: registration.checkin_token,
        };
        tables.tokens.insert(token.token.clone(), token);
        tables
            .registrations
            .insert(registration.id, registration.clone());
        Ok(registration)
    }

    fn update_registration(&self, registration: &EventRegistration) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        match tables.registrations.get_mut(&registration.id) {
            Some(stored) => {
                *stored = registration.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn registration_for_profile(
        &self,
        event: EventId,
        profile: ProfileId,
    ) -> Result<Option<EventRegistration>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .registrations
            .values()
            .find(|registration| registration.event_id == event && registration.profile_id == profile)
            .cloned())
    }

    /// An account may register several of its profiles; active registrations win.
    fn registration_for_account(
        &self,
        event: EventId,
        account: AccountId,
    ) -> Result<Option<EventRegistration>, RepositoryError> {
        let tables = self.lock();
        let matching: Vec<&EventRegistration> = tables
            .registrations
            .values()
            .filter(|registration| {
                registration.event_id == event && registration.account_id == account
            })
            .collect();
        Ok(matching
            .iter()
            .find(|registration| registration.status.is_active())
            .or(matching.first())
            .map(|registration| (*registration).clone()))
    }

    fn registrations_for_event(
        &self,
        event: EventId,
    ) -> Result<Vec<EventRegistration>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .registrations
            .values()
            .filter(|registration| registration.event_id == event)
            .cloned()
            .collect())
    }

    fn token(&self, token: &str) -> Result<Option<CheckinToken>, RepositoryError> {
        Ok(self.lock().tokens.get(token).cloned())
    }

    fn commit_recording(&self, commit: RecordingCommit) -> Result<Vec<BloodUnit>, RepositoryError> {
        let mut tables = self.lock();

        // Verify everything before the first write so a rejected commit leaves no trace.
        match tables.events.get(&commit.event_id) {
            Some(event) if event.status == EventStatus::Approved => {}
            Some(event) => {
                return Err(RepositoryError::Stale(format!(
                    "event {} is {}",
                    event.id,
                    event.status.label()
                )))
            }
            None => return Err(RepositoryError::NotFound),
        }
        for id in &commit.registrations {
            match tables.registrations.get(id) {
                Some(registration) if registration.status == RegistrationStatus::CheckedIn => {}
                Some(registration) => {
                    return Err(RepositoryError::Stale(format!(
                        "registration {} is {}",
                        id,
                        registration.status.label()
                    )))
                }
                None => return Err(RepositoryError::NotFound),
            }
        }
        if let Some(missing) = commit
            .donations
            .iter()
            .find(|dates| !tables.profiles.contains_key(&dates.profile_id))
        {
            return Err(RepositoryError::Stale(format!(
                "profile {} disappeared",
                missing.profile_id
            )));
        }

        for dates in &commit.donations {
            if let Some(profile) = tables.profiles.get_mut(&dates.profile_id) {
                profile.apply(dates);
            }
        }
        for id in &commit.registrations {
            if let Some(registration) = tables.registrations.get_mut(id) {
                registration.status = RegistrationStatus::Completed;
            }
        }
        let mut stored = Vec::with_capacity(commit.units.len());
        for unit in commit.units {
            let unit = BloodUnit {
                id: BloodUnitId(tables.next_id()),
                event_id: unit.event_id,
                account_id: unit.account_id,
                profile_id: unit.profile_id,
                volume_ml: unit.volume_ml,
                blood_type: unit.blood_type,
                component_type: unit.component_type,
                status: BloodUnitStatus::Stored,
                collected_on: unit.collected_on,
            };
            tables.blood_units.insert(unit.id, unit.clone());
            stored.push(unit);
        }
        if let Some(event) = tables.events.get_mut(&commit.event_id) {
            event.status = EventStatus::Completed;
        }

        Ok(stored)
    }

    fn blood_units_for_event(&self, event: EventId) -> Result<Vec<BloodUnit>, RepositoryError> {
        let tables = self.lock();
        Ok(tables
            .blood_units
            .values()
            .filter(|unit| unit.event_id == event)
            .cloned()
            .collect())
    }
}

impl DistanceRepository for InMemoryDonationStore {
    fn save_distance(&self, distance: &ProfileDistance) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        if !tables.profiles.contains_key(&distance.profile_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.distances.insert(distance.profile_id, distance.clone());
        Ok(())
    }

    fn distance(&self, profile: ProfileId) -> Result<Option<ProfileDistance>, RepositoryError> {
        Ok(self.lock().distances.get(&profile).cloned())
    }

    fn distances_within(&self, max_meters: u64) -> Result<Vec<ProfileDistance>, RepositoryError> {
        let tables = self.lock();
        let mut within: Vec<ProfileDistance> = tables
            .distances
            .values()
            .filter(|distance| distance.distance_meters <= max_meters)
            .cloned()
            .collect();
        within.sort_by_key(|distance| (distance.distance_meters, distance.profile_id));
        Ok(within)
    }
}
