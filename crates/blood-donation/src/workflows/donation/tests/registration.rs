use std::sync::Arc;
use std::thread;

use super::common::*;
use crate::clock::FixedClock;
use crate::workflows::donation::domain::NewRegistration;
use crate::workflows::donation::{
    ArgumentError, CheckinToken, DonationError, DonationRepository, DonationService,
    DonationType, Missing, RegistrationCommit, RegistrationStatus, RepositoryError,
    StateViolation, TimeSlotId,
};

#[test]
fn register_issues_token_and_confirms_by_mail() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let donor = &fixture.donors[0];

    let registration = fixture
        .store
        .registration_for_profile(fixture.event.id, donor.id)
        .unwrap()
        .expect("registration");
    assert_eq!(registration.status, RegistrationStatus::Registered);
    assert_eq!(registration.time_slot_id, Some(fixture.event.time_slots[0].id));
    assert!(registration.checkin_token.is_some());

    let sent = fixture.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, donor_email(1));
    assert!(sent[0].subject.contains("Community Hall Blood Drive"));
}

#[test]
fn register_requires_approved_event() {
    let (store, service, event) = pending_event(DonationType::WholeBlood);
    let (account, profile) = donor(&store, 1);

    assert!(matches!(
        service
            .registrations()
            .register(event.id, &account.email, profile.id, None, String::new()),
        Err(DonationError::InvalidState(StateViolation::EventStatus { .. }))
    ));
}

#[test]
fn register_rejects_duplicate_active_registration() {
    let fixture = registered(DonationType::WholeBlood, 1);

    assert!(matches!(
        fixture.service.registrations().register(
            fixture.event.id,
            &donor_email(1),
            fixture.donors[0].id,
            None,
            String::new(),
        ),
        Err(DonationError::InvalidState(StateViolation::AlreadyRegistered(_)))
    ));
}

#[test]
fn cancelled_registration_can_be_reactivated() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let donor = &fixture.donors[0];
    let desk = fixture.service.registrations();
    let original = fixture
        .store
        .registration_for_profile(fixture.event.id, donor.id)
        .unwrap()
        .expect("registration");

    desk.cancel(fixture.event.id, donor.id).expect("cancelled");
    let renewed = desk
        .register(fixture.event.id, &donor_email(1), donor.id, None, "{\"q1\":true}".to_string())
        .expect("re-registered");

    assert_eq!(renewed.id, original.id);
    assert_eq!(renewed.status, RegistrationStatus::Registered);
    assert_eq!(renewed.time_slot_id, None);
    assert_ne!(renewed.checkin_token, original.checkin_token);
}

#[test]
fn register_rejects_profile_of_another_account() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let (_, other) = donor(&fixture.store, 2);

    assert!(matches!(
        fixture.service.registrations().register(
            fixture.event.id,
            &donor_email(1),
            other.id,
            None,
            String::new(),
        ),
        Err(DonationError::InvalidArgument(ArgumentError::ForeignProfile(id))) if id == other.id
    ));
}

#[test]
fn register_enforces_slot_ownership_and_capacity() {
    let fixture = registered(DonationType::WholeBlood, 0);
    let small_slot = fixture.event.time_slots[1].id;
    let (first, first_profile) = donor(&fixture.store, 1);
    let (second, second_profile) = donor(&fixture.store, 2);
    let desk = fixture.service.registrations();

    desk.register(fixture.event.id, &first.email, first_profile.id, Some(small_slot), String::new())
        .expect("first seat");
    assert!(matches!(
        desk.register(fixture.event.id, &second.email, second_profile.id, Some(small_slot), String::new()),
        Err(DonationError::InvalidState(StateViolation::SlotFull(slot))) if slot == small_slot
    ));
    assert!(matches!(
        desk.register(fixture.event.id, &second.email, second_profile.id, Some(TimeSlotId(9_999)), String::new()),
        Err(DonationError::NotFound(Missing::TimeSlot(_)))
    ));
}

#[test]
fn register_rejects_slot_of_another_event() {
    let fixture = registered(DonationType::WholeBlood, 0);
    let (account, profile) = donor(&fixture.store, 1);
    let other = fixture
        .service
        .events()
        .create(event_spec(DonationType::Platelets), STAFF)
        .expect("second event");

    assert!(matches!(
        fixture.service.registrations().register(
            fixture.event.id,
            &account.email,
            profile.id,
            Some(other.time_slots[0].id),
            String::new(),
        ),
        Err(DonationError::InvalidArgument(ArgumentError::ForeignTimeSlot { .. }))
    ));
}

#[test]
fn check_in_and_cancel_follow_registration_lifecycle() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let donor = fixture.donors[0].id;
    let desk = fixture.service.registrations();

    let checked = desk.check_in(fixture.event.id, donor).expect("checked in");
    assert_eq!(checked.status, RegistrationStatus::CheckedIn);

    assert!(matches!(
        desk.check_in(fixture.event.id, donor),
        Err(DonationError::InvalidState(StateViolation::RegistrationTransition {
            from: RegistrationStatus::CheckedIn,
            to: RegistrationStatus::CheckedIn,
            ..
        }))
    ));

    let cancelled = desk.cancel(fixture.event.id, donor).expect("cancelled");
    assert_eq!(cancelled.status, RegistrationStatus::Cancelled);
    assert!(matches!(
        desk.cancel(fixture.event.id, donor),
        Err(DonationError::InvalidState(StateViolation::RegistrationTransition { .. }))
    ));
}

#[test]
fn failed_confirmation_does_not_abort_registration() {
    let (store, _, event) = pending_event(DonationType::WholeBlood);
    let notifier = Arc::new(FlakyNotifier::default());
    let service = DonationService::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        Arc::new(FixedClock::on(booking_day())),
    );
    service
        .events()
        .verify(event.id, ADMIN, "approve")
        .expect("approved");
    let (_, profile) = donor(&store, 3);
    notifier.reject(&donor_email(3));

    let registration = service
        .registrations()
        .register(event.id, &donor_email(3), profile.id, None, String::new())
        .expect("registered despite mail failure");
    assert_eq!(registration.status, RegistrationStatus::Registered);
    assert!(notifier.delivered().is_empty());

    notifier.recover();
    service
        .registrations()
        .cancel(event.id, profile.id)
        .expect("cancelled");
    service
        .registrations()
        .register(event.id, &donor_email(3), profile.id, None, String::new())
        .expect("registered again");
    assert_eq!(notifier.delivered().len(), 1);
}

#[test]
fn concurrent_sign_ups_fill_the_last_seat_once() {
    let fixture = registered(DonationType::WholeBlood, 0);
    let small_slot = fixture.event.time_slots[1].id;
    let donors: Vec<_> = (1..=8).map(|index| donor(&fixture.store, index)).collect();

    let outcomes = thread::scope(|scope| {
        let handles: Vec<_> = donors
            .iter()
            .map(|(account, profile)| {
                let service = &fixture.service;
                let event = fixture.event.id;
                scope.spawn(move || {
                    service.registrations().register(
                        event,
                        &account.email,
                        profile.id,
                        Some(small_slot),
                        String::new(),
                    )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished"))
            .collect::<Vec<_>>()
    });

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.iter().filter(|outcome| outcome.is_err()).all(|outcome| matches!(
        outcome,
        Err(DonationError::InvalidState(StateViolation::SlotFull(slot))) if *slot == small_slot
    )));
    assert_eq!(
        fixture
            .service
            .roster()
            .slot_occupancy(fixture.event.id, small_slot)
            .expect("occupancy"),
        1
    );
}

fn sign_up(
    fixture: &Fixture,
    profile_index: usize,
    slot_capacity: Option<u32>,
    token: &str,
) -> RegistrationCommit {
    let account = fixture
        .store
        .account_by_email(&donor_email(profile_index))
        .unwrap()
        .expect("account");
    let profile = fixture
        .store
        .profile_by_personal_id(&format!("07920000000{profile_index}"))
        .unwrap()
        .expect("profile");
    RegistrationCommit {
        registration: NewRegistration {
            event_id: fixture.event.id,
            account_id: account.id,
            profile_id: profile.id,
            time_slot_id: Some(fixture.event.time_slots[1].id),
            form: String::new(),
            checkin_token: Some(token.to_string()),
        },
        reactivates: None,
        slot_capacity,
        token: CheckinToken {
            token: token.to_string(),
            profile_id: profile.id,
            created_on: booking_day(),
            expires_on: drive_day(),
        },
    }
}

#[test]
fn rejected_registration_write_stores_no_token() {
    let fixture = registered(DonationType::WholeBlood, 1);
    donor(&fixture.store, 2);
    donor(&fixture.store, 3);

    assert_eq!(
        fixture
            .store
            .commit_registration(sign_up(&fixture, 1, None, "duplicate-token")),
        Err(RepositoryError::Conflict)
    );
    assert_eq!(fixture.store.token("duplicate-token").unwrap(), None);

    fixture
        .store
        .commit_registration(sign_up(&fixture, 2, Some(1), "seated-token"))
        .expect("last seat taken");
    assert_eq!(
        fixture
            .store
            .commit_registration(sign_up(&fixture, 3, Some(1), "overflow-token")),
        Err(RepositoryError::SlotFull)
    );
    assert_eq!(fixture.store.token("overflow-token").unwrap(), None);
    assert!(fixture.store.token("seated-token").unwrap().is_some());
}
