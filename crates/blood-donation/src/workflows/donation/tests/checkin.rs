use std::sync::Arc;

use chrono::NaiveDate;

use super::common::*;
use crate::clock::FixedClock;
use crate::workflows::donation::{
    AccountRole, CheckinTokenManager, DonationError, DonationRepository, DonationType, EventId,
    InMemoryDonationStore, Missing, Profile, RegistrationStatus, StateViolation,
};

fn manager_on(store: &Arc<InMemoryDonationStore>, day: NaiveDate) -> CheckinTokenManager<InMemoryDonationStore> {
    CheckinTokenManager::new(Arc::clone(store), Arc::new(FixedClock::on(day)))
}

fn token_of(fixture: &Fixture, profile: &Profile) -> String {
    fixture
        .store
        .registration_for_profile(fixture.event.id, profile.id)
        .expect("lookup")
        .and_then(|registration| registration.checkin_token)
        .expect("registration carries a token")
}

#[test]
fn registration_token_expires_the_day_after_the_drive() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let token = token_of(&fixture, &fixture.donors[0]);

    let stored = fixture.store.token(&token).expect("lookup").expect("stored");
    assert_eq!(stored.profile_id, fixture.donors[0].id);
    assert_eq!(stored.created_on, booking_day());
    assert_eq!(stored.expires_on, date(2024, 6, 2));
}

#[test]
fn resolve_returns_checkin_view_through_expiry_day() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let profile = &fixture.donors[0];
    let token = token_of(&fixture, profile);

    for day in [drive_day(), date(2024, 6, 2)] {
        let view = manager_on(&fixture.store, day)
            .resolve(&token, STAFF, fixture.event.id)
            .expect("token still valid");
        assert_eq!(view.profile.id, profile.id);
        assert_eq!(view.status, RegistrationStatus::Registered);
        assert_eq!(view.form, "{}");
    }
}

#[test]
fn resolve_rejects_expired_token() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let token = token_of(&fixture, &fixture.donors[0]);

    match manager_on(&fixture.store, date(2024, 6, 3)).resolve(&token, STAFF, fixture.event.id) {
        Err(DonationError::InvalidState(StateViolation::TokenExpired { expired_on })) => {
            assert_eq!(expired_on, date(2024, 6, 2))
        }
        other => panic!("expected expired token, got {other:?}"),
    }
}

#[test]
fn resolve_reports_unknown_token_and_event() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let manager = manager_on(&fixture.store, drive_day());

    assert!(matches!(
        manager.resolve("not-a-token", STAFF, fixture.event.id),
        Err(DonationError::NotFound(Missing::Token))
    ));
    let token = token_of(&fixture, &fixture.donors[0]);
    assert!(matches!(
        manager.resolve(&token, STAFF, EventId(9_999)),
        Err(DonationError::NotFound(Missing::Event(EventId(9_999))))
    ));
}

#[test]
fn resolve_by_personal_id_falls_back_without_token() {
    let fixture = checked_in(DonationType::WholeBlood, 2);
    let manager = manager_on(&fixture.store, drive_day());

    let view = manager
        .resolve_by_personal_id(&fixture.donors[1].personal_id, fixture.event.id)
        .expect("profile found");
    assert_eq!(view.profile.id, fixture.donors[1].id);
    assert_eq!(view.status, RegistrationStatus::CheckedIn);

    match manager.resolve_by_personal_id("000000000000", fixture.event.id) {
        Err(DonationError::NotFound(Missing::PersonalId(id))) => assert_eq!(id, "000000000000"),
        other => panic!("expected unknown personal id, got {other:?}"),
    }
}

#[test]
fn token_for_registration_returns_the_issued_token() {
    let fixture = registered(DonationType::WholeBlood, 1);
    let expected = token_of(&fixture, &fixture.donors[0]);

    let token = fixture
        .service
        .checkin()
        .token_for_registration(fixture.event.id, &donor_email(1))
        .expect("token");
    assert_eq!(token, expected);
}

#[test]
fn token_for_registration_requires_a_registration() {
    let fixture = registered(DonationType::WholeBlood, 1);
    account(&fixture.store, "bystander@example.com", AccountRole::Member);

    match fixture
        .service
        .checkin()
        .token_for_registration(fixture.event.id, "bystander@example.com")
    {
        Err(DonationError::NotFound(Missing::AccountRegistration { event, email })) => {
            assert_eq!(event, fixture.event.id);
            assert_eq!(email, "bystander@example.com");
        }
        other => panic!("expected missing registration, got {other:?}"),
    }
}

#[test]
fn token_for_registration_rejects_expired_token() {
    let fixture = registered(DonationType::WholeBlood, 1);

    let result = manager_on(&fixture.store, date(2024, 6, 10))
        .token_for_registration(fixture.event.id, &donor_email(1));
    assert!(matches!(
        result,
        Err(DonationError::InvalidState(StateViolation::TokenExpired { .. }))
    ));
}
