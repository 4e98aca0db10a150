use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use super::common::*;
use crate::workflows::donation::{
    BloodUnitRecord, DonationRepository, DonationType, EligibilityNotifier, EventId,
    InMemoryDonationStore, Notification, NotificationError, NotificationSender, Profile,
    RecordingReceipt,
};

fn eligible_from(store: &InMemoryDonationStore, index: usize, day: NaiveDate) -> Profile {
    let (_, mut profile) = donor(store, index);
    profile.last_donation_date = Some(day - chrono::Days::new(84));
    profile.next_eligible_donation_date = Some(day);
    store.update_profile(&profile).expect("profile updated");
    profile
}

fn notifier_over(
    store: &Arc<InMemoryDonationStore>,
) -> (EligibilityNotifier<InMemoryDonationStore, FlakyNotifier>, Arc<FlakyNotifier>) {
    let mail = Arc::new(FlakyNotifier::default());
    (
        EligibilityNotifier::new(Arc::clone(store), Arc::clone(&mail)),
        mail,
    )
}

#[test]
fn eligible_donor_is_reminded_once() {
    let store = Arc::new(InMemoryDonationStore::new());
    let ready = eligible_from(&store, 1, date(2024, 6, 1));
    let (notifier, mail) = notifier_over(&store);

    let first = notifier.notify_eligible_donors(date(2024, 6, 3)).expect("scan");
    assert_eq!(first.notified, vec![ready.id]);
    assert_eq!(first.skipped, 0);
    let delivered = mail.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient, donor_email(1));
    assert!(delivered[0].body.contains("2024-06-01"));

    let stored = store.profile(ready.id).unwrap().expect("profile");
    assert_eq!(stored.eligibility_notified_on, Some(date(2024, 6, 3)));

    let second = notifier.notify_eligible_donors(date(2024, 6, 10)).expect("scan");
    assert!(second.notified.is_empty());
    assert_eq!(second.skipped, 1);
    assert_eq!(mail.delivered().len(), 1);
}

#[test]
fn donors_still_deferred_are_left_alone() {
    let store = Arc::new(InMemoryDonationStore::new());
    eligible_from(&store, 1, date(2024, 8, 24));
    let (_, never_donated) = donor(&store, 2);
    let (notifier, mail) = notifier_over(&store);

    let scan = notifier.notify_eligible_donors(date(2024, 6, 3)).expect("scan");
    assert!(scan.notified.is_empty());
    assert!(mail.delivered().is_empty());
    assert_eq!(
        store
            .profile(never_donated.id)
            .unwrap()
            .and_then(|profile| profile.eligibility_notified_on),
        None
    );
}

#[test]
fn failed_reminder_is_retried_on_next_scan() {
    let store = Arc::new(InMemoryDonationStore::new());
    let first = eligible_from(&store, 1, date(2024, 6, 1));
    let second = eligible_from(&store, 2, date(2024, 6, 1));
    let (notifier, mail) = notifier_over(&store);
    mail.reject(&donor_email(2));

    let scan = notifier.notify_eligible_donors(date(2024, 6, 2)).expect("scan");
    assert_eq!(scan.notified, vec![first.id]);
    assert_eq!(scan.failed, vec![second.id]);
    assert_eq!(
        store
            .profile(second.id)
            .unwrap()
            .and_then(|profile| profile.eligibility_notified_on),
        None
    );

    mail.recover();
    let retry = notifier.notify_eligible_donors(date(2024, 6, 3)).expect("scan");
    assert_eq!(retry.notified, vec![second.id]);
    assert_eq!(retry.skipped, 1);
    assert!(retry.failed.is_empty());
}

#[test]
fn new_deferral_after_donation_triggers_new_reminder() {
    let fixture = checked_in(DonationType::Platelets, 1);
    let donor = fixture.donors[0].id;
    let mut profile = fixture.store.profile(donor).unwrap().expect("profile");
    profile.eligibility_notified_on = Some(date(2024, 3, 1));
    fixture.store.update_profile(&profile).expect("profile updated");

    fixture
        .service
        .recording()
        .record_batch(fixture.event.id, &fixture.records(), STAFF)
        .expect("recorded");

    let notifier = fixture.service.eligibility();
    assert!(notifier
        .notify_eligible_donors(date(2024, 6, 21))
        .expect("scan")
        .notified
        .is_empty());
    let scan = notifier.notify_eligible_donors(date(2024, 6, 22)).expect("scan");
    assert_eq!(scan.notified, vec![donor]);
    assert!(fixture
        .notifier
        .sent()
        .iter()
        .any(|notification| notification.subject == "You can donate blood again"));
}

/// Sender whose delivery overlaps with the event's recording batch.
struct RecordsWhileSending {
    desk: TestService,
    event: EventId,
    records: Vec<BloodUnitRecord>,
    receipt: Mutex<Option<RecordingReceipt>>,
}

impl NotificationSender for RecordsWhileSending {
    fn send(&self, _notification: Notification) -> Result<(), NotificationError> {
        let receipt = self
            .desk
            .recording()
            .record_batch(self.event, &self.records, STAFF)
            .map_err(|error| NotificationError::Transport(error.to_string()))?;
        *self.receipt.lock().expect("receipt mutex poisoned") = Some(receipt);
        Ok(())
    }
}

#[test]
fn donation_recorded_mid_scan_keeps_its_new_dates() {
    let fixture = checked_in(DonationType::WholeBlood, 1);
    let donor = fixture.donors[0].id;
    let mut profile = fixture.store.profile(donor).unwrap().expect("profile");
    profile.last_donation_date = Some(date(2024, 3, 1));
    profile.next_eligible_donation_date = Some(date(2024, 5, 24));
    fixture.store.update_profile(&profile).expect("profile updated");

    let records = fixture.records();
    let event = fixture.event.id;
    let store = Arc::clone(&fixture.store);
    let sender = Arc::new(RecordsWhileSending {
        desk: fixture.service,
        event,
        records,
        receipt: Mutex::new(None),
    });
    let notifier = EligibilityNotifier::new(Arc::clone(&store), Arc::clone(&sender));

    let scan = notifier.notify_eligible_donors(drive_day()).expect("scan");
    assert_eq!(scan.notified, vec![donor]);
    assert_eq!(
        sender
            .receipt
            .lock()
            .expect("receipt mutex poisoned")
            .as_ref()
            .map(|receipt| receipt.units.len()),
        Some(1)
    );

    let stored = store.profile(donor).unwrap().expect("profile");
    assert_eq!(stored.last_donation_date, Some(drive_day()));
    assert_eq!(stored.next_eligible_donation_date, Some(date(2024, 8, 24)));
    assert_eq!(stored.eligibility_notified_on, None);
}
