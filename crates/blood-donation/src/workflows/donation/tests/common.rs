use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::clock::FixedClock;
use crate::workflows::donation::{
    Account, AccountRole, BloodType, BloodUnitRecord, DonationEvent, DonationRepository,
    DonationService, DonationType, EventSpec, InMemoryDonationStore, NewAccount, NewProfile,
    Notification, NotificationError, NotificationSender, Profile, TimeSlotSpec,
};

pub(super) const STAFF: &str = "staff@blood.example";
pub(super) const ADMIN: &str = "admin@blood.example";

pub(super) type TestService = DonationService<InMemoryDonationStore, MemoryNotifier>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
}

/// Day registrations are taken on, well before the drive.
pub(super) fn booking_day() -> NaiveDate {
    date(2024, 5, 20)
}

pub(super) fn drive_day() -> NaiveDate {
    date(2024, 6, 1)
}

pub(super) fn event_spec(donation_type: DonationType) -> EventSpec {
    EventSpec {
        name: "Community Hall Blood Drive".to_string(),
        address: "18 Le Loi, District 1".to_string(),
        donation_date: drive_day(),
        donation_type,
        time_slots: vec![
            TimeSlotSpec {
                start_time: time(8),
                end_time: time(10),
                max_capacity: 10,
            },
            TimeSlotSpec {
                start_time: time(10),
                end_time: time(12),
                max_capacity: 1,
            },
        ],
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSender for MemoryNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Rejects every recipient listed in `rejected`.
#[derive(Default)]
pub(super) struct FlakyNotifier {
    rejected: Mutex<Vec<String>>,
    delivered: Mutex<Vec<Notification>>,
}

impl FlakyNotifier {
    pub(super) fn reject(&self, recipient: &str) {
        self.rejected
            .lock()
            .expect("notifier mutex poisoned")
            .push(recipient.to_string());
    }

    pub(super) fn recover(&self) {
        self.rejected.lock().expect("notifier mutex poisoned").clear();
    }

    pub(super) fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSender for FlakyNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let rejected = self.rejected.lock().expect("notifier mutex poisoned");
        if rejected.contains(&notification.recipient) {
            return Err(NotificationError::Rejected(notification.recipient));
        }
        drop(rejected);
        self.delivered
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) fn account(store: &InMemoryDonationStore, email: &str, role: AccountRole) -> Account {
    store
        .insert_account(NewAccount {
            email: email.to_string(),
            role,
        })
        .expect("account inserted")
}

pub(super) fn donor(store: &InMemoryDonationStore, index: usize) -> (Account, Profile) {
    let account = account(store, &donor_email(index), AccountRole::Member);
    let profile = store
        .insert_profile(NewProfile {
            account_id: account.id,
            name: format!("Donor {index}"),
            personal_id: format!("07920000000{index}"),
            blood_type: Some(BloodType::OPositive),
            address: None,
            ward: None,
            district: None,
            city: None,
        })
        .expect("profile inserted");
    (account, profile)
}

pub(super) fn donor_email(index: usize) -> String {
    format!("donor{index}@example.com")
}

pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryDonationStore>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) service: TestService,
    pub(super) event: DonationEvent,
    pub(super) donors: Vec<Profile>,
}

impl Fixture {
    pub(super) fn records(&self) -> Vec<BloodUnitRecord> {
        self.donors.iter().map(record).collect()
    }
}

pub(super) fn record(profile: &Profile) -> BloodUnitRecord {
    BloodUnitRecord {
        profile_id: profile.id,
        volume_ml: 350.0,
        blood_type: profile.blood_type.unwrap_or(BloodType::OPositive),
    }
}

pub(super) fn build_service(store: &Arc<InMemoryDonationStore>, today: NaiveDate) -> (TestService, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::default());
    let service = DonationService::new(
        Arc::clone(store),
        Arc::clone(&notifier),
        Arc::new(FixedClock::on(today)),
    );
    (service, notifier)
}

/// Staff and admin accounts plus a PENDING event, no donors yet.
pub(super) fn pending_event(donation_type: DonationType) -> (Arc<InMemoryDonationStore>, TestService, DonationEvent) {
    let store = Arc::new(InMemoryDonationStore::new());
    account(&store, STAFF, AccountRole::Staff);
    account(&store, ADMIN, AccountRole::Admin);
    let (service, _) = build_service(&store, booking_day());
    let event = service
        .events()
        .create(event_spec(donation_type), STAFF)
        .expect("event created");
    (store, service, event)
}

/// Approved event with `donor_count` donors registered in the first slot.
pub(super) fn registered(donation_type: DonationType, donor_count: usize) -> Fixture {
    let (store, _, event) = pending_event(donation_type);
    let (service, notifier) = build_service(&store, booking_day());
    let (event, _) = service
        .events()
        .verify(event.id, ADMIN, "approve")
        .expect("event approved");

    let slot = event.time_slots[0].id;
    let donors = (1..=donor_count)
        .map(|index| {
            let (account, profile) = donor(&store, index);
            service
                .registrations()
                .register(event.id, &account.email, profile.id, Some(slot), "{}".to_string())
                .expect("registered");
            profile
        })
        .collect();

    Fixture {
        store,
        notifier,
        service,
        event,
        donors,
    }
}

/// Like [`registered`], with every donor checked in at the desk.
pub(super) fn checked_in(donation_type: DonationType, donor_count: usize) -> Fixture {
    let fixture = registered(donation_type, donor_count);
    for profile in &fixture.donors {
        fixture
            .service
            .registrations()
            .check_in(fixture.event.id, profile.id)
            .expect("checked in");
    }
    fixture
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
