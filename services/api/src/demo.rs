use crate::infra::InMemoryOutbox;
use blood_donation::clock::{Clock, FixedClock};
use blood_donation::error::AppError;
use blood_donation::workflows::donation::{
    AccountRole, BloodType, BloodUnitRecord, DonationError, DonationRepository, DonationService,
    DonationType, EventSpec, InMemoryDonationStore, NewAccount, NewProfile, Profile, RepositoryError,
    TimeSlotSpec,
};
use chrono::{Days, Local, NaiveDate, NaiveTime};
use clap::Args;
use std::sync::Arc;

const COORDINATOR: &str = "coordinator@hospital.example";
const DIRECTOR: &str = "director@hospital.example";

const DONORS: &[(&str, BloodType)] = &[
    ("Tran Van An", BloodType::OPositive),
    ("Le Thi Binh", BloodType::APositive),
    ("Pham Minh Chau", BloodType::BNegative),
    ("Hoang Duc Dung", BloodType::AbPositive),
    ("Vo Thi Em", BloodType::ONegative),
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date of the blood drive (YYYY-MM-DD). Defaults to two weeks from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) drive_date: Option<NaiveDate>,
    /// Number of seeded donors to register (1-5).
    #[arg(long, default_value_t = 3)]
    pub(crate) donors: usize,
    /// Donation type collected at the drive.
    #[arg(long)]
    pub(crate) platelets: bool,
}

type DemoService = DonationService<InMemoryDonationStore, InMemoryOutbox>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let drive_date = args
        .drive_date
        .unwrap_or_else(|| Local::now().date_naive() + Days::new(14));
    let booking_date = drive_date - Days::new(10);
    let donor_count = args.donors.clamp(1, DONORS.len());
    let donation_type = if args.platelets {
        DonationType::Platelets
    } else {
        DonationType::WholeBlood
    };

    let store = Arc::new(InMemoryDonationStore::new());
    let outbox = InMemoryOutbox::default();
    let donors = seed(&store, donor_count)?;

    println!("Blood drive demo");
    println!("  Booking opens {booking_date}, drive on {drive_date}");

    let booking = service_on(&store, &outbox, booking_date);
    let event = booking.events().create(
        EventSpec {
            name: "Community Hall Blood Drive".to_string(),
            address: "201B Nguyen Chi Thanh, District 5".to_string(),
            donation_date: drive_date,
            donation_type,
            time_slots: vec![slot(7, 9, 20), slot(9, 11, 20)],
        },
        COORDINATOR,
    )?;
    println!(
        "\nScheduled event #{} ({}) with {} time slots, status {}",
        event.id,
        event.donation_type.label(),
        event.time_slots.len(),
        event.status.label()
    );

    let (event, decision) = booking.events().verify(event.id, DIRECTOR, "approve")?;
    println!("Donation event {} successfully", decision.past_tense());

    println!("\nRegistrations");
    for (index, profile) in donors.iter().enumerate() {
        let slot = &event.time_slots[index % event.time_slots.len()];
        let email = donor_email(index);
        booking
            .registrations()
            .register(event.id, &email, profile.id, Some(slot.id), "{}".to_string())?;
        let token = booking.checkin().token_for_registration(event.id, &email)?;
        println!(
            "  - {} booked {}-{} (check-in token {token})",
            profile.name,
            slot.start_time.format("%H:%M"),
            slot.end_time.format("%H:%M"),
        );
    }
    print_outbox(&outbox);

    let drive = service_on(&store, &outbox, drive_date);
    println!("\nCheck-in desk");
    for (index, profile) in donors.iter().enumerate() {
        let token = drive
            .checkin()
            .token_for_registration(event.id, &donor_email(index))?;
        let view = drive.checkin().resolve(&token, COORDINATOR, event.id)?;
        drive.registrations().check_in(event.id, profile.id)?;
        println!("  - {} verified by token, status was {}", view.profile.name, view.status.label());
    }

    let records: Vec<BloodUnitRecord> = donors
        .iter()
        .map(|profile| BloodUnitRecord {
            profile_id: profile.id,
            volume_ml: 350.0,
            blood_type: profile.blood_type.unwrap_or(BloodType::OPositive),
        })
        .collect();
    let receipt = drive.recording().record_batch(event.id, &records, COORDINATOR)?;
    println!("\n{}", receipt.message());

    let mut next_eligible = drive_date;
    for unit in &receipt.units {
        let profile = store.profile(unit.profile_id).map_err(DonationError::from)?;
        if let Some(date) = profile.and_then(|profile| profile.next_eligible_donation_date) {
            println!(
                "  - unit #{} {} {:.0} ml, donor eligible again {}",
                unit.id,
                unit.blood_type.label(),
                unit.volume_ml,
                date
            );
            next_eligible = next_eligible.max(date);
        }
    }

    let reminders = service_on(&store, &outbox, next_eligible).notify_eligible_donors()?;
    println!(
        "\nEligibility scan on {next_eligible}: {} reminded, {} failed, {} skipped",
        reminders.notified.len(),
        reminders.failed.len(),
        reminders.skipped
    );
    print_outbox(&outbox);

    Ok(())
}

fn service_on(store: &Arc<InMemoryDonationStore>, outbox: &InMemoryOutbox, today: NaiveDate) -> DemoService {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today));
    DonationService::new(Arc::clone(store), Arc::new(outbox.clone()), clock)
}

fn seed(store: &InMemoryDonationStore, donor_count: usize) -> Result<Vec<Profile>, DonationError> {
    store.insert_account(NewAccount {
        email: COORDINATOR.to_string(),
        role: AccountRole::Staff,
    })?;
    store.insert_account(NewAccount {
        email: DIRECTOR.to_string(),
        role: AccountRole::Admin,
    })?;

    let profiles = DONORS
        .iter()
        .take(donor_count)
        .enumerate()
        .map(|(index, (name, blood_type))| {
            let account = store.insert_account(NewAccount {
                email: donor_email(index),
                role: AccountRole::Member,
            })?;
            store.insert_profile(NewProfile {
                account_id: account.id,
                name: (*name).to_string(),
                personal_id: format!("0792010000{index:02}"),
                blood_type: Some(*blood_type),
                address: None,
                ward: None,
                district: None,
                city: Some("Ho Chi Minh City".to_string()),
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;
    Ok(profiles)
}

fn slot(start: u32, end: u32, capacity: u32) -> TimeSlotSpec {
    TimeSlotSpec {
        start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap_or(NaiveTime::MIN),
        end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap_or(NaiveTime::MIN),
        max_capacity: capacity,
    }
}

fn donor_email(index: usize) -> String {
    format!("donor{}@example.com", index + 1)
}

fn print_outbox(outbox: &InMemoryOutbox) {
    let sent = outbox.drain();
    if sent.is_empty() {
        return;
    }
    println!("  Outbox:");
    for mail in sent {
        println!("    to {}: {}", mail.recipient, mail.subject);
    }
}
