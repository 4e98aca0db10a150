use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::clock::FixedClock;
use crate::workflows::distance::{
    DistanceError, DistanceGateway, DistanceService, FacilityAddress, RouteEstimate,
};
use crate::workflows::donation::{
    AccountRole, DonationRepository, InMemoryDonationStore, NewAccount, NewProfile, Profile,
};

pub(super) fn facility() -> FacilityAddress {
    FacilityAddress {
        street: Some("201B Nguyen Chi Thanh".to_string()),
        district: Some("District 5".to_string()),
        city: Some("Ho Chi Minh City".to_string()),
        state: None,
    }
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

pub(super) fn route(meters: u64) -> RouteEstimate {
    RouteEstimate {
        distance_meters: meters,
        distance_text: format!("{:.1} km", meters as f64 / 1000.0),
        duration_seconds: meters / 10,
        duration_text: format!("{} mins", meters / 600),
    }
}

/// Gateway answering from a fixed script and remembering what it was asked.
#[derive(Default)]
pub(super) struct StubGateway {
    answers: Mutex<Vec<Result<RouteEstimate, DistanceError>>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StubGateway {
    pub(super) fn answering(answers: Vec<Result<RouteEstimate, DistanceError>>) -> Self {
        Self {
            answers: Mutex::new(answers),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("stub mutex poisoned").clone()
    }
}

#[async_trait]
impl DistanceGateway for StubGateway {
    async fn route(&self, origin: &str, destination: &str) -> Result<RouteEstimate, DistanceError> {
        self.requests
            .lock()
            .expect("stub mutex poisoned")
            .push((origin.to_string(), destination.to_string()));
        let mut answers = self.answers.lock().expect("stub mutex poisoned");
        if answers.is_empty() {
            return Err(DistanceError::Failed("UNKNOWN_ERROR".to_string()));
        }
        answers.remove(0)
    }
}

pub(super) fn seed_profile(
    store: &InMemoryDonationStore,
    email: &str,
    personal_id: &str,
    with_address: bool,
) -> Profile {
    let account = store
        .insert_account(NewAccount {
            email: email.to_string(),
            role: AccountRole::Member,
        })
        .expect("account inserted");
    let (address, ward, district, city) = if with_address {
        (
            Some("12 Nguyen Trai".to_string()),
            Some("Phường Bến Thành".to_string()),
            Some("Quận 1".to_string()),
            Some("Ho Chi Minh City".to_string()),
        )
    } else {
        (None, None, None, None)
    };
    store
        .insert_profile(NewProfile {
            account_id: account.id,
            name: format!("Donor {personal_id}"),
            personal_id: personal_id.to_string(),
            blood_type: None,
            address,
            ward,
            district,
            city,
        })
        .expect("profile inserted")
}

pub(super) fn build_service(
    gateway: StubGateway,
) -> (
    DistanceService<InMemoryDonationStore, StubGateway>,
    Arc<InMemoryDonationStore>,
    Arc<StubGateway>,
) {
    let store = Arc::new(InMemoryDonationStore::new());
    let gateway = Arc::new(gateway);
    let service = DistanceService::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        facility(),
        Arc::new(FixedClock::on(today())),
    );
    (service, store, gateway)
}
