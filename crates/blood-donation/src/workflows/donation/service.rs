use std::sync::Arc;

use super::checkin::CheckinTokenManager;
use super::eligibility::{EligibilityNotifier, EligibilityScan};
use super::error::DonationError;
use super::lifecycle::DonationEventLifecycle;
use super::recording::BloodDonationRecorder;
use super::registration::RegistrationDesk;
use super::repository::{DonationRepository, NotificationSender};
use super::roster::DonorRoster;
use crate::clock::Clock;

/// Service composing the donation workflows over one repository and notifier.
pub struct DonationService<R, N> {
    events: DonationEventLifecycle<R>,
    checkin: CheckinTokenManager<R>,
    registrations: RegistrationDesk<R, N>,
    recording: BloodDonationRecorder<R>,
    roster: DonorRoster<R>,
    eligibility: EligibilityNotifier<R, N>,
    clock: Arc<dyn Clock>,
}

impl<R, N> DonationService<R, N>
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: DonationEventLifecycle::new(Arc::clone(&repository)),
            checkin: CheckinTokenManager::new(Arc::clone(&repository), Arc::clone(&clock)),
            registrations: RegistrationDesk::new(
                Arc::clone(&repository),
                Arc::clone(&notifier),
                Arc::clone(&clock),
            ),
            recording: BloodDonationRecorder::new(Arc::clone(&repository)),
            roster: DonorRoster::new(Arc::clone(&repository)),
            eligibility: EligibilityNotifier::new(repository, notifier),
            clock,
        }
    }

    pub fn events(&self) -> &DonationEventLifecycle<R> {
        &self.events
    }

    pub fn checkin(&self) -> &CheckinTokenManager<R> {
        &self.checkin
    }

    pub fn registrations(&self) -> &RegistrationDesk<R, N> {
        &self.registrations
    }

    pub fn recording(&self) -> &BloodDonationRecorder<R> {
        &self.recording
    }

    pub fn roster(&self) -> &DonorRoster<R> {
        &self.roster
    }

    pub fn eligibility(&self) -> &EligibilityNotifier<R, N> {
        &self.eligibility
    }

    /// Run the eligibility scan against the service clock.
    pub fn notify_eligible_donors(&self) -> Result<EligibilityScan, DonationError> {
        self.eligibility.notify_eligible_donors(self.clock.today())
    }
}
