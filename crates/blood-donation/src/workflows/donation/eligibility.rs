use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Profile, ProfileId};
use super::error::DonationError;
use super::repository::{DonationRepository, Notification, NotificationSender};

/// Outcome of one eligibility scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EligibilityScan {
    pub notified: Vec<ProfileId>,
    pub failed: Vec<ProfileId>,
    pub skipped: usize,
}

/// Reminds donors once their deferral period is over.
pub struct EligibilityNotifier<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> EligibilityNotifier<R, N>
where
    R: DonationRepository,
    N: NotificationSender,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Notify every profile eligible on `today` that has not heard about it yet.
    ///
    /// A failed send leaves the profile unstamped so the next scan retries it.
    /// Only `eligibility_notified_on` is written, and only if no donation was
    /// recorded for the profile since it was read.
    pub fn notify_eligible_donors(&self, today: NaiveDate) -> Result<EligibilityScan, DonationError> {
        let mut scan = EligibilityScan::default();

        for profile in self.repository.profiles_eligible_by(today)? {
            let Some(eligible_on) = profile.next_eligible_donation_date else {
                scan.skipped += 1;
                continue;
            };
            if already_notified(&profile) {
                scan.skipped += 1;
                continue;
            }
            let Some(recipient) = self.repository.account(profile.account_id)? else {
                warn!(profile = %profile.id, "eligible profile has no account, skipping");
                scan.skipped += 1;
                continue;
            };

            match self.notifier.send(reminder(&recipient.email, &profile)) {
                Ok(()) => {
                    let stamped = self
                        .repository
                        .mark_eligibility_notified(profile.id, eligible_on, today)?;
                    if stamped {
                        debug!(profile = %profile.id, "eligibility reminder sent");
                    } else {
                        debug!(profile = %profile.id, "donation recorded during scan, reminder left unstamped");
                    }
                    scan.notified.push(profile.id);
                }
                Err(error) => {
                    warn!(profile = %profile.id, %error, "eligibility reminder failed");
                    scan.failed.push(profile.id);
                }
            }
        }

        info!(
            notified = scan.notified.len(),
            failed = scan.failed.len(),
            skipped = scan.skipped,
            "eligibility scan finished"
        );
        Ok(scan)
    }
}

fn already_notified(profile: &Profile) -> bool {
    match (profile.eligibility_notified_on, profile.next_eligible_donation_date) {
        (Some(notified), Some(eligible)) => notified >= eligible,
        _ => false,
    }
}

fn reminder(recipient: &str, profile: &Profile) -> Notification {
    let since = profile
        .next_eligible_donation_date
        .map(|date| format!(" since {date}"))
        .unwrap_or_default();
    Notification {
        recipient: recipient.to_string(),
        subject: "You can donate blood again".to_string(),
        body: format!(
            "Hello {}, you have been eligible to donate{since}. Check upcoming events to book a slot.",
            profile.name
        ),
    }
}
