use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::domain::{DonationEvent, EventId, EventSpec, EventStatus, NewDonationEvent};
use super::error::{ArgumentError, DonationError, StateViolation};
use super::paging::{EventSortKey, Page, PageRequest};
use super::repository::DonationRepository;
use super::validator::{DonationValidator, EventDecision};

/// Scheduling and administrative review of donation events.
pub struct DonationEventLifecycle<R> {
    repository: Arc<R>,
    validator: DonationValidator<R>,
}

impl<R: DonationRepository> DonationEventLifecycle<R> {
    pub fn new(repository: Arc<R>) -> Self {
        let validator = DonationValidator::new(Arc::clone(&repository));
        Self {
            repository,
            validator,
        }
    }

    /// Schedule a new event in PENDING status together with its time slots.
    pub fn create(
        &self,
        spec: EventSpec,
        staff_email: &str,
    ) -> Result<DonationEvent, DonationError> {
        let staff = self.validator.account_by_email(staff_email)?;
        self.validator.validate_event_spec(&spec)?;

        let EventSpec {
            name,
            address,
            donation_date,
            donation_type,
            time_slots,
        } = spec;
        let event = self.repository.create_event(
            NewDonationEvent {
                name: name.trim().to_string(),
                address: address.trim().to_string(),
                donation_date,
                donation_type,
                created_by: staff.id,
            },
            time_slots,
        )?;

        info!(
            event = %event.id,
            staff = %staff.email,
            slots = event.time_slots.len(),
            date = %event.donation_date,
            "donation event created"
        );
        Ok(event)
    }

    /// Approve or reject an event on behalf of `admin_email`.
    ///
    /// Previously decided events may be decided again; completed events may not.
    pub fn verify(
        &self,
        event_id: EventId,
        admin_email: &str,
        action: &str,
    ) -> Result<(DonationEvent, EventDecision), DonationError> {
        let decision = EventDecision::parse(action)?;
        let mut event = self.validator.event(event_id)?;
        let admin = self.validator.account_by_email(admin_email)?;

        match event.status {
            EventStatus::Completed => return Err(StateViolation::EventClosed(event.id).into()),
            EventStatus::Approved | EventStatus::Rejected => warn!(
                event = %event.id,
                previous = event.status.label(),
                next = decision.status().label(),
                "re-deciding an already reviewed event"
            ),
            EventStatus::Pending => {}
        }

        event.status = decision.status();
        event.decided_by = Some(admin.id);
        self.repository.update_event(&event)?;

        info!(event = %event.id, admin = %admin.email, decision = decision.past_tense(), "donation event reviewed");
        Ok((event, decision))
    }

    pub fn get(&self, event_id: EventId) -> Result<DonationEvent, DonationError> {
        self.validator.event(event_id)
    }

    pub fn list(&self) -> Result<Vec<DonationEvent>, DonationError> {
        Ok(self.repository.events()?)
    }

    pub fn page(
        &self,
        request: &PageRequest<EventSortKey>,
    ) -> Result<Page<DonationEvent>, DonationError> {
        let events = self.repository.events()?;
        Ok(request.apply(events))
    }

    /// Events dated within `[start, end]`, both ends inclusive.
    pub fn page_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        request: &PageRequest<EventSortKey>,
    ) -> Result<Page<DonationEvent>, DonationError> {
        if start > end {
            return Err(ArgumentError::DateRange { start, end }.into());
        }
        let events = self.repository.events_between(start, end)?;
        Ok(request.apply(events))
    }
}
