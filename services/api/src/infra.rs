use blood_donation::workflows::donation::{Notification, NotificationError, NotificationSender};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes outbound donor mail to the log until an SMTP relay is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotificationSender;

impl NotificationSender for LoggingNotificationSender {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "outbound notification"
        );
        Ok(())
    }
}

/// Keeps every notification so the demo can print what donors would receive.
#[derive(Default, Clone)]
pub(crate) struct InMemoryOutbox {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationSender for InMemoryOutbox {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut guard = self.sent.lock().expect("outbox mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

impl InMemoryOutbox {
    pub(crate) fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().expect("outbox mutex poisoned"))
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
