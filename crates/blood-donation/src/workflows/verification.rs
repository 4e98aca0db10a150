//! Short-lived e-mail verification and password reset codes.
//!
//! Codes live behind [`VerificationCodeStore`] with their expiry stored next to
//! them, so a durable table can replace the in-memory map without changing the
//! read path. Expired codes are rejected lazily on redeem and purged by
//! [`VerificationCodes::sweep`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::workflows::donation::{Notification, NotificationSender, RepositoryError};

const CODE_DIGITS: usize = 6;
const MAX_ISSUE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    AccountVerification,
    PasswordReset,
}

impl VerificationPurpose {
    fn subject(self) -> &'static str {
        match self {
            Self::AccountVerification => "Account Verification",
            Self::PasswordReset => "Password Reset Request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub code: String,
    pub email: String,
    pub purpose: VerificationPurpose,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Keyed storage for outstanding codes. At most one code per e-mail address.
pub trait VerificationCodeStore: Send + Sync {
    /// Store `code`, dropping any code already held for the same e-mail.
    /// Fails with `Conflict` when the code value is taken by another address.
    fn replace(&self, code: VerificationCode) -> Result<(), RepositoryError>;
    /// Remove and return the code, if present.
    fn take(&self, code: &str) -> Result<Option<VerificationCode>, RepositoryError>;
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError>;
    fn outstanding(&self) -> Result<usize, RepositoryError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryVerificationStore {
    codes: Arc<Mutex<HashMap<String, VerificationCode>>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VerificationCode>> {
        self.codes.lock().expect("verification store mutex poisoned")
    }
}

impl VerificationCodeStore for InMemoryVerificationStore {
    fn replace(&self, code: VerificationCode) -> Result<(), RepositoryError> {
        let mut codes = self.lock();
        if codes
            .get(&code.code)
            .is_some_and(|existing| existing.email != code.email)
        {
            return Err(RepositoryError::Conflict);
        }
        codes.retain(|_, existing| existing.email != code.email);
        codes.insert(code.code.clone(), code);
        Ok(())
    }

    fn take(&self, code: &str) -> Result<Option<VerificationCode>, RepositoryError> {
        Ok(self.lock().remove(code))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut codes = self.lock();
        let before = codes.len();
        codes.retain(|_, code| !code.is_expired(now));
        Ok(before - codes.len())
    }

    fn outstanding(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock().len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("verification code invalid")]
    Invalid,
    #[error("verification code expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
    #[error("e-mail address must not be blank")]
    BlankEmail,
    #[error("could not allocate a unique verification code")]
    Exhausted,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Issues, redeems, and expires verification codes.
pub struct VerificationCodes<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    ttl: Duration,
}

impl<S, N> VerificationCodes<S, N>
where
    S: VerificationCodeStore,
    N: NotificationSender,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, ttl: Duration) -> Self {
        Self {
            store,
            notifier,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace any outstanding code for `email` with a fresh one and mail it.
    pub fn issue(
        &self,
        email: &str,
        purpose: VerificationPurpose,
        now: DateTime<Utc>,
    ) -> Result<VerificationCode, VerificationError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(VerificationError::BlankEmail);
        }

        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let code = VerificationCode {
                code: generate_code(),
                email: email.to_string(),
                purpose,
                issued_at: now,
                expires_at: now + self.ttl,
            };
            match self.store.replace(code.clone()) {
                Ok(()) => {
                    debug!(email, purpose = ?purpose, "verification code issued");
                    self.deliver(&code);
                    return Ok(code);
                }
                Err(RepositoryError::Conflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(VerificationError::Exhausted)
    }

    /// Consume `code`. Expired codes are removed and reported as expired.
    pub fn redeem(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationCode, VerificationError> {
        let stored = self
            .store
            .take(code.trim())?
            .ok_or(VerificationError::Invalid)?;
        if stored.is_expired(now) {
            return Err(VerificationError::Expired {
                expired_at: stored.expires_at,
            });
        }
        info!(email = %stored.email, purpose = ?stored.purpose, "verification code redeemed");
        Ok(stored)
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize, VerificationError> {
        let purged = self.store.purge_expired(now)?;
        if purged > 0 {
            info!(purged, "expired verification codes purged");
        }
        Ok(purged)
    }

    fn deliver(&self, code: &VerificationCode) {
        let body = match code.purpose {
            VerificationPurpose::AccountVerification => format!(
                "Welcome to the blood donation programme. Use code {} to verify your account.",
                code.code
            ),
            VerificationPurpose::PasswordReset => format!(
                "Your password reset code is {}. It expires in {} minutes.",
                code.code,
                self.ttl.num_minutes()
            ),
        };
        let notification = Notification {
            recipient: code.email.clone(),
            subject: code.purpose.subject().to_string(),
            body,
        };
        if let Err(error) = self.notifier.send(notification) {
            warn!(email = %code.email, %error, "verification code not delivered");
        }
    }
}

fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:0width$}", width = CODE_DIGITS)
}

/// Verification endpoints plus the clock they stamp requests with.
pub struct VerificationApi<S, N> {
    pub codes: VerificationCodes<S, N>,
    pub clock: Arc<dyn Clock>,
}

pub fn verification_router<S, N>(api: Arc<VerificationApi<S, N>>) -> Router
where
    S: VerificationCodeStore + 'static,
    N: NotificationSender + 'static,
{
    Router::new()
        .route("/api/v1/verification-codes", post(issue_handler::<S, N>))
        .route(
            "/api/v1/verification-codes/redeem",
            post(redeem_handler::<S, N>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueRequest {
    pub(crate) email: String,
    pub(crate) purpose: VerificationPurpose,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedeemRequest {
    pub(crate) code: String,
}

pub(crate) async fn issue_handler<S, N>(
    State(api): State<Arc<VerificationApi<S, N>>>,
    axum::Json(request): axum::Json<IssueRequest>,
) -> Response
where
    S: VerificationCodeStore + 'static,
    N: NotificationSender + 'static,
{
    match api
        .codes
        .issue(&request.email, request.purpose, api.clock.now())
    {
        Ok(code) => {
            let payload = json!({
                "message": "verification code sent",
                "expires_at": code.expires_at,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => verification_error_response(error),
    }
}

pub(crate) async fn redeem_handler<S, N>(
    State(api): State<Arc<VerificationApi<S, N>>>,
    axum::Json(request): axum::Json<RedeemRequest>,
) -> Response
where
    S: VerificationCodeStore + 'static,
    N: NotificationSender + 'static,
{
    match api.codes.redeem(&request.code, api.clock.now()) {
        Ok(code) => {
            let payload = json!({
                "email": code.email,
                "purpose": code.purpose,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => verification_error_response(error),
    }
}

fn verification_error_response(error: VerificationError) -> Response {
    let status = match &error {
        VerificationError::Invalid | VerificationError::BlankEmail => StatusCode::BAD_REQUEST,
        VerificationError::Expired { .. } => StatusCode::GONE,
        VerificationError::Exhausted | VerificationError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
