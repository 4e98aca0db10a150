use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{BloodUnitRecord, EventId, EventSpec, ProfileId, TimeSlotId};
use super::error::{ArgumentError, DonationError};
use super::paging::{AccountSortKey, EventSortKey, PageRequest, ProfileSortKey, SortKey};
use super::repository::{DonationRepository, NotificationSender, RepositoryError};
use super::service::DonationService;

type SharedService<R, N> = Arc<DonationService<R, N>>;

/// Router builder exposing the donation workflows over HTTP.
pub fn donation_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    Router::new()
        .route(
            "/api/v1/events",
            get(list_events_handler::<R, N>).post(create_event_handler::<R, N>),
        )
        .route("/api/v1/event-pages", get(event_page_handler::<R, N>))
        .route("/api/v1/events/:event_id", get(event_handler::<R, N>))
        .route(
            "/api/v1/events/:event_id/verification",
            post(verify_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/registrations",
            post(register_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/registrations/:profile_id/check-in",
            post(check_in_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/registrations/:profile_id/cancel",
            post(cancel_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/checkin",
            get(resolve_token_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/checkin/personal-id/:personal_id",
            get(resolve_personal_id_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/token",
            get(registration_token_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/blood-units",
            get(blood_units_handler::<R, N>).post(record_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/donors",
            get(donor_profiles_handler::<R, N>),
        )
        .route(
            "/api/v1/events/:event_id/slots/:slot_id/donors",
            get(slot_donors_handler::<R, N>),
        )
        .route(
            "/api/v1/eligibility/scan",
            post(eligibility_scan_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateEventRequest {
    pub(crate) staff_email: String,
    #[serde(flatten)]
    pub(crate) event: EventSpec,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyRequest {
    pub(crate) admin_email: String,
    pub(crate) action: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) email: String,
    pub(crate) profile_id: ProfileId,
    #[serde(default)]
    pub(crate) time_slot_id: Option<TimeSlotId>,
    #[serde(default)]
    pub(crate) form: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordRequest {
    pub(crate) operator_email: String,
    pub(crate) records: Vec<BloodUnitRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenQuery {
    pub(crate) token: String,
    pub(crate) operator: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmailQuery {
    pub(crate) email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    pub(crate) page: usize,
    #[serde(default = "default_page_size")]
    pub(crate) size: usize,
    #[serde(default = "default_sort_key")]
    pub(crate) sort_by: String,
    #[serde(default = "default_ascending")]
    pub(crate) ascending: bool,
    pub(crate) start: Option<NaiveDate>,
    pub(crate) end: Option<NaiveDate>,
}

fn default_page_size() -> usize {
    20
}

fn default_sort_key() -> String {
    "id".to_string()
}

fn default_ascending() -> bool {
    true
}

impl PageQuery {
    fn request<K: SortKey>(&self) -> Result<PageRequest<K>, DonationError> {
        Ok(PageRequest::parse(
            self.page,
            self.size,
            &self.sort_by,
            self.ascending,
        )?)
    }
}

/// Translate a service failure into a status code and JSON error payload.
pub(crate) fn error_response(error: DonationError) -> Response {
    let status = match &error {
        DonationError::NotFound(_) | DonationError::Repository(RepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        DonationError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DonationError::InvalidState(_)
        | DonationError::Repository(RepositoryError::Conflict)
        | DonationError::Repository(RepositoryError::SlotFull)
        | DonationError::Repository(RepositoryError::Stale(_)) => StatusCode::CONFLICT,
        DonationError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        DonationError::Repository(RepositoryError::Unavailable(_)) => {
            error!(%error, "donation repository unavailable");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, DonationError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    axum::Json(request): axum::Json<CreateEventRequest>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(
        StatusCode::CREATED,
        service.events().create(request.event, &request.staff_email),
    )
}

pub(crate) async fn list_events_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(StatusCode::OK, service.events().list())
}

pub(crate) async fn event_page_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<PageQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    let result = query
        .request::<EventSortKey>()
        .and_then(|request| match (query.start, query.end) {
            (Some(start), Some(end)) => {
                service.events().page_by_date_range(start, end, &request)
            }
            (None, None) => service.events().page(&request),
            _ => Err(ArgumentError::IncompleteDateRange.into()),
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(StatusCode::OK, service.events().get(EventId(event_id)))
}

pub(crate) async fn verify_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    axum::Json(request): axum::Json<VerifyRequest>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    match service
        .events()
        .verify(EventId(event_id), &request.admin_email, &request.action)
    {
        Ok((event, decision)) => {
            let payload = json!({
                "message": format!("Donation event {} successfully", decision.past_tense()),
                "event": event,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    axum::Json(request): axum::Json<RegisterRequest>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    let result = service.registrations().register(
        EventId(event_id),
        &request.email,
        request.profile_id,
        request.time_slot_id,
        request.form,
    );
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn check_in_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((event_id, profile_id)): Path<(u64, u64)>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(
        StatusCode::OK,
        service
            .registrations()
            .check_in(EventId(event_id), ProfileId(profile_id)),
    )
}

pub(crate) async fn cancel_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((event_id, profile_id)): Path<(u64, u64)>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(
        StatusCode::OK,
        service
            .registrations()
            .cancel(EventId(event_id), ProfileId(profile_id)),
    )
}

pub(crate) async fn resolve_token_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    Query(query): Query<TokenQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(
        StatusCode::OK,
        service
            .checkin()
            .resolve(&query.token, &query.operator, EventId(event_id)),
    )
}

pub(crate) async fn resolve_personal_id_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((event_id, personal_id)): Path<(u64, String)>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(
        StatusCode::OK,
        service
            .checkin()
            .resolve_by_personal_id(&personal_id, EventId(event_id)),
    )
}

pub(crate) async fn registration_token_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    Query(query): Query<EmailQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    match service
        .checkin()
        .token_for_registration(EventId(event_id), &query.email)
    {
        Ok(token) => (StatusCode::OK, axum::Json(json!({ "token": token }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn record_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    axum::Json(request): axum::Json<RecordRequest>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    match service.recording().record_batch(
        EventId(event_id),
        &request.records,
        &request.operator_email,
    ) {
        Ok(receipt) => {
            let payload = json!({
                "message": receipt.message(),
                "units": receipt.units,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn blood_units_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(StatusCode::OK, service.roster().blood_units(EventId(event_id)))
}

pub(crate) async fn donor_profiles_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(event_id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    let result = query
        .request::<ProfileSortKey>()
        .and_then(|request| service.roster().donor_profiles_page(EventId(event_id), &request));
    respond(StatusCode::OK, result)
}

pub(crate) async fn slot_donors_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((event_id, slot_id)): Path<(u64, u64)>,
    Query(query): Query<PageQuery>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    let result = query.request::<AccountSortKey>().and_then(|request| {
        service
            .roster()
            .donors_page(EventId(event_id), TimeSlotId(slot_id), &request)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn eligibility_scan_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
{
    respond(StatusCode::OK, service.notify_eligible_donors())
}
