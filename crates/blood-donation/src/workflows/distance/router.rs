use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::client::DistanceGateway;
use super::service::DistanceService;
use super::DistanceRepository;
use crate::workflows::donation::router::error_response;
use crate::workflows::donation::{DonationRepository, ProfileId};

type SharedService<R, G> = Arc<DistanceService<R, G>>;

pub fn distance_router<R, G>(service: SharedService<R, G>) -> Router
where
    R: DonationRepository + DistanceRepository + 'static,
    G: DistanceGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/profiles/:profile_id/distance",
            get(stored_distance_handler::<R, G>).post(calculate_handler::<R, G>),
        )
        .route("/api/v1/distances", get(within_handler::<R, G>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct WithinQuery {
    pub(crate) max_km: f64,
}

pub(crate) async fn calculate_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(profile_id): Path<u64>,
) -> Response
where
    R: DonationRepository + DistanceRepository + 'static,
    G: DistanceGateway + 'static,
{
    match service.calculate(ProfileId(profile_id)).await {
        Ok(distance) => (StatusCode::OK, axum::Json(distance)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stored_distance_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(profile_id): Path<u64>,
) -> Response
where
    R: DonationRepository + DistanceRepository + 'static,
    G: DistanceGateway + 'static,
{
    match service.stored(ProfileId(profile_id)) {
        Ok(Some(distance)) => (StatusCode::OK, axum::Json(distance)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": format!("no distance calculated for profile {profile_id}"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn within_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Query(query): Query<WithinQuery>,
) -> Response
where
    R: DonationRepository + DistanceRepository + 'static,
    G: DistanceGateway + 'static,
{
    match service.profiles_within(query.max_km) {
        Ok(distances) => (StatusCode::OK, axum::Json(distances)).into_response(),
        Err(error) => error_response(error),
    }
}
