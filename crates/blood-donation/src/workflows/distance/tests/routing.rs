use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::distance::{distance_router, DistanceError};

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn calculate_route_returns_distance() {
    let (service, store, _) = build_service(StubGateway::answering(vec![Ok(route(5_200))]));
    let profile = seed_profile(&store, "donor@example.com", "079200000001", true);
    let router = distance_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post(format!("/api/v1/profiles/{}/distance", profile.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["distance_meters"], 5_200);
}

#[tokio::test]
async fn provider_denial_maps_to_bad_gateway() {
    let (service, store, _) =
        build_service(StubGateway::answering(vec![Err(DistanceError::RequestDenied)]));
    let profile = seed_profile(&store, "donor@example.com", "079200000001", true);
    let router = distance_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post(format!("/api/v1/profiles/{}/distance", profile.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("request denied"));
}

#[tokio::test]
async fn stored_distance_is_not_found_before_calculation() {
    let (service, store, _) = build_service(StubGateway::default());
    let profile = seed_profile(&store, "donor@example.com", "079200000001", true);
    let router = distance_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/profiles/{}/distance", profile.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn distances_route_filters_by_radius() {
    let (service, store, _) = build_service(StubGateway::answering(vec![Ok(route(3_000))]));
    let profile = seed_profile(&store, "donor@example.com", "079200000001", true);
    let service = Arc::new(service);
    service.calculate(profile.id).await.expect("distance");
    let router = distance_router(Arc::clone(&service));

    let response = router
        .oneshot(
            Request::get("/api/v1/distances?max_km=2.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}
