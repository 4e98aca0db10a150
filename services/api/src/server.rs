use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotificationSender};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use blood_donation::clock::{Clock, SystemClock};
use blood_donation::config::{AppConfig, ScheduleConfig};
use blood_donation::error::AppError;
use blood_donation::telemetry;
use blood_donation::workflows::distance::{distance_router, DistanceService, GoogleMapsDistanceClient};
use blood_donation::workflows::donation::{
    donation_router, DonationRepository, DonationService, InMemoryDonationStore, NotificationSender,
};
use blood_donation::workflows::verification::{
    verification_router, InMemoryVerificationStore, VerificationApi, VerificationCodeStore,
    VerificationCodes,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryDonationStore::new());
    let notifier = Arc::new(LoggingNotificationSender);

    let donations = Arc::new(DonationService::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        Arc::clone(&clock),
    ));

    let maps_client = GoogleMapsDistanceClient::new(config.maps.api_key.clone())?;
    if !maps_client.is_configured() {
        warn!("GOOGLE_MAPS_API_KEY not set, distance lookups will fail");
    }
    let distances = Arc::new(DistanceService::new(
        Arc::clone(&store),
        Arc::new(maps_client),
        config.maps.facility.clone(),
        Arc::clone(&clock),
    ));

    let verification = Arc::new(VerificationApi {
        codes: VerificationCodes::new(
            Arc::new(InMemoryVerificationStore::new()),
            Arc::clone(&notifier),
            config.schedule.verification_code_ttl(),
        ),
        clock: Arc::clone(&clock),
    });

    spawn_background_jobs(&config.schedule, Arc::clone(&donations), Arc::clone(&verification));

    let app = with_operational_routes(vec![
        donation_router(donations),
        distance_router(distances),
        verification_router(verification),
    ])
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "blood donation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodic eligibility reminders and verification code cleanup.
fn spawn_background_jobs<R, N, S>(
    schedule: &ScheduleConfig,
    donations: Arc<DonationService<R, N>>,
    verification: Arc<VerificationApi<S, N>>,
) where
    R: DonationRepository + 'static,
    N: NotificationSender + 'static,
    S: VerificationCodeStore + 'static,
{
    let mut eligibility_tick = tokio::time::interval(schedule.eligibility_scan_interval);
    tokio::spawn(async move {
        loop {
            eligibility_tick.tick().await;
            if let Err(error) = donations.notify_eligible_donors() {
                warn!(%error, "eligibility scan failed");
            }
        }
    });

    let mut sweep_tick = tokio::time::interval(schedule.verification_sweep_interval);
    tokio::spawn(async move {
        loop {
            sweep_tick.tick().await;
            if let Err(error) = verification.codes.sweep(verification.clock.now()) {
                warn!(%error, "verification code sweep failed");
            }
        }
    });
}
