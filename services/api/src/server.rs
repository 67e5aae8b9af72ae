use crate::cli::ServeArgs;
use crate::infra::{demo_snapshot, AppState};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use class_enrollment::config::AppConfig;
use class_enrollment::error::AppError;
use class_enrollment::telemetry;
use class_enrollment::workflows::enrollment::{
    outbox, AssignmentEngine, EnrollmentSnapshot, InMemoryEnrollmentRepository,
    LoggingDispatcher, RolePermissions,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let snapshot = if args.no_seed {
        EnrollmentSnapshot::default()
    } else {
        demo_snapshot(Utc::now().date_naive())
    };
    let repository = Arc::new(InMemoryEnrollmentRepository::with_snapshot(snapshot));
    let (publisher, worker) = outbox(Arc::new(LoggingDispatcher));
    worker.spawn();

    let engine = Arc::new(AssignmentEngine::new(
        repository,
        Arc::new(publisher),
        &config.enrollment,
    ));

    let app = with_enrollment_routes(engine, Arc::new(RolePermissions::standard()))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        weekend_club_window_days = config.enrollment.weekend_club_window_days,
        holiday_camp_window_days = config.enrollment.holiday_camp_window_days,
        seeded = !args.no_seed,
        "class enrollment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
