use crate::cli::ServeArgs;
use crate::infra::{seed_catalog, AppState};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use matricula::config::AppConfig;
use matricula::error::AppError;
use matricula::telemetry;
use matricula::workflows::enrollment::{EnrollmentService, GroupCapacityPolicy, MemoryPortal};
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

    let store = Arc::new(MemoryPortal::default());
    let catalog = seed_catalog(&store);
    info!(
        cycle = %catalog.cycle.name,
        schools = catalog.schools.len(),
        document_types = catalog.document_types.len(),
        "catalog seeded"
    );

    let capacity_policy = GroupCapacityPolicy::from(&config.portal);
    let enrollment_service = Arc::new(EnrollmentService::new(store, capacity_policy));

    let app = with_portal_routes(enrollment_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enrollment portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
