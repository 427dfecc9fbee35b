use crate::cli::ServeArgs;
use crate::infra::{default_stages, AppState, InMemoryStore, NeutralEvaluator, StockQuestions};
use crate::routes::with_screening_routes;
use applicant_eval::config::AppConfig;
use applicant_eval::error::AppError;
use applicant_eval::telemetry;
use applicant_eval::workflows::screening::{DirectoryCatalog, ScreeningService};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    let store = Arc::new(InMemoryStore::with_stages(default_stages()));
    let catalog = Arc::new(DirectoryCatalog::new(config.storage.criteria_dir.clone()));
    let criteria_dir = catalog.root().display().to_string();
    let screening_service = Arc::new(ScreeningService::new(
        store,
        catalog,
        Arc::new(NeutralEvaluator),
        Arc::new(StockQuestions),
        config.scoring.clone(),
    ));

    let app = with_screening_routes(screening_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        %criteria_dir,
        "applicant evaluation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
