use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

use greenlight::certification::{
    certification_router, Actor, CatalogOverrides, CertificationService, CertificationState,
    CompanyRef, CompanyType, EvaluationSources, MemoryBackend, ProgramConfig, ProgramRef,
    ProjectProgram, ProjectProgramId, ProjectRef, UnansweredQuestion,
};
use greenlight::config::AppConfig;
use greenlight::error::AppError;
use greenlight::telemetry;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Greenlight Certification Engine",
    about = "Run the certification eligibility service or walk a pairing through its lifecycle",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a seeded pairing from registration through certification and back
    Demo,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo => run_demo(),
    }
}

fn build_service() -> (Arc<MemoryBackend>, Arc<CertificationService<MemoryBackend>>) {
    let backend = Arc::new(MemoryBackend::new());
    let sources = EvaluationSources {
        checklist: backend.clone(),
        relationships: backend.clone(),
        annotations: backend.clone(),
        simulation: backend.clone(),
        sampling: backend.clone(),
        qa: backend.clone(),
    };
    let service = Arc::new(CertificationService::new(
        backend.clone(),
        sources,
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        CatalogOverrides::new(),
    ));
    (backend, service)
}

fn demo_program() -> ProgramRef {
    ProgramRef {
        slug: "demo-efficiency-2026".to_string(),
        name: "Demo Efficiency Program 2026".to_string(),
        owner: CompanyRef {
            id: "owner-1".to_string(),
            name: "Demo Program Sponsor".to_string(),
            company_type: CompanyType::General,
        },
        config: ProgramConfig::default(),
    }
}

fn seed_pairing(
    service: &CertificationService<MemoryBackend>,
    backend: &MemoryBackend,
    answered: bool,
) -> Result<ProjectProgramId, AppError> {
    let id = ProjectProgramId("demo-pairing-1".to_string());
    let rater = CompanyRef {
        id: "rater-1".to_string(),
        name: "Demo Rating Co".to_string(),
        company_type: CompanyType::Rater,
    };
    let entity = ProjectProgram::new(
        id.clone(),
        ProjectRef {
            id: "project-1".to_string(),
            address: "123 Main St".to_string(),
        },
        demo_program(),
        rater,
    );
    service.register(entity)?;

    if answered {
        backend.set_checklist(&id, Vec::new(), 12);
    } else {
        backend.set_checklist(
            &id,
            vec![UnansweredQuestion {
                measure: "blower-door-test".to_string(),
                is_optional: false,
            }],
            11,
        );
    }

    Ok(id)
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let (backend, service) = build_service();
    seed_pairing(&service, &backend, true)?;

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(certification_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "certification engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_demo() -> Result<(), AppError> {
    let (backend, service) = build_service();
    let id = seed_pairing(&service, &backend, false)?;

    let superuser = Actor {
        user_id: "demo-admin".to_string(),
        company: demo_program().owner,
        capabilities: BTreeSet::new(),
        is_superuser: true,
    };

    println!("Certification lifecycle demo");

    let report = service.evaluate(&id, false)?;
    println!("\nInitial evaluation (one required question unanswered)");
    println!(
        "- eligible: {}, completion: {:.0}%",
        report.eligible, report.completion_percent
    );
    for failure in report.failing_messages() {
        println!("- blocked: {failure}");
    }

    backend.set_checklist(&id, Vec::new(), 12);
    println!("\nAll questions answered; advancing the lifecycle");
    for target in [
        CertificationState::Inspection,
        CertificationState::QaPending,
        CertificationState::CertificationPending,
        CertificationState::Complete,
    ] {
        service.attempt_transition(&id, target, &superuser)?;
        let entity = service.get(&id)?;
        println!("- state: {} ({:?})", entity.state, entity.state);
    }

    let entity = service.get(&id)?;
    println!(
        "\nCertified on {}",
        entity
            .certification_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    );

    let report = service.decertify(&id, &superuser, false, false)?;
    println!("\nDecertification unwind");
    for step in &report.undone {
        println!("- {step}");
    }
    let entity = service.get(&id)?;
    println!("- state after unwind: {}", entity.state);

    println!("\nSide effects dispatched: {}", backend.effects().len());
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
