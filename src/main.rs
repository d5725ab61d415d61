use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use deposit_recon::config::AppConfig;
use deposit_recon::error::AppError;
use deposit_recon::telemetry;
use deposit_recon::workflows::deposits::feed::BankFeedImporter;
use deposit_recon::workflows::deposits::reconciliation::{
    reconciliation_router, DepositReconciliationService, LogNotifier, MatchPolicy,
    ReconciliationServiceError, RunSummary, SqliteLedger, VerificationResult, VerificationStatus,
};
use deposit_recon::workflows::deposits::roster::RegistrantRosterImporter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Deposit Reconciliation Service",
    about = "Match bank deposit feeds against event registrants awaiting payment",
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
    /// Reconcile a bank export against a registrant roster and print dispositions
    Reconcile(ReconcileArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Seed the ledger's registrant snapshot from a roster CSV before serving
    #[arg(long)]
    roster_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    /// Bank statement CSV export
    #[arg(long)]
    bank_csv: PathBuf,
    /// Registrant roster CSV export
    #[arg(long)]
    registrants_csv: PathBuf,
    /// Event session start (RFC 3339); bounds the match window when set
    #[arg(long, value_parser = parse_session_date)]
    session_date: Option<DateTime<Utc>>,
    /// Ledger database path; defaults to a private in-memory ledger
    #[arg(long)]
    ledger_db: Option<PathBuf>,
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
        Command::Reconcile(args) => run_reconcile(args),
    }
}

fn parse_session_date(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
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

    if let Some(parent) = config.reconciliation.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let ledger = SqliteLedger::open(&config.reconciliation.db_path)
        .map_err(ReconciliationServiceError::from)?;

    if let Some(roster_path) = args.roster_csv.take() {
        let roster = RegistrantRosterImporter::from_path(roster_path)?;
        ledger
            .seed_registrants(&roster)
            .map_err(ReconciliationServiceError::from)?;
        info!(registrants = roster.len(), "ledger seeded from roster export");
    }

    let service = Arc::new(DepositReconciliationService::new(
        Arc::new(ledger),
        Arc::new(LogNotifier),
        config.reconciliation.policy(),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(reconciliation_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "deposit reconciliation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let ReconcileArgs {
        bank_csv,
        registrants_csv,
        session_date,
        ledger_db,
    } = args;

    let transactions = BankFeedImporter::from_path(bank_csv)?;
    let roster = RegistrantRosterImporter::from_path(registrants_csv)?;

    let ledger = match ledger_db {
        Some(path) => SqliteLedger::open(path),
        None => SqliteLedger::open_in_memory(),
    }
    .map_err(ReconciliationServiceError::from)?;
    ledger
        .seed_registrants(&roster)
        .map_err(ReconciliationServiceError::from)?;

    let service = DepositReconciliationService::new(
        Arc::new(ledger),
        Arc::new(LogNotifier),
        MatchPolicy::default(),
    );

    let results = service.run_batch(&transactions, session_date)?;
    render_reconciliation(&results);

    Ok(())
}

fn render_reconciliation(results: &[VerificationResult]) {
    let summary = RunSummary::tally(results);
    println!("Deposit reconciliation run");
    println!(
        "{} bank lines: {} matched, {} ambiguous, {} unmatched, {} already processed",
        results.len(),
        summary.matched,
        summary.ambiguous,
        summary.no_match,
        summary.already_processed
    );

    for result in results {
        let tx = &result.transaction;
        match result.status {
            VerificationStatus::Matched => {
                let candidate = result
                    .matched_registrants
                    .first()
                    .map(|c| format!("{} ({})", c.id, c.name))
                    .unwrap_or_default();
                println!(
                    "- [matched] {} {} '{}' -> {}",
                    tx.composite_key, tx.amount, tx.remark, candidate
                );
            }
            VerificationStatus::Ambiguous => {
                let names: Vec<String> = result
                    .matched_registrants
                    .iter()
                    .map(|c| c.id.to_string())
                    .collect();
                println!(
                    "- [ambiguous] {} {} '{}' candidates: {}",
                    tx.composite_key,
                    tx.amount,
                    tx.remark,
                    names.join(", ")
                );
            }
            VerificationStatus::NoMatch => {
                println!(
                    "- [no match] {} {} '{}' ({})",
                    tx.composite_key, tx.amount, tx.remark, result.message
                );
            }
            VerificationStatus::AlreadyProcessed => {
                println!("- [already processed] {}", tx.composite_key);
            }
        }
    }
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
