use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use loan_ai::config::AppConfig;
use loan_ai::error::AppError;
use loan_ai::telemetry;
use loan_ai::workflows::loan::{
    ApplicantId, ApplicationId, ApplicationInput, InMemoryRepository, LoanIntakeImporter,
    LoanPipeline, PipelineStage, ProcessingRecord, ProcessingRepository, ProcessingState,
    ProcessingStatusView, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
    pipeline: Arc<LoanPipeline>,
    repository: Arc<InMemoryRepository>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Loan Processing Orchestrator",
    about = "Run the staged loan application scoring pipeline as a service or from the command line",
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
    /// Process a single application from a JSON file and print the outcome
    Process(ProcessArgs),
    /// Process a CSV export of applications and print one summary per row
    Batch(BatchArgs),
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

#[derive(Args, Debug)]
struct ProcessArgs {
    /// JSON file holding {"applicant_id": ..., "application": {...}}
    #[arg(long)]
    input: PathBuf,
    /// Explicit application id (defaults to a generated sequence id)
    #[arg(long)]
    application_id: Option<String>,
    /// Emit the full finalized state as JSON instead of a text report
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// CSV export with one application per row
    #[arg(long)]
    csv: PathBuf,
}

/// On-disk shape consumed by the `process` command.
#[derive(Debug, Deserialize)]
struct ApplicationFile {
    applicant_id: String,
    #[serde(default)]
    application_id: Option<String>,
    application: ApplicationInput,
}

#[derive(Debug, Deserialize)]
struct LoanSubmissionRequest {
    applicant_id: String,
    #[serde(default)]
    application_id: Option<String>,
    application: ApplicationInput,
}

#[derive(Debug, Serialize)]
struct StageSummary {
    stage: &'static str,
    status: &'static str,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct LoanDecisionResponse {
    application_id: ApplicationId,
    applicant_id: String,
    workflow_status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_decision: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calculated_credit_score: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credit_tier: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_level: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approved_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interest_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reasons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dti_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_status: Option<&'static str>,
    total_processing_time_secs: Option<f64>,
    stages: Vec<StageSummary>,
    errors: Vec<String>,
}

impl LoanDecisionResponse {
    fn from_state(state: &ProcessingState) -> Self {
        let decision = state.decision_outcome();
        let message = match decision {
            Some(outcome) => outcome.decision_rationale.clone(),
            None => state
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "processing produced no decision".to_string()),
        };

        let stages = PipelineStage::ordered()
            .iter()
            .filter_map(|stage| state.stage_result(*stage))
            .map(|result| StageSummary {
                stage: result.stage.label(),
                status: result.status.label(),
                elapsed_ms: result.elapsed.as_millis(),
            })
            .collect();

        Self {
            application_id: state.application_id.clone(),
            applicant_id: state.applicant_id.0.clone(),
            workflow_status: state.workflow_status.label(),
            message,
            final_decision: state.final_decision.map(|decision| decision.label()),
            calculated_credit_score: state.calculated_credit_score,
            credit_tier: state
                .credit_assessment()
                .map(|assessment| assessment.credit_tier.label()),
            risk_level: state.risk_level.map(|level| level.label()),
            approved_amount: state.approved_amount,
            interest_rate: state.interest_rate,
            rejection_reasons: state.rejection_reasons.clone(),
            conditions: decision.and_then(|outcome| outcome.conditions.clone()),
            dti_ratio: decision.map(|outcome| outcome.dti_ratio),
            verification_status: state
                .verification_report()
                .map(|report| report.verification_status.label()),
            total_processing_time_secs: state
                .total_processing_time
                .map(|duration| duration.as_secs_f64()),
            stages,
            errors: state.errors.clone(),
        }
    }
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("loan-{id:06}"))
}

/// Field constraints the validation layer owns; the pipeline itself assumes
/// they already hold.
fn check_constraints(input: &ApplicationInput) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&input.credit_utilization_percent) {
        return Err(AppError::InvalidInput(
            "credit_utilization_percent must be within [0, 100]".to_string(),
        ));
    }
    if input.loan_tenure_months < 1 {
        return Err(AppError::InvalidInput(
            "loan_tenure_months must be at least 1".to_string(),
        ));
    }
    if input.monthly_income < 0.0 || input.loan_amount_requested < 0.0 {
        return Err(AppError::InvalidInput(
            "monetary amounts must not be negative".to_string(),
        ));
    }
    Ok(())
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
        Command::Process(args) => run_process(args).await,
        Command::Batch(args) => run_batch(args).await,
    }
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
        pipeline: Arc::new(LoanPipeline::new(config.pipeline.clone())),
        repository: Arc::new(InMemoryRepository::new()),
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/loans", post(submit_loan_endpoint))
        .route("/api/v1/loans/:id", get(loan_status_endpoint))
        .layer(prometheus_layer)
        .with_state(state);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan processing orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_process(args: ProcessArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.input)?;
    let file: ApplicationFile = serde_json::from_str(&raw).map_err(|err| {
        AppError::InvalidInput(format!("could not parse {:?}: {err}", args.input))
    })?;
    check_constraints(&file.application)?;

    let config = AppConfig::load()?;
    let pipeline = LoanPipeline::new(config.pipeline);

    let application_id = args
        .application_id
        .or(file.application_id)
        .map(ApplicationId)
        .unwrap_or_else(next_application_id);

    let state = pipeline
        .process(
            application_id,
            ApplicantId(file.applicant_id),
            file.application,
        )
        .await;

    if args.json {
        let rendered = serde_json::to_string_pretty(&state).map_err(|err| {
            AppError::InvalidInput(format!("could not serialize state: {err}"))
        })?;
        println!("{rendered}");
    } else {
        render_decision_report(&state);
    }

    Ok(())
}

async fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let records = LoanIntakeImporter::from_path(&args.csv)?;
    let config = AppConfig::load()?;
    let pipeline = LoanPipeline::new(config.pipeline);

    println!(
        "Processing {} application(s) from {}",
        records.len(),
        args.csv.display()
    );

    let mut completed = 0usize;
    let mut failed = 0usize;
    for record in records {
        let state = pipeline
            .process(next_application_id(), record.applicant_id, record.input)
            .await;

        let decision = state
            .final_decision
            .map(|decision| decision.label())
            .unwrap_or("no decision");
        let score = state
            .calculated_credit_score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "-".to_string());
        let risk = state.risk_level.map(|level| level.label()).unwrap_or("-");
        println!(
            "- {} {} | {} | score {} | risk {} | {}",
            state.applicant_id,
            state.application_id,
            decision,
            score,
            risk,
            state.workflow_status.label()
        );

        if state.errors.is_empty() {
            completed += 1;
        } else {
            failed += 1;
        }
    }

    println!("Done: {completed} completed, {failed} failed");
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

async fn submit_loan_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<LoanSubmissionRequest>,
) -> Result<Json<LoanDecisionResponse>, AppError> {
    check_constraints(&payload.application)?;

    let application_id = payload
        .application_id
        .map(ApplicationId)
        .unwrap_or_else(next_application_id);

    let processed = state
        .pipeline
        .process(
            application_id,
            ApplicantId(payload.applicant_id),
            payload.application,
        )
        .await;

    let response = LoanDecisionResponse::from_state(&processed);
    state
        .repository
        .insert(ProcessingRecord { state: processed })?;

    Ok(Json(response))
}

async fn loan_status_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessingStatusView>, AppError> {
    let record = state
        .repository
        .fetch(&ApplicationId(id))?
        .ok_or(RepositoryError::NotFound)?;
    Ok(Json(record.status_view()))
}

fn render_decision_report(state: &ProcessingState) {
    println!("Loan processing report");
    println!(
        "Application {} (applicant {})",
        state.application_id, state.applicant_id
    );
    println!(
        "Workflow status: {}{}",
        state.workflow_status.label(),
        state
            .total_processing_time
            .map(|duration| format!(" in {:.3}s", duration.as_secs_f64()))
            .unwrap_or_default()
    );

    match state.credit_assessment() {
        Some(assessment) => {
            println!(
                "\nCredit score: {} ({})",
                assessment.calculated_credit_score,
                assessment.credit_tier.label()
            );
            for factor in &assessment.factors {
                println!("- {factor}");
            }
        }
        None => println!("\nCredit score: unavailable"),
    }

    match state.decision_outcome() {
        Some(outcome) => {
            println!("\nDecision: {}", outcome.final_decision.label());
            println!("- {}", outcome.decision_rationale);
            if let Some(rate) = outcome.interest_rate {
                println!(
                    "- Amount {:.0} at {:.2}% (DTI {:.1}%)",
                    outcome.approved_amount,
                    rate,
                    outcome.dti_ratio * 100.0
                );
            }
            if let Some(reasons) = &outcome.rejection_reasons {
                for reason in reasons {
                    println!("- Rejection reason: {reason}");
                }
            }
            if let Some(conditions) = &outcome.conditions {
                for condition in conditions {
                    println!("- Condition: {condition}");
                }
            }
        }
        None => println!("\nDecision: unavailable"),
    }

    match state.verification_report() {
        Some(report) => println!(
            "\nVerification: {} ({})",
            report.verification_status.label(),
            report.verification_notes
        ),
        None => println!("\nVerification: unavailable"),
    }

    match state.risk_assessment() {
        Some(assessment) => {
            println!(
                "\nRisk: {} (score {})",
                assessment.risk_level.label(),
                assessment.risk_score
            );
            for factor in &assessment.risk_factors {
                println!("- {factor}");
            }
            for action in &assessment.recommended_actions {
                println!("- Recommended: {action}");
            }
        }
        None => println!("\nRisk: unavailable"),
    }

    if state.errors.is_empty() {
        println!("\nErrors: none");
    } else {
        println!("\nErrors");
        for error in &state.errors {
            println!("- {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_ai::workflows::loan::PipelineRules;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn test_state() -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
            pipeline: Arc::new(LoanPipeline::new(PipelineRules::default())),
            repository: Arc::new(InMemoryRepository::new()),
        }
    }

    fn sample_request(application_id: &str) -> LoanSubmissionRequest {
        let payload = json!({
            "applicant_id": "APP001",
            "application_id": application_id,
            "application": {
                "full_name": "Asha Rao",
                "email": "asha.rao@example.com",
                "phone_number": "+91-98450-00123",
                "credit_history_length_months": 96,
                "number_of_credit_accounts": 6,
                "credit_utilization_percent": 15.0,
                "recent_credit_inquiries_6m": 1,
                "repayment_history": {
                    "on_time_payments": 90,
                    "late_payments": 1,
                    "defaults": 0,
                    "write_offs": 0
                },
                "employment_status": "Employed",
                "employment_duration_months": 60,
                "monthly_income": 9000.0,
                "income_verified": true,
                "loan_amount_requested": 40000.0,
                "loan_purpose": "home",
                "loan_tenure_months": 60
            }
        });
        serde_json::from_value(payload).expect("request deserializes")
    }

    #[tokio::test]
    async fn submit_endpoint_processes_and_stores_the_application() {
        let state = test_state();

        let Json(body) =
            submit_loan_endpoint(State(state.clone()), Json(sample_request("loan-test-01")))
                .await
                .expect("submission succeeds");

        assert_eq!(body.workflow_status, "completed");
        assert_eq!(body.final_decision, Some("approved"));
        assert_eq!(body.stages.len(), 4);
        assert!(body.errors.is_empty());

        let stored = state
            .repository
            .fetch(&ApplicationId("loan-test-01".to_string()))
            .expect("fetch succeeds")
            .expect("record stored");
        assert_eq!(stored.status_view().workflow_status, "completed");
    }

    #[tokio::test]
    async fn status_endpoint_reports_missing_applications() {
        let state = test_state();

        let result = loan_status_endpoint(State(state), Path("loan-unknown".to_string())).await;

        assert!(matches!(
            result,
            Err(AppError::Repository(RepositoryError::NotFound))
        ));
    }

    #[tokio::test]
    async fn health_route_responds_ok() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::util::ServiceExt;

        let app = Router::new()
            .route("/health", get(healthcheck))
            .with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_endpoint_rejects_constraint_violations() {
        let state = test_state();
        let mut request = sample_request("loan-test-02");
        request.application.credit_utilization_percent = 180.0;

        let result = submit_loan_endpoint(State(state), Json(request)).await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
