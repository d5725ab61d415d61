use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{BankTransaction, VerificationResult, VerificationStatus};
use super::repository::{PaymentNotifier, ReconciliationRepository, RepositoryError, ReviewItem};
use super::service::{DepositReconciliationService, ReconciliationServiceError};

/// Router builder exposing the batch endpoint and the review queue.
pub fn reconciliation_router<R, N>(
    service: Arc<DepositReconciliationService<R, N>>,
) -> Router
where
    R: ReconciliationRepository + 'static,
    N: PaymentNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/deposits/reconciliation",
            post(run_handler::<R, N>),
        )
        .route(
            "/api/v1/deposits/reconciliation/review",
            get(review_handler::<R, N>),
        )
        .with_state(service)
}

/// Batch payload from the bank-feed poller or webhook relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    pub transactions: Vec<BankTransaction>,
    #[serde(default)]
    pub session_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub results: Vec<VerificationResult>,
    pub summary: RunSummary,
}

/// Disposition counts for one run, for audit logs and dashboards.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub matched: usize,
    pub ambiguous: usize,
    pub no_match: usize,
    pub already_processed: usize,
}

impl RunSummary {
    pub fn tally(results: &[VerificationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                VerificationStatus::Matched => summary.matched += 1,
                VerificationStatus::Ambiguous => summary.ambiguous += 1,
                VerificationStatus::NoMatch => summary.no_match += 1,
                VerificationStatus::AlreadyProcessed => summary.already_processed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    #[serde(default = "default_review_limit")]
    pub limit: usize,
}

fn default_review_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
struct ReviewResponse {
    items: Vec<ReviewItem>,
}

pub(crate) async fn run_handler<R, N>(
    State(service): State<Arc<DepositReconciliationService<R, N>>>,
    axum::Json(request): axum::Json<ReconciliationRequest>,
) -> Response
where
    R: ReconciliationRepository + 'static,
    N: PaymentNotifier + 'static,
{
    match service.run_batch(&request.transactions, request.session_date) {
        Ok(results) => {
            let summary = RunSummary::tally(&results);
            (
                StatusCode::OK,
                axum::Json(ReconciliationResponse { results, summary }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_handler<R, N>(
    State(service): State<Arc<DepositReconciliationService<R, N>>>,
    Query(params): Query<ReviewParams>,
) -> Response
where
    R: ReconciliationRepository + 'static,
    N: PaymentNotifier + 'static,
{
    match service.review_queue(params.limit) {
        Ok(items) => (StatusCode::OK, axum::Json(ReviewResponse { items })).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ReconciliationServiceError) -> Response {
    let status = match &err {
        ReconciliationServiceError::InvalidTransaction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ReconciliationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
