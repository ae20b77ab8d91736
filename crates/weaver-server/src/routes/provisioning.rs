//! Job lifecycle endpoints: create, list, inspect, cancel, delete, and
//! standalone config validation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use weaver_core::config::FabricConfig;
use weaver_core::job::JobSummary;
use weaver_core::store::TaskLog;
use weaver_core::validate::{validate_with, ValidationResult};

use crate::{
    engine::SubmitError,
    error::ApiError,
    routes::status::with_store,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub template_id: Option<u64>,
    pub fabric_config: FabricConfig,
}

/// POST /api/provisioning/jobs — validate, persist, and start a job.
///
/// Returns 201 with the pending job (credentials masked). A configuration
/// that fails validation gets 422 with the full error and warning lists so
/// the caller can fix everything in one pass.
pub async fn create_job(
    State(app): State<AppState>,
    Json(body): Json<CreateJobRequest>,
) -> Result<Response, ApiError> {
    match app
        .engine
        .submit(&body.name, body.template_id, body.fabric_config)
        .await
    {
        Ok(job) => {
            info!(job_id = job.id, name = %job.name, "job created");
            Ok((StatusCode::CREATED, Json(job.redacted())).into_response())
        }
        Err(SubmitError::Invalid(result)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "configuration validation failed",
                "errors": result.errors,
                "warnings": result.warnings,
            })),
        )
            .into_response()),
        Err(SubmitError::Store(e)) => Err(ApiError::from(e)),
    }
}

/// GET /api/provisioning/jobs — summaries, most recent first.
pub async fn list_jobs(State(app): State<AppState>) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let jobs = with_store(&app.store, |s| s.jobs(None)).await?;
    let mut summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
    summaries.reverse();
    Ok(Json(summaries))
}

/// GET /api/provisioning/jobs/{id} — full job with its config snapshot.
pub async fn get_job(
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> Result<Json<weaver_core::job::ProvisioningJob>, ApiError> {
    let job = with_store(&app.store, move |s| s.job(id)).await?;
    Ok(Json(job.redacted()))
}

/// DELETE /api/provisioning/jobs/{id} — remove a job and its logs.
///
/// Refused with 409 while the job is running.
pub async fn delete_job(
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_store(&app.store, move |s| s.delete_job(id)).await?;
    info!(job_id = id, "job deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// GET /api/provisioning/jobs/{id}/logs — chronological task logs.
pub async fn job_logs(
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> Result<Json<Vec<TaskLog>>, ApiError> {
    let logs = with_store(&app.store, move |s| s.job_logs(id)).await?;
    Ok(Json(logs))
}

/// POST /api/provisioning/jobs/{id}/cancel — request cooperative cancellation.
///
/// 409 when the job has no active engine task (already terminal, or unknown
/// to this server instance).
pub async fn cancel_job(
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if app.engine.cancel(id).await {
        Ok(Json(serde_json::json!({
            "status": "cancelling",
            "message": format!("Cancellation requested for job {id}"),
        })))
    } else {
        Err(ApiError::conflict(format!("Job {id} is not active")))
    }
}

/// POST /api/provisioning/validate-config — validate without creating a job.
pub async fn validate_config(
    State(app): State<AppState>,
    Json(config): Json<FabricConfig>,
) -> Json<ValidationResult> {
    Json(validate_with(&config, &app.ruleset))
}
