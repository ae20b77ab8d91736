//! Read-only status endpoints: health, statistics, templates, recent logs.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use weaver_core::stats::Statistics;
use weaver_core::store::{Store, TaskLog};
use weaver_core::template::{Template, TemplateKind};

use crate::{error::ApiError, state::AppState};

/// Run a blocking store call on the blocking pool.
pub(crate) async fn with_store<T, F>(store: &Arc<Store>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> weaver_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| ApiError(anyhow::anyhow!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

/// GET /api/status/health — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "weaver",
        "timestamp": chrono::Utc::now(),
    }))
}

/// GET /api/status/stats — job counts by status, 24h activity, API call total.
pub async fn stats(State(app): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    let stats = with_store(&app.store, |s| weaver_core::stats::compute(s)).await?;
    Ok(Json(stats))
}

/// Template without its config payload, for list responses.
#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Template> for TemplateSummary {
    fn from(t: Template) -> Self {
        Self {
            id: t.id,
            name: t.name,
            kind: t.kind,
            description: t.description,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// GET /api/status/templates — template summaries, without config payloads.
pub async fn list_templates(
    State(app): State<AppState>,
) -> Result<Json<Vec<TemplateSummary>>, ApiError> {
    let templates = with_store(&app.store, |s| s.templates()).await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

/// GET /api/status/templates/{id} — full template, config included.
pub async fn get_template(
    Path(id): Path<u64>,
    State(app): State<AppState>,
) -> Result<Json<Template>, ApiError> {
    let template = with_store(&app.store, move |s| s.template(id)).await?;
    Ok(Json(template))
}

#[derive(Debug, Deserialize)]
pub struct RecentLogsQuery {
    pub limit: Option<usize>,
}

/// A task log with its owning job's name joined in.
#[derive(Debug, Serialize)]
pub struct RecentLog {
    #[serde(flatten)]
    pub log: TaskLog,
    pub job_name: String,
}

/// GET /api/status/logs/recent?limit=N — newest-first logs across all jobs.
pub async fn recent_logs(
    Query(query): Query<RecentLogsQuery>,
    State(app): State<AppState>,
) -> Result<Json<Vec<RecentLog>>, ApiError> {
    let limit = query.limit.unwrap_or(100);
    let logs = with_store(&app.store, move |s| {
        let logs = s.recent_logs(limit)?;
        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            let job_name = s.job(log.job_id).map(|j| j.name).unwrap_or_default();
            out.push((log, job_name));
        }
        Ok(out)
    })
    .await?;
    Ok(Json(
        logs.into_iter()
            .map(|(log, job_name)| RecentLog { log, job_name })
            .collect(),
    ))
}
