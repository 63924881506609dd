//! Workflow run and lifecycle endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tessera_pipeline::{Requester, WorkflowOrchestrator};
use tessera_types::{RunParameters, WorkflowDetail, WorkflowListItem};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request to run a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Workflow definition id.
    pub id: String,
    /// Dataset to read from.
    pub input_dir: String,
    /// Where results go.
    pub output_dir: String,
}

/// Response for a started run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub workflow_id: Uuid,
}

/// Response for a cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub message: String,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("invalid {what} id '{raw}'")))
}

/// Bind to `id` and require that the caller owns it. Unknown and foreign
/// workflows are indistinguishable to the caller.
fn owned_workflow(state: &AppState, id: Uuid, caller: &Caller) -> Result<WorkflowOrchestrator, ServerError> {
    let orchestrator = state.workflows.orchestrator(Some(id))?;
    if !orchestrator.exists()? || !orchestrator.is_owned_by(&caller.username)? {
        return Err(ServerError::NotFound(format!("Workflow '{id}' not found")));
    }
    Ok(orchestrator)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/run - Start a workflow run.
pub async fn run_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ServerError> {
    let definition_id = parse_id(&request.id, "definition")?;
    let definition = state.workflows.resolve_definition(definition_id)?;

    let authorized = match state
        .auth
        .is_authorized_for_workflow(&caller.token, &definition)
        .await
    {
        Ok(authorized) => authorized,
        Err(e) => {
            tracing::warn!(
                username = %caller.username,
                definition_id = %definition_id,
                error = %e,
                "Authorization check failed"
            );
            false
        }
    };
    if !authorized {
        return Err(ServerError::Forbidden(format!(
            "not authorized to run workflow definition '{definition_id}'"
        )));
    }

    let requester = Requester {
        username: caller.username.clone(),
        subject: caller.subject().to_string(),
        access_token: caller.token.value().to_string(),
    };
    let params = RunParameters::new(request.input_dir, request.output_dir);
    let workflow_id = state
        .workflows
        .orchestrator(None)?
        .run(definition_id, params, &requester)?;

    Ok(Json(RunResponse { workflow_id }))
}

/// GET /api/workflow - Workflows owned by the caller, newest first.
pub async fn list_workflows_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<WorkflowListItem>>, ServerError> {
    Ok(Json(state.workflows.list_for_owner(&caller.username)?))
}

/// GET /api/workflow/{id} - One workflow with live sub-job status.
pub async fn get_workflow_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDetail>, ServerError> {
    let id = parse_id(&id, "workflow")?;
    let orchestrator = owned_workflow(&state, id, &caller)?;
    Ok(Json(orchestrator.get_detail(caller.token.value()).await?))
}

/// DELETE /api/workflow/{id} - Cancel a workflow.
pub async fn cancel_workflow_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ServerError> {
    let id = parse_id(&id, "workflow")?;
    owned_workflow(&state, id, &caller)?.cancel()?;
    tracing::info!(workflow_id = %id, username = %caller.username, "Workflow cancel accepted");
    Ok(Json(CancelResponse {
        message: format!("Workflow {id} canceled"),
    }))
}
