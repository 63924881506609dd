//! Workflow definition listing.

use axum::{Json, extract::State};
use tessera_types::DefinitionListItem;

use crate::error::ServerError;
use crate::state::AppState;

/// GET /api/workflow_definition - Every available definition with its source.
pub async fn list_definitions_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<DefinitionListItem>>, ServerError> {
    Ok(Json(state.workflows.list_definitions()?))
}
