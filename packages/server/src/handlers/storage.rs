use axum::Json;
use axum::extract::State;

use crate::models::storage::StorageStatus;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/storage",
    tag = "Storage",
    operation_id = "getStorageStatus",
    summary = "Active record backend",
    responses(
        (status = 200, description = "Backend status", body = StorageStatus),
    ),
)]
pub async fn storage_status(State(state): State<AppState>) -> Json<StorageStatus> {
    let configured = state.config.storage.backend;
    let active = state.records.primary();
    Json(StorageStatus {
        configured,
        active,
        label: active.unwrap_or(configured).label().to_string(),
        tiers: state.records.backends(),
    })
}
