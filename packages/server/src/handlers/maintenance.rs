use axum::Json;
use axum::extract::State;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::maintenance::{DataSummary, MaintenanceService, SweepReport};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/maintenance/image-cleanup",
    tag = "Maintenance",
    operation_id = "cleanupImageReferences",
    summary = "Clear dangling image references",
    description = "Scans entries on every reachable storage tier and clears `imageUrl` where it is \
        malformed or points at an image that no longer exists. No entry or image is deleted.",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 503, description = "No storage tier reachable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn cleanup_images(State(state): State<AppState>) -> Result<Json<SweepReport>, AppError> {
    let report = MaintenanceService::new(&state.records, &*state.images)
        .sweep()
        .await?;
    info!(
        cleaned = report.cleaned_count,
        checked = report.total_entries_checked,
        "Image reference sweep finished"
    );
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/maintenance/summary",
    tag = "Maintenance",
    operation_id = "getDataSummary",
    summary = "Entry and image statistics",
    responses(
        (status = 200, description = "Summary", body = DataSummary),
        (status = 503, description = "No storage tier reachable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn data_summary(State(state): State<AppState>) -> Result<Json<DataSummary>, AppError> {
    let summary = MaintenanceService::new(&state.records, &*state.images)
        .summary()
        .await?;
    Ok(Json(summary))
}
