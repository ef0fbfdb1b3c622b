use axum::Json;
use axum::extract::{Query, State};
use common::entry::{CompanyDetails, CompanyDetailsInput};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::shared::UserQuery;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/company",
    tag = "Company",
    operation_id = "getCompanyDetails",
    summary = "Get the shop profile",
    params(UserQuery),
    responses(
        (status = 200, description = "Company profile", body = CompanyDetails),
        (status = 400, description = "Missing userId (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No profile saved yet (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_company(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CompanyDetails>, AppError> {
    let user_id = query.require()?;
    state
        .records
        .get_company(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Company details not found".into()))
}

#[utoipa::path(
    put,
    path = "/company",
    tag = "Company",
    operation_id = "saveCompanyDetails",
    summary = "Create or replace the shop profile",
    description = "Company name, address, first owner's name and phone, and vehicle type are \
        required. The second owner is optional. Saving again keeps the original `createdAt`.",
    request_body = CompanyDetailsInput,
    responses(
        (status = 200, description = "Saved profile", body = CompanyDetails),
        (status = 400, description = "Missing field (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, input), fields(user_id = %input.user_id))]
pub async fn save_company(
    State(state): State<AppState>,
    AppJson(input): AppJson<CompanyDetailsInput>,
) -> Result<Json<CompanyDetails>, AppError> {
    Ok(Json(state.records.save_company(input).await?))
}
