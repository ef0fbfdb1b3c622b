use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use common::bill::BillDocument;
use common::entry::{NewRepairEntry, RepairEntry};
use common::image::parse_image_url;
use futures::Stream;
use tokio::sync::watch;
use tracing::{instrument, warn};

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::entry::{
    CreateEntryResponse, DeleteEntryQuery, DeliverEntryRequest, UpdateEntryRequest,
};
use crate::models::shared::{SuccessResponse, UserQuery, require_present};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/entries",
    tag = "Entries",
    operation_id = "createEntry",
    summary = "Register a repair entry",
    description = "Creates a pending entry with an empty parts list. `createdAt` is assigned by the \
        server. If the configured backend fails the entry is written to the next storage tier.",
    request_body = NewRepairEntry,
    responses(
        (status = 201, description = "Entry created", body = CreateEntryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "No storage tier accepted the write (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, input), fields(user_id = %input.user_id))]
pub async fn create_entry(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewRepairEntry>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.records.create(&input).await?;
    Ok((StatusCode::CREATED, Json(CreateEntryResponse { id })))
}

#[utoipa::path(
    get,
    path = "/entries",
    tag = "Entries",
    operation_id = "listEntries",
    summary = "List a user's entries",
    description = "Returns every entry owned by `userId`, newest first.",
    params(UserQuery),
    responses(
        (status = 200, description = "Entries", body = Vec<RepairEntry>),
        (status = 400, description = "Missing userId (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<RepairEntry>>, AppError> {
    let user_id = query.require()?;
    Ok(Json(state.records.list(user_id).await?))
}

#[utoipa::path(
    put,
    path = "/entries",
    tag = "Entries",
    operation_id = "updateEntry",
    summary = "Partially update an entry",
    description = "Changes only the supplied fields. `id`, `userId` and `createdAt` are never \
        written. A delivered entry cannot be moved back to pending.",
    request_body = UpdateEntryRequest,
    responses(
        (status = 200, description = "Entry updated", body = SuccessResponse),
        (status = 400, description = "Missing id or invalid field (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, request), fields(entry_id))]
pub async fn update_entry(
    State(state): State<AppState>,
    AppJson(request): AppJson<UpdateEntryRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = require_present(request.id.as_deref(), "Entry ID required")?;
    tracing::Span::current().record("entry_id", id);

    let user_hint = request.user_id.as_deref().filter(|u| !u.is_empty());
    state.records.update(id, &request.patch, user_hint).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/entries",
    tag = "Entries",
    operation_id = "deleteEntry",
    summary = "Delete an entry",
    description = "Idempotent. The entry's image, if any, is deleted afterwards in the background; \
        failure to delete the image does not fail the request.",
    params(DeleteEntryQuery),
    responses(
        (status = 200, description = "Entry deleted or already absent", body = SuccessResponse),
        (status = 400, description = "Missing id (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Storage unavailable (BACKEND_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    Query(query): Query<DeleteEntryQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = require_present(query.id.as_deref(), "Entry ID required")?;
    let user_hint = query.user_id.as_deref().filter(|u| !u.is_empty());

    let existing = match state.records.get(id, user_hint).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!(entry_id = id, error = %e, "Could not read entry before delete");
            None
        }
    };

    state.records.delete(id, user_hint).await?;

    let image = existing
        .as_ref()
        .and_then(|e| e.image_url.as_deref())
        .and_then(parse_image_url);
    if let Some(image_id) = image {
        let images = state.images.clone();
        let entry_id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = images.delete(&image_id).await {
                warn!(entry_id, image_id = %image_id, error = %e, "Failed to delete entry image");
            }
        });
    }

    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/entries/stream",
    tag = "Entries",
    operation_id = "streamEntries",
    summary = "Subscribe to a user's entries",
    description = "Server-sent events. An `entries` event carrying the full list is sent \
        immediately and again whenever the list may have changed. Backends without change \
        notification are polled, so the same list can arrive repeatedly.",
    params(UserQuery),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 400, description = "Missing userId (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn stream_entries(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let user_id = query.require()?;

    let (tx, rx) = watch::channel(None::<Vec<RepairEntry>>);
    let subscription = state.records.subscribe(user_id, move |entries| {
        tx.send_replace(Some(entries));
    });

    // The subscription rides along in the stream state and is dropped with it.
    let stream = futures::stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        rx.changed().await.ok()?;
        let entries = rx.borrow_and_update().clone().unwrap_or_default();
        let event = match Event::default().event("entries").json_data(&entries) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to encode entries event");
                Event::default().comment("encoding failed")
            }
        };
        Some((Ok(event), (rx, subscription)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    post,
    path = "/entries/{id}/deliver",
    tag = "Entries",
    operation_id = "deliverEntry",
    summary = "Mark an entry as delivered",
    description = "Records the delivery date and parts, computes `totalAmount` and \
        `finalAmount = totalAmount - advancecash`, and flips the status to delivered. \
        Every part needs a description and a price above zero. Nothing is written if \
        validation fails.",
    params(("id" = String, Path, description = "Entry ID")),
    request_body = DeliverEntryRequest,
    responses(
        (status = 200, description = "Delivered entry", body = RepairEntry),
        (status = 400, description = "Invalid delivery or already delivered (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, request), fields(entry_id = %id))]
pub async fn deliver_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<DeliverEntryRequest>,
) -> Result<Json<RepairEntry>, AppError> {
    let user_hint = request.user_id.as_deref().filter(|u| !u.is_empty());
    let entry = state
        .records
        .deliver(&id, user_hint, &request.delivery)
        .await?;
    Ok(Json(entry))
}

#[utoipa::path(
    get,
    path = "/entries/{id}/bill",
    tag = "Entries",
    operation_id = "getEntryBill",
    summary = "Bill for a delivered entry",
    description = "Returns the bill layout: company header, customer and vehicle blocks, part rows \
        split into pages (5 on the first page, 20 on each following page) and the amount summary.",
    params(
        ("id" = String, Path, description = "Entry ID"),
        UserQuery,
    ),
    responses(
        (status = 200, description = "Bill document", body = BillDocument),
        (status = 400, description = "Entry is still pending (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Entry or company profile not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(entry_id = %id))]
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<BillDocument>, AppError> {
    let entry = state
        .records
        .get(&id, query.hint())
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;
    let company = state
        .records
        .get_company(&entry.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company details not found".into()))?;

    Ok(Json(BillDocument::build(&entry, &company)?))
}
