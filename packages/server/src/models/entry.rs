use common::billing::DeliveryRequest;
use common::entry::EntryPatch;
use serde::{Deserialize, Serialize};

/// Response to a successful create.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CreateEntryResponse {
    /// Backend-assigned id.
    #[schema(example = "665f1c2e9b1d4a0012345678")]
    pub id: String,
}

/// Body of `PUT /entries`.
///
/// Only the fields present are changed. `userId` locates the entry on
/// user-partitioned backends and is never written.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    pub id: Option<String>,
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub patch: EntryPatch,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeleteEntryQuery {
    /// Entry to delete.
    pub id: Option<String>,
    /// Owning user. Needed to locate entries on the browser-local backend.
    pub user_id: Option<String>,
}

/// Body of `POST /entries/{id}/deliver`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliverEntryRequest {
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub delivery: DeliveryRequest,
}
