use serde::Serialize;

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    #[schema(example = "665f1c2e9b1d4a0012345678")]
    pub image_id: String,
    /// Reference to store on the entry.
    #[schema(example = "/images/665f1c2e9b1d4a0012345678")]
    pub image_url: String,
}
