use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{company, entry, image, maintenance, storage};
use crate::state::AppState;

pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(entry_routes())
        .merge(image_routes())
        .routes(routes!(company::get_company, company::save_company))
        .routes(routes!(maintenance::cleanup_images))
        .routes(routes!(maintenance::data_summary))
        .routes(routes!(storage::storage_status))
}

fn entry_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            entry::create_entry,
            entry::list_entries,
            entry::update_entry,
            entry::delete_entry
        ))
        .routes(routes!(entry::stream_entries))
        .routes(routes!(entry::deliver_entry))
        .routes(routes!(entry::get_bill))
}

fn image_routes() -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(image::upload_image))
        .layer(image::image_upload_body_limit());

    OpenApiRouter::new()
        .routes(routes!(image::get_image, image::delete_image))
        .merge(upload)
}
