mod home;
mod media;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::media::MediaService;

pub type SharedMediaService = Arc<MediaService>;

// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        media::upload_media,
        media::list_media,
        media::get_media,
        media::delete_media,
    ),
    components(
        schemas(
            crate::services::media::UploadedMedia,
            crate::services::media::Media,
            media::DeleteMediaResponse,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Media", description = "Upload, list, fetch and delete images and their thumbnails")
    ),
    info(
        title = "Media Ingest API",
        version = "0.1.0",
        description = "Image upload service that stores originals with generated thumbnails",
    )
)]
struct ApiDoc;

#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub max_upload_bytes: usize,
    /// Local upload directory and the URI prefix it is served under.
    pub static_files: Option<(String, PathBuf)>,
}

pub fn create_routes(service: SharedMediaService, options: RouterOptions) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let app_routes = Router::new()
        .route("/", get(home::root))
        .route("/media", get(media::list_media).post(media::upload_media))
        .route("/media/{id}", get(media::get_media).delete(media::delete_media))
        .layer(DefaultBodyLimit::max(
            options.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(service);

    let mut router = Router::new().merge(swagger_router).merge(app_routes);

    if let Some((uri, path)) = options.static_files {
        if uri.starts_with('/') && uri.len() > 1 {
            router = router.nest_service(&uri, ServeDir::new(path));
        }
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
