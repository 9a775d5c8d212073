use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::routes::SharedMediaService;
use crate::services::media::{Media, MediaError, UploadedFile, UploadedMedia};

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteMediaResponse {
    pub message: String,
    pub id: i64,
}

#[utoipa::path(
    post,
    path = "/media",
    tag = "Media",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Media uploaded successfully", body = UploadedMedia),
        (status = 400, description = "Bad Request"),
        (status = 422, description = "File is not a decodable image"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn upload_media(
    State(media): State<SharedMediaService>,
    mut multipart: Multipart,
) -> Result<Json<UploadedMedia>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Error reading file: {}", e)))?;

        let uploaded = media
            .upload(UploadedFile {
                filename,
                content_type,
                data,
            })
            .await?;

        info!(id = uploaded.id, filename = %uploaded.filename, "POST /media | res=200");
        return Ok(Json(uploaded));
    }

    Err(MediaError::BadInput("Invalid file uploaded: no file field found".to_string()).into())
}

#[utoipa::path(
    get,
    path = "/media",
    tag = "Media",
    responses(
        (status = 200, description = "All media for the configured provider", body = Vec<Media>),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn list_media(State(media): State<SharedMediaService>) -> Result<Json<Vec<Media>>, AppError> {
    Ok(Json(media.list_all().await?))
}

#[utoipa::path(
    get,
    path = "/media/{id}",
    tag = "Media",
    params(
        ("id" = i64, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media details", body = Media),
        (status = 400, description = "Invalid ID"),
        (status = 404, description = "Media not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn get_media(
    State(media): State<SharedMediaService>,
    Path(id): Path<i64>,
) -> Result<Json<Media>, AppError> {
    Ok(Json(media.get_one(id).await?))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    tag = "Media",
    params(
        ("id" = i64, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media deleted", body = DeleteMediaResponse),
        (status = 400, description = "Invalid ID"),
        (status = 404, description = "Media not found"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn delete_media(
    State(media): State<SharedMediaService>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteMediaResponse>, AppError> {
    media.delete(id).await?;

    info!(id, "DELETE /media | res=200");
    Ok(Json(DeleteMediaResponse {
        message: "Media deleted successfully".to_string(),
        id,
    }))
}
