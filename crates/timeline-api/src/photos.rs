use axum::{
    Extension, Json,
    extract::{FromRequest, Multipart, Path, Request, State, rejection::PathRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use timeline_db::{NewPhoto, PhotoRow};
use timeline_types::api::{Claims, CreatePhotoRequest};
use timeline_types::models::Photo;

use crate::error::ApiError;
use crate::state::{AppState, with_db};
use crate::uploads::{ImageKind, MAX_FILE_SIZE};

/// Request body ceiling for `/photos`: one maximal image plus form overhead.
pub const MAX_BODY_SIZE: usize = MAX_FILE_SIZE + 64 * 1024;

const MAX_DESCRIPTION_CHARS: usize = 1000;

/// GET /photos — the whole feed, oldest first.
pub async fn list_photos(State(state): State<AppState>) -> Result<Json<Vec<Photo>>, ApiError> {
    let rows = with_db(&state, |db| db.list_photos()).await?;
    Ok(Json(rows.into_iter().map(photo_response).collect()))
}

/// POST /photos — accepts `application/json` (image already hosted at a URL)
/// or `multipart/form-data` (image bytes in the `photo` field).
pub async fn create_photo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Request,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let new_photo = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(req, &state).await?;
        let upload = read_upload(multipart).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), upload.kind.extension());
        state
            .uploads
            .save(&filename, &upload.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("writing upload {}: {}", filename, e)))?;

        NewPhoto {
            image_url: format!("/uploads/{}", filename),
            filename: Some(filename),
            description: upload.description,
            taken_at: upload.taken_at.map(|t| t.to_rfc3339()),
        }
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<CreatePhotoRequest>::from_request(req, &state).await?;
        photo_from_json(body)?
    } else {
        return Err(ApiError::Validation(
            "Expected multipart/form-data or application/json".into(),
        ));
    };

    let owner = claims.sub;
    let stored_file = new_photo.filename.clone();
    let created = match with_db(&state, move |db| db.create_photo(owner, &new_photo)).await {
        Ok(row) => row,
        Err(e) => {
            if let Some(filename) = stored_file {
                if let Err(err) = state.uploads.delete(&filename).await {
                    warn!("Failed to remove orphaned upload {}: {}", filename, err);
                }
            }
            return Err(e);
        }
    };

    info!(
        "Photo {} created by {} ({})",
        created.id, claims.username, created.image_url
    );

    Ok((StatusCode::CREATED, Json(photo_response(created))))
}

/// DELETE /photos/{id} — owner only.
pub async fn delete_photo(
    State(state): State<AppState>,
    photo_id: Result<Path<i64>, PathRejection>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let Path(photo_id) = photo_id?;
    let requester = claims.sub;
    let removed = with_db(&state, move |db| db.delete_photo(photo_id, requester))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound(
                "Photo not found or you do not have permission to delete it".into(),
            ),
            e => e,
        })?;

    if let Some(filename) = &removed.filename {
        if let Err(e) = state.uploads.delete(filename).await {
            warn!("Failed to remove upload {} for photo {}: {}", filename, photo_id, e);
        }
    }

    info!("Photo {} deleted by {}", photo_id, claims.username);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /photos/{id}/like — any authenticated user, any photo.
pub async fn like_photo(
    State(state): State<AppState>,
    photo_id: Result<Path<i64>, PathRejection>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Photo>, ApiError> {
    let Path(photo_id) = photo_id?;
    let row = with_db(&state, move |db| db.like_photo(photo_id)).await?;
    Ok(Json(photo_response(row)))
}

// ── Validation ──────────────────────────────────────────────────────────

/// A fully validated multipart upload, not yet written anywhere.
#[derive(Debug)]
struct Upload {
    kind: ImageKind,
    bytes: Vec<u8>,
    description: String,
    taken_at: Option<DateTime<Utc>>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut description = None;
    let mut taken_at = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("photo") => {
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                file = Some((content_type, bytes.to_vec()));
            }
            Some("description") => description = Some(field.text().await?),
            Some("takenAt") => taken_at = Some(field.text().await?),
            _ => {}
        }
    }

    let (content_type, bytes) =
        file.ok_or_else(|| ApiError::Validation("No photo uploaded".into()))?;

    if bytes.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".into()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::Validation("File too large (max 5 MB)".into()));
    }

    let kind = content_type
        .as_deref()
        .and_then(ImageKind::from_mime)
        .ok_or_else(|| {
            ApiError::Validation("Only JPEG, PNG, GIF and WebP images are allowed".into())
        })?;
    if !kind.matches(&bytes) {
        return Err(ApiError::Validation(
            "File content does not match its image type".into(),
        ));
    }

    Ok(Upload {
        kind,
        bytes,
        description: validate_description(description.as_deref())?,
        taken_at: taken_at
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_taken_at)
            .transpose()?,
    })
}

fn photo_from_json(body: CreatePhotoRequest) -> Result<NewPhoto, ApiError> {
    let image_url = body.image_url.trim();
    if !(image_url.starts_with("https://") || image_url.starts_with("http://")) {
        return Err(ApiError::Validation(
            "imageUrl must be an http(s) URL".into(),
        ));
    }

    let taken_at = body
        .taken_at
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_taken_at)
        .transpose()?;

    Ok(NewPhoto {
        image_url: image_url.to_string(),
        filename: None,
        description: validate_description(Some(&body.description))?,
        taken_at: taken_at.map(|t| t.to_rfc3339()),
    })
}

fn validate_description(description: Option<&str>) -> Result<String, ApiError> {
    let description = description.map(str::trim).unwrap_or_default();
    if description.is_empty() {
        return Err(ApiError::Validation("Description is required".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(description.to_string())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_taken_at(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        })
        .map_err(|_| ApiError::Validation(format!("Invalid takenAt date: {}", raw)))
}

// ── Row conversion ──────────────────────────────────────────────────────

fn photo_response(row: PhotoRow) -> Photo {
    let taken_at = row.taken_at.as_deref().and_then(|raw| {
        parse_stored_timestamp(raw)
            .map_err(|e| warn!("Corrupt taken_at '{}' on photo {}: {}", raw, row.id, e))
            .ok()
    });
    let created_at = parse_stored_timestamp(&row.created_at).unwrap_or_else(|e| {
        warn!("Corrupt created_at '{}' on photo {}: {}", row.created_at, row.id, e);
        DateTime::default()
    });

    Photo {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        image_url: row.image_url,
        filename: row.filename,
        description: row.description,
        taken_at,
        likes: row.likes,
        created_at,
    }
}

fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
        // Parse as naive UTC and convert.
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}
