//! JSON endpoints under `/api`, for clients that are not the bundled HTML
//! views. Authentication uses the same session token, sent either as the
//! cookie or as a bearer header.

use actix_web::{web, HttpRequest, HttpResponse};
use ag_core::error::AppError;
use ag_core::filter::QueryView;
use ag_core::models::{Category, CategoryFilter, MediaPayload, QueryDraft, QueryRecord};
use ag_core::service::{QueryStore, QuerySubmitter};
use ag_core::voice::RecorderState;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub category: Option<String>,
}

pub async fn list_queries(
    data: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<ListParams>,
) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let params = params.into_inner();
    let filter: CategoryFilter = params
        .category
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(AppError::from)?;
    let view = QueryView::new(params.search.unwrap_or_default(), filter);
    let records = QueryStore::new(data.queries.clone(), ctx).view(&view).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Body of `POST /api/queries`. Images travel base64-encoded.
#[derive(Debug, Deserialize)]
pub struct NewQuery {
    pub question: String,
    pub crop_type: Option<String>,
    pub category: Option<Category>,
    pub image: Option<ImageUpload>,
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionBody {
    #[serde(flatten)]
    pub record: QueryRecord,
    pub image_url: Option<String>,
    pub voice_attached: bool,
}

pub async fn create_query(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewQuery>,
) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let body = body.into_inner();

    let mut draft = QueryDraft::new(body.question);
    draft.crop_type = body.crop_type;
    draft.category = body.category;
    if let Some(image) = body.image {
        let bytes = STANDARD
            .decode(image.data.trim())
            .map_err(|e| ApiError::BadRequest(format!("image is not valid base64: {e}")))?;
        draft = draft.attach(MediaPayload::Image {
            content_type: image.content_type,
            data: bytes,
        });
    }
    if let Some(voice) = body.voice.filter(|v| !v.trim().is_empty()) {
        draft = draft.attach(MediaPayload::Voice { base64: voice });
    }

    let owner = ctx.owner_id();
    let mut submitter = QuerySubmitter::new(data.queries.clone(), ctx).with_delay(data.settings.processing_delay);
    if let Some(media) = &data.media {
        submitter = submitter.with_media_store(media.clone());
    }
    let submission = submitter.submit(draft).await?;

    let image_url = match (&data.media, &submission.image_preview) {
        (Some(media), Some(media_id)) => {
            data.remember_preview(owner, submission.record.id, media_id.clone());
            Some(media.get_url(media_id))
        }
        _ => None,
    };
    Ok(HttpResponse::Created().json(SubmissionBody {
        record: submission.record,
        image_url,
        voice_attached: submission.voice_attached,
    }))
}

pub async fn get_query(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let record = QueryStore::new(data.queries.clone(), ctx).get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn delete_query(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let id = path.into_inner();
    QueryStore::new(data.queries.clone(), ctx).delete(id).await?;
    data.forget_preview(id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_all(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let owner = ctx.owner_id();
    QueryStore::new(data.queries.clone(), ctx).delete_all().await?;
    data.forget_previews_of(owner);
    Ok(HttpResponse::NoContent().finish())
}

fn state_name(state: RecorderState) -> &'static str {
    match state {
        RecorderState::Idle => "idle",
        RecorderState::Recording => "recording",
    }
}

/// Opens the caller's microphone and starts buffering chunks.
pub async fn voice_start(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let state = data.with_voice(ctx.owner_id(), |session| session.recorder.start_recording())?;
    Ok(HttpResponse::Ok().json(json!({ "state": state_name(state) })))
}

/// Raw audio bytes for the active recording.
pub async fn voice_chunk(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let accepted = data.with_voice(ctx.owner_id(), |session| session.microphone.feed(&body));
    Ok(HttpResponse::Ok().json(json!({ "accepted": accepted })))
}

/// Stops recording and hands back the clip as base64, or `null` if empty.
pub async fn voice_stop(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = data.context(&req)?;
    let audio = data.with_voice(ctx.owner_id(), |session| session.recorder.stop_recording())?;
    Ok(HttpResponse::Ok().json(json!({ "state": "idle", "audio": audio })))
}
