//! # ag-api Handlers
//!
//! This module coordinates the flow between HTML form requests and the core
//! services. Every page except home and sign-in requires a session; requests
//! without one are redirected to `/auth`.

use actix_multipart::Multipart;
use actix_web::http::{header, Uri};
use actix_web::{web, HttpRequest, HttpResponse};
use ag_core::error::AppError;
use ag_core::filter::QueryView;
use ag_core::models::{Category, CategoryFilter, Language, MediaPayload, QueryDraft, UserProfile};
use ag_core::service::{ProfileService, QueryStore, QuerySubmitter};
use ag_ui::{
    AskTemplate, AuthTemplate, HistoryTemplate, HomeTemplate, ImagePreview, Nav, ProfileTemplate, ResultTemplate,
};
use askama::Template;
use futures_util::TryStreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{expired_session_cookie, language_cookie, session_cookie, AppState};

/// Upper bound on a single multipart field.
const MAX_FIELD_BYTES: usize = 10 * 1024 * 1024;

fn render<T: Template>(template: T) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(template.render()?))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

fn nav(data: &AppState, req: &HttpRequest) -> Nav {
    Nav::new(data.identity(req).as_ref(), data.language(req))
}

/// Landing page with quick questions and sample answers.
pub async fn index(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    render(HomeTemplate::new(nav(&data, &req)))
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    pub question: Option<String>,
}

/// Renders the ask form, optionally prefilled from a quick question.
pub async fn ask_form(
    data: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<AskParams>,
) -> Result<HttpResponse, ApiError> {
    if data.identity(&req).is_none() {
        return Ok(redirect("/auth"));
    }
    let mut page = AskTemplate::new(nav(&data, &req));
    if let Some(question) = params.into_inner().question {
        page.question = question;
    }
    render(page)
}

/// Fields collected from the multipart ask form.
#[derive(Debug, Default)]
struct AskForm {
    question: String,
    crop_type: String,
    category: String,
    image: Option<(String, Vec<u8>)>,
    voice: String,
}

async fn read_ask_form(mut payload: Multipart) -> Result<AskForm, ApiError> {
    let mut form = AskForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if data.len() + chunk.len() > MAX_FIELD_BYTES {
                return Err(ApiError::BadRequest(format!("field {name} is too large")));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "question" => form.question = String::from_utf8_lossy(&data).into_owned(),
            "crop_type" => form.crop_type = String::from_utf8_lossy(&data).trim().to_string(),
            "category" => form.category = String::from_utf8_lossy(&data).trim().to_string(),
            "voice" => form.voice = String::from_utf8_lossy(&data).trim().to_string(),
            "image" if !data.is_empty() => {
                let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
                form.image = Some((content_type, data));
            }
            _ => log::debug!("ignoring form field {:?}", name),
        }
    }
    Ok(form)
}

/// Handles the ask form: validate, answer, persist, then show the result.
pub async fn submit_question(
    data: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let form = read_ask_form(payload).await?;

    let category = if form.category.is_empty() {
        None
    } else {
        match form.category.parse::<Category>() {
            Ok(c) => Some(c),
            Err(e) => {
                let page = AskTemplate::new(nav(&data, &req)).with_error(&form.question, &form.crop_type, None, e.to_string());
                return Ok(HttpResponse::BadRequest()
                    .content_type("text/html; charset=utf-8")
                    .body(page.render()?));
            }
        }
    };

    let mut draft = QueryDraft::new(form.question.clone());
    draft.crop_type = Some(form.crop_type.clone()).filter(|c| !c.is_empty());
    draft.category = category;
    if let Some((content_type, bytes)) = form.image {
        draft = draft.attach(MediaPayload::Image { content_type, data: bytes });
    }
    if !form.voice.is_empty() {
        draft = draft.attach(MediaPayload::Voice { base64: form.voice });
    }

    let owner = ctx.owner_id();
    let mut submitter = QuerySubmitter::new(data.queries.clone(), ctx).with_delay(data.settings.processing_delay);
    if let Some(media) = &data.media {
        submitter = submitter.with_media_store(media.clone());
    }

    match submitter.submit(draft).await {
        Ok(submission) => {
            if let Some(media_id) = submission.image_preview {
                data.remember_preview(owner, submission.record.id, media_id);
            }
            Ok(redirect(&format!("/results/{}", submission.record.id)))
        }
        Err(err @ (AppError::Validation(_) | AppError::PermissionDenied(_))) => {
            let page = AskTemplate::new(nav(&data, &req)).with_error(&form.question, &form.crop_type, category, err.to_string());
            Ok(HttpResponse::BadRequest()
                .content_type("text/html; charset=utf-8")
                .body(page.render()?))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub notice: Option<String>,
}

fn notice_text(code: &str) -> Option<String> {
    let text = match code {
        "deleted" => "The query has been removed from your history.",
        "cleared" => "All queries have been removed from your history.",
        "missing" => "That query no longer exists.",
        _ => return None,
    };
    Some(text.to_string())
}

/// Lists the owner's queries, filtered by search term and category.
pub async fn history(
    data: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let params = params.into_inner();
    let search = params.search.unwrap_or_default();
    let filter: CategoryFilter = params
        .category
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(AppError::from)?;

    let records = QueryStore::new(data.queries.clone(), ctx).list().await?;
    let visible = QueryView::new(search.clone(), filter).apply(&records);

    render(HistoryTemplate::new(
        nav(&data, &req),
        &visible,
        records.len(),
        &search,
        filter,
        params.notice.as_deref().and_then(notice_text),
    ))
}

/// Deletes one query. A missing record is reported on the page, not as an error.
pub async fn delete_query(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let id = path.into_inner();
    match QueryStore::new(data.queries.clone(), ctx).delete(id).await {
        Ok(()) => {
            data.forget_preview(id);
            Ok(redirect("/history?notice=deleted"))
        }
        Err(AppError::NotFound(_, _)) => Ok(redirect("/history?notice=missing")),
        Err(e) => Err(e.into()),
    }
}

pub async fn clear_history(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let owner = ctx.owner_id();
    QueryStore::new(data.queries.clone(), ctx).delete_all().await?;
    data.forget_previews_of(owner);
    Ok(redirect("/history?notice=cleared"))
}

/// Single-result view (e.g., /results/<uuid>)
pub async fn view_result(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let owner = ctx.owner_id();
    let record = QueryStore::new(data.queries.clone(), ctx).get(path.into_inner()).await?;

    let preview = match (&data.media, data.preview_for(owner, record.id)) {
        (Some(media), Some(media_id)) => Some(ImagePreview {
            url: media.get_url(&media_id),
            thumb_url: media.get_thumbnail_url(&media_id),
        }),
        _ => None,
    };
    render(ResultTemplate::new(nav(&data, &req), &record, preview))
}

pub async fn profile(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let service = ProfileService::new(data.profiles.clone(), data.queries.clone(), ctx);
    let (profile, stats) = (service.profile().await?, service.stats().await?);
    render(ProfileTemplate::new(nav(&data, &req), profile, &stats, false))
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub farm_location: String,
    #[serde(default)]
    pub farm_size: String,
    #[serde(default)]
    pub primary_crops: String,
    #[serde(default)]
    pub farming_experience: String,
    #[serde(default)]
    pub phone_number: String,
}

impl From<ProfileForm> for UserProfile {
    fn from(form: ProfileForm) -> Self {
        UserProfile {
            full_name: form.full_name.trim().to_string(),
            farm_location: form.farm_location.trim().to_string(),
            farm_size: form.farm_size.trim().to_string(),
            primary_crops: form.primary_crops.split(',').map(|c| c.trim().to_string()).collect(),
            farming_experience: form.farming_experience.trim().to_string(),
            phone_number: form.phone_number.trim().to_string(),
        }
    }
}

pub async fn save_profile(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, ApiError> {
    let ctx = match data.context(&req) {
        Ok(ctx) => ctx,
        Err(_) => return Ok(redirect("/auth")),
    };
    let service = ProfileService::new(data.profiles.clone(), data.queries.clone(), ctx);
    service.save(form.into_inner().into()).await?;
    let (profile, stats) = (service.profile().await?, service.stats().await?);
    render(ProfileTemplate::new(nav(&data, &req), profile, &stats, true))
}

pub async fn auth_page(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    render(AuthTemplate::new(nav(&data, &req)))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

fn auth_failure(data: &AppState, req: &HttpRequest, email: &str, err: AppError) -> Result<HttpResponse, ApiError> {
    let err = ApiError::from(err);
    let mut page = AuthTemplate::new(nav(data, req));
    page.email = email.to_string();
    page.error = Some(err.public_message());
    Ok(HttpResponse::build(actix_web::ResponseError::status_code(&err))
        .content_type("text/html; charset=utf-8")
        .body(page.render()?))
}

pub async fn sign_in(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
) -> Result<HttpResponse, ApiError> {
    match data.auth.sign_in(&form.email, &form.password).await {
        Ok(session) => Ok(HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/ask"))
            .cookie(session_cookie(&session.token))
            .finish()),
        Err(e) => auth_failure(&data, &req, &form.email, e),
    }
}

/// Creates the account, then asks the user to sign in with it.
pub async fn sign_up(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
) -> Result<HttpResponse, ApiError> {
    match data.auth.sign_up(&form.email, &form.password).await {
        Ok(identity) => {
            let mut page = AuthTemplate::new(nav(&data, &req));
            page.email = identity.email;
            page.notice = Some("Account created. You can sign in now.".into());
            render(page)
        }
        Err(e) => auth_failure(&data, &req, &form.email, e),
    }
}

/// Skips sign-in and continues as the shared demo farmer.
pub async fn demo_login(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let session = data.auth.demo_session()?;
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/ask"))
        .cookie(session_cookie(&session.token))
        .finish())
}

pub async fn sign_out(data: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(token) = AppState::token(&req) {
        data.auth.sign_out(&token);
    }
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(expired_session_cookie())
        .finish()
}

/// Path and query of a referring URL, so redirects never leave this host.
fn local_path(referer: &str) -> Option<String> {
    let uri: Uri = referer.parse().ok()?;
    let path = uri.path_and_query()?.as_str();
    (path.starts_with('/') && !path.starts_with("//")).then(|| path.to_string())
}

/// Switches the display language and goes back where the user came from.
pub async fn set_language(req: HttpRequest, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let language: Language = path.into_inner().parse().map_err(AppError::from)?;
    let back = req
        .headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(local_path)
        .unwrap_or_else(|| "/".to_string());
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, back))
        .cookie(language_cookie(language))
        .finish())
}
