//! Shared application state and per-request session helpers.

use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::HttpRequest;
use ag_core::models::{Identity, Language, SessionContext};
use ag_core::traits::{AuthProvider, MediaStore, ProfileRepo, QueryRepo};
use ag_core::voice::{BufferedMicrophone, VoiceRecorder};
use ag_core::AppError;
use dashmap::DashMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "agri_session";
pub const LANG_COOKIE: &str = "lang";

/// Runtime knobs handed over by the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_language: Language,
    pub processing_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_language: Language::English,
            processing_delay: ag_core::service::DEFAULT_PROCESSING_DELAY,
        }
    }
}

/// One browser's voice capture.
pub struct VoiceSession {
    pub microphone: BufferedMicrophone,
    pub recorder: VoiceRecorder<BufferedMicrophone>,
}

impl VoiceSession {
    fn new() -> Self {
        let microphone = BufferedMicrophone::new();
        Self {
            recorder: VoiceRecorder::new(microphone.clone()),
            microphone,
        }
    }
}

/// State shared across all Actix-web workers.
pub struct AppState {
    pub queries: Arc<dyn QueryRepo>,
    pub profiles: Arc<dyn ProfileRepo>,
    pub media: Option<Arc<dyn MediaStore>>,
    pub auth: Arc<dyn AuthProvider>,
    pub settings: Settings,
    /// Query id -> (owner id, media id) of the image attached when it was
    /// asked. Lives only as long as the process and is dropped with the record.
    pub previews: DashMap<Uuid, (Uuid, String)>,
    /// Owner id -> active voice capture.
    pub voice: DashMap<Uuid, VoiceSession>,
}

impl AppState {
    pub fn new(
        queries: Arc<dyn QueryRepo>,
        profiles: Arc<dyn ProfileRepo>,
        auth: Arc<dyn AuthProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            queries,
            profiles,
            media: None,
            auth,
            settings,
            previews: DashMap::new(),
            voice: DashMap::new(),
        }
    }

    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    /// Session token from the cookie, or from an `Authorization: Bearer` header.
    pub fn token(req: &HttpRequest) -> Option<String> {
        if let Some(cookie) = req.cookie(SESSION_COOKIE) {
            return Some(cookie.value().to_string());
        }
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    }

    pub fn identity(&self, req: &HttpRequest) -> Option<Identity> {
        Self::token(req).and_then(|token| self.auth.resolve(&token))
    }

    pub fn language(&self, req: &HttpRequest) -> Language {
        req.cookie(LANG_COOKIE)
            .and_then(|c| c.value().parse().ok())
            .unwrap_or(self.settings.default_language)
    }

    /// Context for a signed-in request; `Unauthorized` otherwise.
    pub fn context(&self, req: &HttpRequest) -> Result<SessionContext, AppError> {
        let identity = self
            .identity(req)
            .ok_or_else(|| AppError::Unauthorized("sign in to continue".into()))?;
        Ok(SessionContext::new(identity, self.language(req)))
    }

    pub fn remember_preview(&self, owner: Uuid, query_id: Uuid, media_id: String) {
        self.previews.insert(query_id, (owner, media_id));
    }

    pub fn preview_for(&self, owner: Uuid, query_id: Uuid) -> Option<String> {
        self.previews
            .get(&query_id)
            .filter(|entry| entry.value().0 == owner)
            .map(|entry| entry.value().1.clone())
    }

    pub fn forget_preview(&self, query_id: Uuid) {
        self.previews.remove(&query_id);
    }

    /// Drops every preview belonging to `owner`, e.g. after clearing history.
    pub fn forget_previews_of(&self, owner: Uuid) {
        self.previews.retain(|_, (entry_owner, _)| *entry_owner != owner);
    }

    /// Runs `f` against the owner's voice session, creating it on first use.
    pub fn with_voice<T>(&self, owner: Uuid, f: impl FnOnce(&mut VoiceSession) -> T) -> T {
        let mut entry = self.voice.entry(owner).or_insert_with(VoiceSession::new);
        f(entry.value_mut())
    }
}

pub fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = session_cookie("");
    cookie.make_removal();
    cookie
}

pub fn language_cookie(language: Language) -> Cookie<'static> {
    Cookie::build(LANG_COOKIE, language.code())
        .path("/")
        .same_site(SameSite::Lax)
        .finish()
}
