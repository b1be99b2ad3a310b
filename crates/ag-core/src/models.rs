//! # Domain Models
//!
//! These structs represent the core entities of Agri-Sentinel.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Crop type and category both fall back to this label.
pub const GENERAL: &str = "General";

/// Sentinel accepted by the history filter meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

/// Owner of every record created through the "skip sign-in" demo path.
pub const DEMO_USER_ID: Uuid = Uuid::nil();

pub const DEMO_EMAIL: &str = "demo@agrisentinel.com";

/// Crops offered by the ask form. Free text is accepted as well.
pub const CROP_TYPES: [&str; 7] = ["wheat", "corn", "rice", "tomatoes", "soybeans", "potatoes", "other"];

/// A single question together with its generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub question: String,
    pub crop_type: String,
    pub category: Category,
    /// Produced once at creation and never edited.
    pub response: String,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStatus {
    Resolved,
    InProgress,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Resolved => "resolved",
            QueryStatus::InProgress => "in-progress",
        }
    }
}

impl FromStr for QueryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolved" => Ok(QueryStatus::Resolved),
            "in-progress" => Ok(QueryStatus::InProgress),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Topic a question is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    PestControl,
    Irrigation,
    Fertilization,
    Disease,
    Planting,
    Equipment,
    Soil,
    Weather,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::PestControl,
        Category::Irrigation,
        Category::Fertilization,
        Category::Disease,
        Category::Planting,
        Category::Equipment,
        Category::Soil,
        Category::Weather,
        Category::General,
    ];

    /// Form value used by the ask page.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::PestControl => "pest-control",
            Category::Irrigation => "irrigation",
            Category::Fertilization => "fertilization",
            Category::Disease => "disease",
            Category::Planting => "planting",
            Category::Equipment => "equipment",
            Category::Soil => "soil",
            Category::Weather => "weather",
            Category::General => "general",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::PestControl => "Pest Control",
            Category::Irrigation => "Irrigation",
            Category::Fertilization => "Fertilization",
            Category::Disease => "Disease Management",
            Category::Planting => "Planting & Harvesting",
            Category::Equipment => "Equipment",
            Category::Soil => "Soil Management",
            Category::Weather => "Weather & Climate",
            Category::General => GENERAL,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts either the slug or the display label, ignoring case.
impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(needle) || c.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownCategory(needle.to_string()))
    }
}

/// Category selection on the history page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() || s.trim().eq_ignore_ascii_case(ALL_CATEGORIES) {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

/// Optional media sent along with a question.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPayload {
    /// Raw upload bytes; kept only as a preview for the session.
    Image { content_type: String, data: Vec<u8> },
    /// Base64 audio as produced by the voice recorder. Never transcribed.
    Voice { base64: String },
}

/// Raw input of the ask form before validation.
#[derive(Debug, Clone, Default)]
pub struct QueryDraft {
    pub question: String,
    pub crop_type: Option<String>,
    pub category: Option<Category>,
    pub attachments: Vec<MediaPayload>,
}

impl QueryDraft {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn crop_type(mut self, crop: impl Into<String>) -> Self {
        self.crop_type = Some(crop.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn attach(mut self, media: MediaPayload) -> Self {
        self.attachments.push(media);
        self
    }
}

/// What a successful submission hands back to the caller.
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: QueryRecord,
    /// Media id of the image preview, if one was uploaded.
    pub image_preview: Option<String>,
    pub voice_attached: bool,
}

/// The user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub is_demo: bool,
}

impl Identity {
    pub fn demo() -> Self {
        Self {
            user_id: DEMO_USER_ID,
            email: DEMO_EMAIL.to_string(),
            is_demo: true,
        }
    }
}

/// An authenticated session handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

/// A stored login.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ml")]
    Malayalam,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Malayalam => "ml",
        }
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::English),
            "ml" => Ok(Language::Malayalam),
            other => Err(ValidationError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Explicit per-request context handed to every service constructor.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub identity: Identity,
    pub language: Language,
}

impl SessionContext {
    pub fn new(identity: Identity, language: Language) -> Self {
        Self { identity, language }
    }

    pub fn owner_id(&self) -> Uuid {
        self.identity.user_id
    }
}

/// Farm details shown on the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub full_name: String,
    pub farm_location: String,
    pub farm_size: String,
    pub primary_crops: Vec<String>,
    pub farming_experience: String,
    pub phone_number: String,
}

/// Activity summary derived from an owner's records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub total_queries: usize,
    pub resolved_queries: usize,
    pub favorite_category: Category,
}
