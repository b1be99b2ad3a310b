//! # ag-ui
//!
//! Askama templates for the named views, plus the small view models they
//! render. Handlers build these from domain types; templates never touch
//! ports directly.

use ag_core::models::{
    Category, CategoryFilter, Identity, Language, ProfileStats, QueryRecord, UserProfile, CROP_TYPES,
};
use askama::Template;

/// Shown as one-click prompts on the home and ask pages.
pub const QUICK_QUESTIONS: [&str; 4] = [
    "How to identify pest damage on tomatoes?",
    "Best irrigation schedule for wheat?",
    "Optimal planting time for corn in my region?",
    "Natural fertilizers for organic farming?",
];

/// Header state shared by every page.
#[derive(Debug, Clone)]
pub struct Nav {
    pub lang: &'static str,
    pub signed_in: bool,
    pub is_demo: bool,
    pub email: String,
}

impl Nav {
    pub fn new(identity: Option<&Identity>, language: Language) -> Self {
        Self {
            lang: language.code(),
            signed_in: identity.is_some(),
            is_demo: identity.map(|i| i.is_demo).unwrap_or(false),
            email: identity.map(|i| i.email.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Category dropdown. `with_all` prepends the "All Categories" entry used by history.
pub fn category_options(selected: Option<Category>, with_all: bool) -> Vec<SelectOption> {
    let mut options = Vec::with_capacity(Category::ALL.len() + 1);
    if with_all {
        options.push(SelectOption {
            value: "all".into(),
            label: "All Categories".into(),
            selected: selected.is_none(),
        });
    }
    options.extend(Category::ALL.iter().map(|c| SelectOption {
        value: c.slug().into(),
        label: c.label().into(),
        selected: selected == Some(*c),
    }));
    options
}

pub fn crop_options(selected: &str) -> Vec<SelectOption> {
    CROP_TYPES
        .iter()
        .map(|crop| {
            let mut label = crop.to_string();
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            SelectOption {
                value: crop.to_string(),
                label,
                selected: crop.eq_ignore_ascii_case(selected),
            }
        })
        .collect()
}

/// A query record flattened for display.
#[derive(Debug, Clone)]
pub struct QueryCard {
    pub id: String,
    pub question: String,
    pub crop_type: String,
    pub category: String,
    pub response: String,
    pub status: &'static str,
    pub resolved: bool,
    pub created_at: String,
}

impl From<&QueryRecord> for QueryCard {
    fn from(record: &QueryRecord) -> Self {
        Self {
            id: record.id.to_string(),
            question: record.question.clone(),
            crop_type: record.crop_type.clone(),
            category: record.category.label().to_string(),
            response: record.response.clone(),
            status: record.status.as_str(),
            resolved: record.status == ag_core::models::QueryStatus::Resolved,
            created_at: record.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

/// Text placed on the clipboard by the result page's share button.
pub fn share_text(record: &QueryRecord) -> String {
    format!("Q: {}\n\nA: {}", record.question, record.response)
}

/// Canned examples shown on the landing page.
#[derive(Debug, Clone)]
pub struct SampleCard {
    pub question: &'static str,
    pub category: &'static str,
    pub response: &'static str,
    pub resolved: bool,
}

pub const SAMPLES: [SampleCard; 3] = [
    SampleCard {
        question: "How do I identify and treat brown spot disease in my rice crop?",
        category: "Disease Management",
        response: "Brown spot in rice is caused by the fungus Bipolaris oryzae. Look for small, round brown \
                   spots with yellow halos on the leaves. Apply a propiconazole or tebuconazole fungicide early, \
                   keep fields well drained, and avoid excess nitrogen to stop it coming back.",
        resolved: true,
    },
    SampleCard {
        question: "What's the optimal irrigation schedule for wheat during flowering stage?",
        category: "Irrigation",
        response: "Wheat needs steady moisture while flowering. Irrigate every 7-10 days with 25-30 mm of water \
                   and check soil moisture at 15-20 cm depth, irrigating when it drops to 50-60% of field capacity.",
        resolved: true,
    },
    SampleCard {
        question: "Best organic methods to control aphids on tomato plants?",
        category: "Pest Control",
        response: "Spray neem oil (2-3 ml per litre) early in the morning, release ladybugs and lacewings, use \
                   reflective mulch, and try a mild soap solution. Marigolds and nasturtiums planted nearby also \
                   help keep aphids away.",
        resolved: false,
    },
];

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub title: String,
    pub quick_questions: Vec<&'static str>,
    pub samples: Vec<SampleCard>,
}

impl HomeTemplate {
    pub fn new(nav: Nav) -> Self {
        Self {
            nav,
            title: "Agri-Sentinel".into(),
            quick_questions: QUICK_QUESTIONS.to_vec(),
            samples: SAMPLES.to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "ask.html")]
pub struct AskTemplate {
    pub nav: Nav,
    pub title: String,
    pub question: String,
    pub crops: Vec<SelectOption>,
    pub categories: Vec<SelectOption>,
    pub quick_questions: Vec<&'static str>,
    pub error: Option<String>,
}

impl AskTemplate {
    pub fn new(nav: Nav) -> Self {
        Self {
            nav,
            title: "Ask Your Farming Question".into(),
            question: String::new(),
            crops: crop_options(""),
            categories: category_options(None, false),
            quick_questions: QUICK_QUESTIONS.to_vec(),
            error: None,
        }
    }

    /// Re-renders the form with the user's input and an error message.
    pub fn with_error(mut self, question: &str, crop: &str, category: Option<Category>, error: String) -> Self {
        self.question = question.to_string();
        self.crops = crop_options(crop);
        self.categories = category_options(category, false);
        self.error = Some(error);
        self
    }
}

#[derive(Template)]
#[template(path = "history.html")]
pub struct HistoryTemplate {
    pub nav: Nav,
    pub title: String,
    pub queries: Vec<QueryCard>,
    pub total: usize,
    pub search: String,
    pub categories: Vec<SelectOption>,
    pub filtered: bool,
    pub notice: Option<String>,
}

impl HistoryTemplate {
    pub fn new(
        nav: Nav,
        visible: &[QueryRecord],
        total: usize,
        search: &str,
        filter: CategoryFilter,
        notice: Option<String>,
    ) -> Self {
        let selected = match filter {
            CategoryFilter::All => None,
            CategoryFilter::Only(c) => Some(c),
        };
        Self {
            nav,
            title: "My Query History".into(),
            queries: visible.iter().map(QueryCard::from).collect(),
            total,
            search: search.to_string(),
            categories: category_options(selected, true),
            filtered: !search.trim().is_empty() || selected.is_some(),
            notice,
        }
    }

    pub fn count_label(&self) -> &'static str {
        if self.queries.len() == 1 {
            "query"
        } else {
            "queries"
        }
    }
}

/// Links to an image attached during this session.
#[derive(Debug, Clone)]
pub struct ImagePreview {
    pub url: String,
    pub thumb_url: String,
}

#[derive(Template)]
#[template(path = "result.html")]
pub struct ResultTemplate {
    pub nav: Nav,
    pub title: String,
    pub query: QueryCard,
    pub share_text: String,
    pub preview: Option<ImagePreview>,
}

impl ResultTemplate {
    pub fn new(nav: Nav, record: &QueryRecord, preview: Option<ImagePreview>) -> Self {
        Self {
            nav,
            title: "AI Response".into(),
            query: QueryCard::from(record),
            share_text: share_text(record),
            preview,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub title: String,
    pub profile: UserProfile,
    pub crops_csv: String,
    pub total_queries: usize,
    pub resolved_queries: usize,
    pub favorite_category: String,
    pub saved: bool,
}

impl ProfileTemplate {
    pub fn new(nav: Nav, profile: UserProfile, stats: &ProfileStats, saved: bool) -> Self {
        Self {
            nav,
            title: "My Profile".into(),
            crops_csv: profile.primary_crops.join(", "),
            profile,
            total_queries: stats.total_queries,
            resolved_queries: stats.resolved_queries,
            favorite_category: stats.favorite_category.label().to_string(),
            saved,
        }
    }
}

#[derive(Template)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub nav: Nav,
    pub title: String,
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl AuthTemplate {
    pub fn new(nav: Nav) -> Self {
        Self {
            nav,
            title: "Sign In".into(),
            email: String::new(),
            error: None,
            notice: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_core::models::QueryStatus;

    fn record() -> QueryRecord {
        QueryRecord {
            id: uuid::Uuid::now_v7(),
            owner_id: uuid::Uuid::nil(),
            question: "Aphids <b>everywhere</b>".into(),
            crop_type: "tomatoes".into(),
            category: Category::PestControl,
            response: "Use neem oil".into(),
            status: QueryStatus::Resolved,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn history_escapes_user_text() {
        let nav = Nav::new(Some(&Identity::demo()), Language::English);
        let html = HistoryTemplate::new(nav, &[record()], 1, "", CategoryFilter::All, None)
            .render()
            .unwrap();
        assert!(html.contains("Aphids &lt;b&gt;everywhere&lt;/b&gt;"));
        assert!(html.contains("1 query found"));
    }

    #[test]
    fn history_count_is_pluralized() {
        let nav = Nav::new(Some(&Identity::demo()), Language::English);
        let html = HistoryTemplate::new(nav.clone(), &[record(), record()], 2, "", CategoryFilter::All, None)
            .render()
            .unwrap();
        assert!(html.contains("2 queries found"));
        let html = HistoryTemplate::new(nav, &[], 2, "zzz", CategoryFilter::All, None)
            .render()
            .unwrap();
        assert!(html.contains("0 queries found"));
        assert!(html.contains("Try adjusting your search"));
    }

    #[test]
    fn result_page_has_share_text() {
        let nav = Nav::new(Some(&Identity::demo()), Language::Malayalam);
        let html = ResultTemplate::new(nav, &record(), None).render().unwrap();
        assert!(html.contains("lang=\"ml\""));
        assert!(html.contains("Use neem oil"));
        assert_eq!(share_text(&record()), "Q: Aphids <b>everywhere</b>\n\nA: Use neem oil");
    }

    #[test]
    fn history_category_select_marks_selection() {
        let options = category_options(Some(Category::Soil), true);
        assert_eq!(options[0].value, "all");
        assert!(!options[0].selected);
        assert!(options.iter().any(|o| o.value == "soil" && o.selected));
    }

    #[test]
    fn crop_labels_are_capitalized() {
        let options = crop_options("rice");
        assert_eq!(options[0].label, "Wheat");
        assert!(options.iter().any(|o| o.value == "rice" && o.selected));
    }
}
