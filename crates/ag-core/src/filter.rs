//! History view helpers. The visible list is a pure function of
//! `(records, search_term, category)`; callers recompute it whenever any of
//! the three changes.

use crate::models::{CategoryFilter, QueryRecord};

/// Keeps records whose question or response contains `term`, ignoring case.
/// A blank term keeps everything; otherwise the term is matched as typed,
/// surrounding whitespace included.
pub fn search(records: &[QueryRecord], term: &str) -> Vec<QueryRecord> {
    if term.trim().is_empty() {
        return records.to_vec();
    }
    let term = term.to_lowercase();
    records
        .iter()
        .filter(|r| r.question.to_lowercase().contains(&term) || r.response.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

pub fn filter_by_category(records: &[QueryRecord], filter: CategoryFilter) -> Vec<QueryRecord> {
    match filter {
        CategoryFilter::All => records.to_vec(),
        CategoryFilter::Only(category) => records.iter().filter(|r| r.category == category).cloned().collect(),
    }
}

/// Search and category filter combined with AND, order preserved.
#[derive(Debug, Clone, Default)]
pub struct QueryView {
    pub search_term: String,
    pub category: CategoryFilter,
}

impl QueryView {
    pub fn new(search_term: impl Into<String>, category: CategoryFilter) -> Self {
        Self {
            search_term: search_term.into(),
            category,
        }
    }

    pub fn is_filtered(&self) -> bool {
        !self.search_term.trim().is_empty() || self.category != CategoryFilter::All
    }

    pub fn apply(&self, records: &[QueryRecord]) -> Vec<QueryRecord> {
        filter_by_category(&search(records, &self.search_term), self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, QueryStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(question: &str, response: &str, category: Category) -> QueryRecord {
        QueryRecord {
            id: Uuid::now_v7(),
            owner_id: Uuid::nil(),
            question: question.to_string(),
            crop_type: "General".to_string(),
            category,
            response: response.to_string(),
            status: QueryStatus::Resolved,
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<QueryRecord> {
        vec![
            record("Aphids on tomatoes", "Use neem oil", Category::PestControl),
            record("Yellow leaves", "Could be an APHID colony", Category::Disease),
            record("When to sow rice", "Before monsoon", Category::Planting),
        ]
    }

    #[test]
    fn search_matches_question_or_response_case_insensitively() {
        let hits = search(&sample(), "aphid");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| {
            r.question.to_lowercase().contains("aphid") || r.response.to_lowercase().contains("aphid")
        }));
    }

    #[test]
    fn search_term_whitespace_is_significant() {
        let records = vec![
            record("Carrots wilting", "Check the soil.", Category::Planting),
            record("Root rot spreading", "Improve drainage.", Category::Disease),
        ];
        let hits = search(&records, "rot ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].question, "Root rot spreading");
        assert_eq!(search(&records, "rot").len(), 2);
    }

    #[test]
    fn blank_search_keeps_everything() {
        assert_eq!(search(&sample(), "   ").len(), 3);
    }

    #[test]
    fn all_sentinel_disables_category_filter() {
        let filter: CategoryFilter = "all".parse().unwrap();
        assert_eq!(filter_by_category(&sample(), filter).len(), 3);
        let planting = filter_by_category(&sample(), CategoryFilter::Only(Category::Planting));
        assert_eq!(planting.len(), 1);
        assert_eq!(planting[0].question, "When to sow rice");
    }

    #[test]
    fn view_composes_with_and() {
        let view = QueryView::new("aphid", CategoryFilter::Only(Category::Disease));
        let visible = view.apply(&sample());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].question, "Yellow leaves");
        assert!(view.is_filtered());
        assert!(!QueryView::default().is_filtered());
    }
}
