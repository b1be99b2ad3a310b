//! # Advisor
//!
//! Keyword rule engine standing in for a real inference call.
//!
//! The lowercased question is checked against each rule in order and the
//! first rule with a matching substring wins. Overlapping keyword sets are
//! resolved purely by that order, so "pest issues with watering" is a pest
//! question. Matching is plain substring search: "rot" also fires inside
//! "carrot" or "rotation".

use crate::models::{Category, GENERAL};

/// Used in templates when no crop type was given.
pub const CROP_PLACEHOLDER: &str = "your crops";

/// Which canned answer a question maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    PestManagement,
    Irrigation,
    DiseasePrevention,
    Fertilization,
    Planting,
    General,
}

/// Keyword table in priority order.
const RULES: [(Advisory, &[&str]); 5] = [
    (Advisory::PestManagement, &["pest", "bug", "insect"]),
    (Advisory::Irrigation, &["water", "irrigat", "drought"]),
    (Advisory::DiseasePrevention, &["disease", "fungus", "rot"]),
    (Advisory::Fertilization, &["fertiliz", "nutri", "npk"]),
    (Advisory::Planting, &["plant", "seed", "sow"]),
];

impl Advisory {
    /// Picks the advisory for a question.
    pub fn classify(question: &str) -> Advisory {
        let question = question.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| question.contains(k)))
            .map(|(advisory, _)| *advisory)
            .unwrap_or(Advisory::General)
    }

    /// Fixed heading every response of this kind starts with.
    pub fn heading(&self) -> &'static str {
        match self {
            Advisory::PestManagement => "Integrated Pest Management",
            Advisory::Irrigation => "Irrigation Guidance",
            Advisory::DiseasePrevention => "Disease Prevention",
            Advisory::Fertilization => "Fertilization Plan",
            Advisory::Planting => "Planting Advice",
            Advisory::General => "General Advisory",
        }
    }

    pub fn render(&self, crop: &str, category: Category) -> String {
        let heading = self.heading();
        match self {
            Advisory::PestManagement => format!(
                "{heading} for {crop}: Scout fields twice a week and check the undersides of leaves. \
                 Start with cultural controls such as crop rotation and removing infested residue, \
                 encourage natural predators like ladybugs and lacewings, and use neem oil or \
                 insecticidal soap before reaching for chemical sprays. Only treat when pest \
                 numbers pass the economic threshold for {crop}."
            ),
            Advisory::Irrigation => format!(
                "{heading} for {crop}: Water early in the morning to reduce evaporation losses. \
                 Check soil moisture at 15-20 cm depth and irrigate when it falls to 50-60% of \
                 field capacity. Drip or furrow irrigation saves water compared to flooding, and \
                 mulching helps {crop} hold moisture through dry spells."
            ),
            Advisory::DiseasePrevention => format!(
                "{heading} for {crop}: Use certified disease-free seed and resistant varieties. \
                 Keep good spacing for air flow, avoid overhead watering late in the day, and \
                 remove infected plant material promptly. Rotate {crop} with unrelated crops and \
                 apply a suitable fungicide at the first sign of symptoms."
            ),
            Advisory::Fertilization => format!(
                "{heading} for {crop}: Begin with a soil test to learn the NPK balance and pH. \
                 Apply nitrogen in split doses through the season, incorporate phosphorus and \
                 potassium before sowing, and add compost or farmyard manure to build organic \
                 matter. Watch the leaves of {crop} for yellowing or purpling as signs of deficiency."
            ),
            Advisory::Planting => format!(
                "{heading} for {crop}: Sow when soil temperature and moisture suit germination \
                 for {crop}. Prepare a fine, firm seedbed, treat seed before sowing, and follow the \
                 recommended spacing and depth. Check the local weather outlook so seedlings are \
                 not caught by frost or heavy rain."
            ),
            Advisory::General => {
                let topic = match category {
                    Category::General => "farming".to_string(),
                    other => other.label().to_lowercase(),
                };
                format!(
                    "{heading} for {crop}: Thank you for your question about {topic}. Keep records \
                     of field observations, follow local extension service recommendations, and \
                     maintain healthy soil through rotation and organic matter. For advice specific \
                     to your farm, share more detail about {crop}, your location and the problem you see."
                )
            }
        }
    }
}

/// Produces the response text stored on a new query record.
///
/// `crop_type` of `None`, blank, or `"General"` renders as the placeholder noun.
pub fn generate_response(question: &str, crop_type: Option<&str>, category: Category) -> String {
    let crop = crop_type
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(GENERAL))
        .unwrap_or(CROP_PLACEHOLDER);
    Advisory::classify(question).render(crop, category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_rule_fires_on_its_keywords() {
        let cases = [
            ("Aphids and other INSECTS on my beans", Advisory::PestManagement),
            ("How often should I irrigate?", Advisory::Irrigation),
            ("Leaves show a white fungus", Advisory::DiseasePrevention),
            ("What NPK ratio do I need?", Advisory::Fertilization),
            ("When should I sow maize?", Advisory::Planting),
            ("Which tractor should I buy?", Advisory::General),
        ];
        for (question, expected) in cases {
            assert_eq!(Advisory::classify(question), expected, "{question}");
        }
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        assert_eq!(
            Advisory::classify("pest issues with watering my plants"),
            Advisory::PestManagement
        );
        // "drought" (rule 2) and "seed" (rule 5)
        assert_eq!(Advisory::classify("drought tolerant seed"), Advisory::Irrigation);
    }

    #[test]
    fn substring_semantics_are_literal() {
        // "rot" inside "carrots"
        assert_eq!(Advisory::classify("storing carrots"), Advisory::DiseasePrevention);
        // "plant" inside "transplanting"
        assert_eq!(Advisory::classify("transplanting onions"), Advisory::Planting);
    }

    #[test]
    fn response_interpolates_crop_or_placeholder() {
        let wheat = generate_response("Best irrigation schedule?", Some("wheat"), Category::Irrigation);
        assert!(wheat.starts_with("Irrigation Guidance for wheat"));

        let none = generate_response("Best irrigation schedule?", None, Category::Irrigation);
        assert!(none.contains(CROP_PLACEHOLDER));

        let general = generate_response("Best irrigation schedule?", Some("General"), Category::General);
        assert!(general.contains(CROP_PLACEHOLDER));
    }

    #[test]
    fn generic_template_mentions_category() {
        let text = generate_response("Which tractor?", Some("rice"), Category::Equipment);
        assert!(text.starts_with("General Advisory for rice"));
        assert!(text.contains("equipment"));
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_response("bugs on corn", Some("corn"), Category::PestControl);
        let b = generate_response("bugs on corn", Some("corn"), Category::PestControl);
        assert_eq!(a, b);
    }
}
