//! Activity statistics for the profile page.

use std::collections::BTreeMap;

use crate::models::{Category, ProfileStats, QueryRecord, QueryStatus};

/// Counts records and picks the most asked category.
///
/// Ties go to the category whose label sorts first; an empty history reports
/// `General`.
pub fn profile_stats(records: &[QueryRecord]) -> ProfileStats {
    let mut counts: BTreeMap<&'static str, (usize, Category)> = BTreeMap::new();
    for record in records {
        counts.entry(record.category.label()).or_insert((0, record.category)).0 += 1;
    }

    let favorite_category = counts
        .values()
        .fold(None::<(usize, Category)>, |best, &(n, c)| match best {
            Some((m, _)) if m >= n => best,
            _ => Some((n, c)),
        })
        .map(|(_, c)| c)
        .unwrap_or(Category::General);

    ProfileStats {
        total_queries: records.len(),
        resolved_queries: records.iter().filter(|r| r.status == QueryStatus::Resolved).count(),
        favorite_category,
    }
}
