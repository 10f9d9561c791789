//! Plan comparison by surrender value

use super::query::{Query, Quote};
use super::resolver::{QuoteResolver, ResolverConfig};
use crate::error::QuoteError;
use crate::table::ReferenceTable;
use std::cmp::Ordering;

/// Sort quotes by surrender value at `policy_year`, highest first.
///
/// The sort is stable: equal values keep their incoming (load) order.
/// Quotes with no value at that year sort after every quote that has one.
pub fn rank_by_surrender_value(quotes: &mut [Quote], policy_year: u32) {
    quotes.sort_by(|a, b| {
        match (a.surrender_value_at(policy_year), b.surrender_value_at(policy_year)) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Resolve every plan matching the query and rank them at `policy_year`
pub fn best_plans(
    table: &ReferenceTable,
    query: &Query,
    policy_year: u32,
    config: ResolverConfig,
) -> Result<Vec<Quote>, QuoteError> {
    let mut quotes = QuoteResolver::new(table).with_config(config).resolve_all(query)?;
    rank_by_surrender_value(&mut quotes, policy_year);

    if let Some(best) = quotes.first() {
        log::debug!(
            "Best of {} plans at year {}: {}",
            quotes.len(),
            policy_year,
            best.plan_label()
        );
    }
    Ok(quotes)
}
