//! Quote session for repeated lookups
//!
//! Loads the reference table once, then answers many queries without
//! re-reading the source. Reloading builds a fresh table and swaps it in;
//! callers still holding the previous `Arc` keep a consistent view.

use crate::config::QuoteConfig;
use crate::error::{LoadError, QuoteError};
use crate::quote::{self, Query, Quote, QuoteResolver, ResolverConfig};
use crate::table::{self, LoadReport, LoaderConfig, ReferenceTable, TableSource};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Pre-loaded table plus the settings used to query it
///
/// # Example
/// ```ignore
/// let mut session = QuoteSession::open(QuoteConfig::from_env())?;
///
/// for face in [500_000, 1_000_000, 2_000_000] {
///     let quote = session.quote(&Query::new(Sex::Female, 40, 6, Decimal::from(face)))?;
/// }
///
/// session.reload_if_stale(Duration::minutes(15))?;
/// ```
#[derive(Debug, Clone)]
pub struct QuoteSession {
    source: TableSource,
    loader: LoaderConfig,
    resolver: ResolverConfig,
    milestone_years: Option<std::collections::BTreeSet<u32>>,
    table: Arc<ReferenceTable>,
    report: LoadReport,
    loaded_at: DateTime<Utc>,
}

impl QuoteSession {
    /// Load the configured source
    pub fn open(config: &QuoteConfig) -> Result<Self, LoadError> {
        let source = config.source();
        let loader = config.loader_config();
        let loaded = table::load(&source, &loader)?;

        log::info!(
            "Session opened on {} ({} rows)",
            source,
            loaded.table.len()
        );

        Ok(Self {
            source,
            loader,
            resolver: config.resolver_config(),
            milestone_years: config.milestone_years.clone(),
            table: Arc::new(loaded.table),
            report: loaded.report,
            loaded_at: Utc::now(),
        })
    }

    /// Wrap an already-built table
    pub fn with_table(table: ReferenceTable, config: &QuoteConfig) -> Self {
        Self {
            source: config.source(),
            loader: config.loader_config(),
            resolver: config.resolver_config(),
            milestone_years: config.milestone_years.clone(),
            report: LoadReport {
                rows_read: table.len(),
                rows_loaded: table.len(),
                ..Default::default()
            },
            table: Arc::new(table),
            loaded_at: Utc::now(),
        }
    }

    /// Re-read the source and swap in the new table.
    /// On failure the current table stays in place.
    pub fn reload(&mut self) -> Result<&LoadReport, LoadError> {
        let loaded = table::load(&self.source, &self.loader)?;

        log::info!(
            "Reloaded {}: {} rows (was {})",
            self.source,
            loaded.table.len(),
            self.table.len()
        );

        self.table = Arc::new(loaded.table);
        self.report = loaded.report;
        self.loaded_at = Utc::now();
        Ok(&self.report)
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.loaded_at > max_age
    }

    /// Reload when the table is older than `max_age`; returns whether it did
    pub fn reload_if_stale(&mut self, max_age: Duration) -> Result<bool, LoadError> {
        if !self.is_stale(max_age) {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    /// Shared handle to the current table
    pub fn table(&self) -> Arc<ReferenceTable> {
        Arc::clone(&self.table)
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        self.resolver
    }

    pub fn quote(&self, query: &Query) -> Result<Quote, QuoteError> {
        self.resolver().resolve(&self.with_default_years(query))
    }

    pub fn quote_all(&self, query: &Query) -> Result<Vec<Quote>, QuoteError> {
        self.resolver().resolve_all(&self.with_default_years(query))
    }

    /// Quotes for many queries, in input order
    pub fn quote_batch(&self, queries: &[Query]) -> Vec<Result<Quote, QuoteError>> {
        let queries: Vec<Query> = queries.iter().map(|q| self.with_default_years(q)).collect();
        self.resolver().resolve_batch(&queries)
    }

    pub fn best_plans(&self, query: &Query, policy_year: u32) -> Result<Vec<Quote>, QuoteError> {
        quote::best_plans(&self.table, &self.with_default_years(query), policy_year, self.resolver)
    }

    fn resolver(&self) -> QuoteResolver<'_> {
        QuoteResolver::new(&self.table).with_config(self.resolver)
    }

    fn with_default_years(&self, query: &Query) -> Query {
        let mut query = query.clone();
        if query.milestone_years.is_none() {
            query.milestone_years = self.milestone_years.clone();
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::ScalingPolicy;
    use crate::table::Sex;
    use rust_decimal_macros::dec;

    fn fixture_config() -> QuoteConfig {
        QuoteConfig::default()
    }

    #[test]
    fn test_open_fixture() {
        let session = QuoteSession::open(&fixture_config()).unwrap();
        assert_eq!(session.table().len(), 8);
        assert_eq!(session.report().rows_dropped, 0);
        assert!(!session.is_stale(Duration::minutes(5)));
        assert!(session.is_stale(Duration::seconds(-1)));
    }

    #[test]
    fn test_fixture_proration() {
        let session = QuoteSession::open(&fixture_config()).unwrap();
        let quote = session
            .quote(&Query::new(Sex::Female, 40, 6, dec!(500000)).company("A公司"))
            .unwrap();
        assert_eq!(quote.annual_premium, dec!(30400));
        assert_eq!(quote.surrender_value_at(30), Some(dec!(345000)));
        assert!(quote.includes_bonus);
    }

    #[test]
    fn test_fixture_best_plans() {
        let session = QuoteSession::open(&fixture_config()).unwrap();
        let ranked = session
            .best_plans(&Query::new(Sex::Female, 40, 6, dec!(1000000)), 30)
            .unwrap();

        let labels: Vec<String> = ranked.iter().map(|q| q.plan_label()).collect();
        assert_eq!(
            labels,
            vec!["B公司 終身壽險", "C公司 終身壽險", "A公司 終身壽險", "B公司 定期壽險"]
        );
        assert_eq!(ranked[3].surrender_value_at(30), None);
    }

    #[test]
    fn test_default_years_applied() {
        let config = QuoteConfig {
            milestone_years: Some([1, 10].into_iter().collect()),
            ..fixture_config()
        };
        let session = QuoteSession::open(&config).unwrap();

        let q = Query::new(Sex::Male, 35, 20, dec!(500000));
        let quote = session.quote(&q).unwrap();
        let years: Vec<u32> = quote.milestones.iter().map(|m| m.policy_year).collect();
        assert_eq!(years, vec![1, 10]);

        let explicit = session.quote(&q.clone().years([5])).unwrap();
        assert_eq!(explicit.milestones.len(), 1);
    }

    #[test]
    fn test_reload_swaps_table() {
        let mut session = QuoteSession::open(&fixture_config()).unwrap();
        let before = session.table();
        let first_load = session.loaded_at();

        assert!(session.reload_if_stale(Duration::seconds(-1)).unwrap());
        assert!(!Arc::ptr_eq(&before, &session.table()));
        assert!(session.loaded_at() >= first_load);
        assert_eq!(before.len(), session.table().len());

        assert!(!session.reload_if_stale(Duration::hours(1)).unwrap());
    }

    #[test]
    fn test_failed_reload_keeps_table() {
        let table = ReferenceTable::from_rows(vec![
            table::ReferenceRow::new(Sex::Female, 40, 6, dec!(1000000), dec!(60800)),
        ]);
        let config = QuoteConfig {
            table: "data/does_not_exist.csv".to_string(),
            ..fixture_config()
        };
        let mut session = QuoteSession::with_table(table, &config);

        assert!(matches!(session.reload(), Err(LoadError::SourceUnavailable { .. })));
        assert_eq!(session.table().len(), 1);
        assert!(session.quote(&Query::new(Sex::Female, 40, 6, dec!(1))).is_ok());
    }

    #[test]
    fn test_exact_bracket_session() {
        let config = QuoteConfig {
            scaling: ScalingPolicy::ExactBracket,
            ..fixture_config()
        };
        let session = QuoteSession::open(&config).unwrap();
        assert!(session.quote(&Query::new(Sex::Female, 40, 6, dec!(1000000))).is_ok());
        assert!(session.quote(&Query::new(Sex::Female, 40, 6, dec!(500000))).is_err());

        let batch = session.quote_batch(&[
            Query::new(Sex::Male, 35, 20, dec!(500000)),
            Query::new(Sex::Male, 35, 20, dec!(600000)),
        ]);
        assert!(batch[0].is_ok());
        assert!(batch[1].is_err());
    }
}
