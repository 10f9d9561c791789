//! Quote resolver: exact-match lookup and linear proration
//!
//! Matching is an exact filter on sex, age and pay period, plus company and
//! product when the query names them. There is no nearest-age or
//! between-bracket interpolation. When several rows match, the first in load
//! order wins; `resolve_all` applies the same rule per (company, product).
//!
//! Every monetary field is scaled as `value × requested / base` using exact
//! decimals; nothing is rounded here.

use super::query::{MilestoneQuote, Query, Quote};
use crate::error::{NoMatchError, QuoteError};
use crate::table::{ReferenceRow, ReferenceTable};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a row's figures are carried to the requested face amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPolicy {
    /// Scale linearly from the row's base face amount
    #[default]
    Linear,
    /// Only rows whose base face amount equals the request match; no scaling
    ExactBracket,
}

/// Resolver settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub scaling: ScalingPolicy,
}

/// Resolves queries against one borrowed reference table
#[derive(Debug, Clone, Copy)]
pub struct QuoteResolver<'a> {
    table: &'a ReferenceTable,
    config: ResolverConfig,
}

/// Resolve a query with the default (linear) policy
pub fn resolve(table: &ReferenceTable, query: &Query) -> Result<Quote, QuoteError> {
    QuoteResolver::new(table).resolve(query)
}

/// Resolve every matching row with the default (linear) policy
pub fn resolve_all(table: &ReferenceTable, query: &Query) -> Result<Vec<Quote>, QuoteError> {
    QuoteResolver::new(table).resolve_all(query)
}

impl<'a> QuoteResolver<'a> {
    pub fn new(table: &'a ReferenceTable) -> Self {
        Self {
            table,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn table(&self) -> &'a ReferenceTable {
        self.table
    }

    /// Quote the first matching row
    pub fn resolve(&self, query: &Query) -> Result<Quote, QuoteError> {
        validate(query)?;

        let (index, row) = self
            .matches(query)
            .next()
            .ok_or_else(|| self.no_match(query))?;

        log::debug!(
            "Matched {} {}/{}/{} at line {}",
            row.company.as_deref().unwrap_or("-"),
            query.sex,
            query.age,
            query.pay_years,
            row.line
        );
        scale_row(index, row, query, self.table.columns().bonus)
    }

    /// Quote one row per (company, product) plan, in load order.
    /// Each plan uses its first matching row, scaled independently.
    pub fn resolve_all(&self, query: &Query) -> Result<Vec<Quote>, QuoteError> {
        validate(query)?;

        let mut plans: HashSet<(Option<&str>, Option<&str>)> = HashSet::new();
        let quotes = self
            .matches(query)
            .filter(|(_, row)| plans.insert((row.company.as_deref(), row.product.as_deref())))
            .map(|(index, row)| scale_row(index, row, query, self.table.columns().bonus))
            .collect::<Result<Vec<_>, _>>()?;

        if quotes.is_empty() {
            return Err(self.no_match(query));
        }
        Ok(quotes)
    }

    /// Resolve many queries in parallel against the shared table.
    /// Results are returned in input order.
    pub fn resolve_batch(&self, queries: &[Query]) -> Vec<Result<Quote, QuoteError>> {
        queries.par_iter().map(|q| self.resolve(q)).collect()
    }

    fn matches<'q>(&self, query: &'q Query) -> impl Iterator<Item = (usize, &'a ReferenceRow)> + 'q
    where
        'a: 'q,
    {
        let scaling = self.config.scaling;
        self.table
            .rows()
            .iter()
            .enumerate()
            .filter(move |(_, row)| row_matches(row, query, scaling))
    }

    fn no_match(&self, query: &Query) -> QuoteError {
        log::debug!(
            "No rate for sex={} age={} pay_years={}",
            query.sex,
            query.age,
            query.pay_years
        );
        QuoteError::NoMatch(NoMatchError {
            sex: query.sex,
            age: query.age,
            pay_years: query.pay_years,
            company: query.company.clone(),
            product: query.product.clone(),
            face_amount: match self.config.scaling {
                ScalingPolicy::ExactBracket => Some(query.requested_face_amount),
                ScalingPolicy::Linear => None,
            },
        })
    }
}

fn validate(query: &Query) -> Result<(), QuoteError> {
    if query.requested_face_amount <= Decimal::ZERO {
        return Err(QuoteError::InvalidFaceAmount(query.requested_face_amount));
    }
    Ok(())
}

fn filter_matches(value: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => value.map(str::trim) == Some(w.trim()),
    }
}

fn row_matches(row: &ReferenceRow, query: &Query, scaling: ScalingPolicy) -> bool {
    row.sex == query.sex
        && row.age == query.age
        && row.pay_years == query.pay_years
        && filter_matches(row.company.as_deref(), query.company.as_deref())
        && filter_matches(row.product.as_deref(), query.product.as_deref())
        && match scaling {
            ScalingPolicy::Linear => true,
            ScalingPolicy::ExactBracket => row.base_face_amount == query.requested_face_amount,
        }
}

fn scale_row(index: usize, row: &ReferenceRow, query: &Query, includes_bonus: bool) -> Result<Quote, QuoteError> {
    let requested = query.requested_face_amount;
    let base = row.base_face_amount;
    let overflow = || QuoteError::Overflow { line: row.line };

    let scale = |value: Decimal| -> Result<Decimal, QuoteError> {
        if requested == base {
            return Ok(value);
        }
        value
            .checked_mul(requested)
            .and_then(|v| v.checked_div(base))
            .ok_or_else(overflow)
    };

    let milestones = row
        .milestones
        .iter()
        .filter(|(year, _)| {
            query
                .milestone_years
                .as_ref()
                .map_or(true, |wanted| wanted.contains(*year))
        })
        .map(|(&policy_year, values)| {
            Ok(MilestoneQuote {
                policy_year,
                surrender_value: scale(values.surrender_value)?,
                death_benefit: scale(values.death_benefit)?,
                bonus: scale(values.bonus)?,
            })
        })
        .collect::<Result<Vec<_>, QuoteError>>()?;

    Ok(Quote {
        company: row.company.clone(),
        product: row.product.clone(),
        sex: row.sex,
        age: row.age,
        pay_years: row.pay_years,
        base_face_amount: base,
        requested_face_amount: requested,
        annual_premium: scale(row.annual_premium)?,
        milestones,
        includes_bonus,
        table_index: index,
    })
}
