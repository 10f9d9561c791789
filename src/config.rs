//! Engine configuration
//!
//! Values come from a JSON document or from `QUOTE_*` environment variables.
//! Absent or unparsable variables fall back to the defaults below.

use crate::quote::{ResolverConfig, ScalingPolicy};
use crate::table::loader::DEFAULT_TABLE_PATH;
use crate::table::{LoaderConfig, TableSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;

pub const ENV_TABLE: &str = "QUOTE_TABLE";
pub const ENV_DELIMITER: &str = "QUOTE_DELIMITER";
pub const ENV_PAY_YEARS: &str = "QUOTE_PAY_YEARS";
pub const ENV_BASE_FACE_AMOUNT: &str = "QUOTE_BASE_FACE_AMOUNT";
pub const ENV_SCALING: &str = "QUOTE_SCALING";
pub const ENV_MILESTONE_YEARS: &str = "QUOTE_MILESTONE_YEARS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Local path or http(s) URL of the reference table
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default)]
    pub delimiter: Option<char>,

    #[serde(default)]
    pub allowed_pay_years: Option<BTreeSet<u32>>,

    #[serde(default)]
    pub default_base_face_amount: Option<Decimal>,

    #[serde(default)]
    pub scaling: ScalingPolicy,

    /// Milestone years returned when a query does not name its own
    #[serde(default)]
    pub milestone_years: Option<BTreeSet<u32>>,
}

fn default_table() -> String {
    DEFAULT_TABLE_PATH.to_string()
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            delimiter: None,
            allowed_pay_years: None,
            default_base_face_amount: None,
            scaling: ScalingPolicy::default(),
            milestone_years: None,
        }
    }
}

impl QuoteConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            table: lookup(ENV_TABLE)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.table),
            delimiter: lookup(ENV_DELIMITER).and_then(|s| parse_delimiter(&s)),
            allowed_pay_years: lookup(ENV_PAY_YEARS).and_then(|s| parse_year_list(&s)),
            default_base_face_amount: lookup(ENV_BASE_FACE_AMOUNT)
                .and_then(|s| s.trim().parse::<Decimal>().ok())
                .filter(|d| d.is_sign_positive() && !d.is_zero()),
            scaling: lookup(ENV_SCALING)
                .and_then(|s| parse_scaling(&s))
                .unwrap_or(defaults.scaling),
            milestone_years: lookup(ENV_MILESTONE_YEARS).and_then(|s| parse_year_list(&s)),
        }
    }

    pub fn source(&self) -> TableSource {
        TableSource::parse(&self.table)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            delimiter: self.delimiter.and_then(|c| u8::try_from(c).ok()),
            allowed_pay_years: self.allowed_pay_years.clone(),
            default_base_face_amount: self.default_base_face_amount,
            ..Default::default()
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig { scaling: self.scaling }
    }
}

/// `linear` or `exact` (also `exact_bracket`)
pub fn parse_scaling(value: &str) -> Option<ScalingPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "linear" => Some(ScalingPolicy::Linear),
        "exact" | "exact_bracket" | "exact-bracket" => Some(ScalingPolicy::ExactBracket),
        _ => None,
    }
}

/// Comma-separated positive integers, e.g. `1,5,10,20`
pub fn parse_year_list(value: &str) -> Option<BTreeSet<u32>> {
    let years = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok().filter(|&y| y > 0))
        .collect::<Option<BTreeSet<u32>>>()?;

    if years.is_empty() {
        None
    } else {
        Some(years)
    }
}

fn parse_delimiter(value: &str) -> Option<char> {
    match value {
        "\\t" | "tab" | "\t" => Some('\t'),
        _ => {
            let mut chars = value.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Some(c),
                _ => None,
            }
        }
    }
}
