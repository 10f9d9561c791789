//! Reference rate tables: canonical row model, column synonyms, and loading
//!
//! A reference table holds one row per (company, product, sex, age, pay-years)
//! combination. Monetary figures on a row are denominated for the row's base
//! face amount and are only ever scaled by the quote resolver, never mutated.

mod synonyms;
pub mod loader;
pub mod generator;

pub use synonyms::{CanonicalField, HeaderMatch, HeaderSpelling, MilestoneField, SynonymTable};
pub use loader::{load, load_from_path, load_from_reader, LoadReport, LoadedTable, LoaderConfig, TableSource};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Highest issue age a row may carry
pub const MAX_AGE: u8 = 120;

/// Sex of the insured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    /// Parse any of the spellings seen in rate sheets
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        match v {
            "男" | "男性" => return Some(Sex::Male),
            "女" | "女性" => return Some(Sex::Female),
            _ => {}
        }
        match v.to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Sex::Male),
            "f" | "female" => Some(Sex::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sex::parse(s).ok_or_else(|| format!("unrecognised sex: {}", s))
    }
}

/// Values stored for one milestone policy year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MilestoneValues {
    /// Cash value payable on surrender at this policy year
    pub surrender_value: Decimal,
    pub death_benefit: Decimal,
    /// Declared-rate supplemental payout
    pub bonus: Decimal,
}

/// One rate-table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub company: Option<String>,
    pub product: Option<String>,
    pub sex: Sex,
    pub age: u8,
    pub pay_years: u32,

    /// Face amount the monetary figures below are denominated for
    pub base_face_amount: Decimal,

    pub annual_premium: Decimal,

    /// Values by policy year
    pub milestones: BTreeMap<u32, MilestoneValues>,

    /// 1-based source line (0 for rows built in memory)
    #[serde(default)]
    pub line: u64,
}

impl ReferenceRow {
    pub fn new(sex: Sex, age: u8, pay_years: u32, base_face_amount: Decimal, annual_premium: Decimal) -> Self {
        Self {
            company: None,
            product: None,
            sex,
            age,
            pay_years,
            base_face_amount,
            annual_premium,
            milestones: BTreeMap::new(),
            line: 0,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_milestone(mut self, policy_year: u32, values: MilestoneValues) -> Self {
        self.milestones.insert(policy_year, values);
        self
    }

    /// Uniqueness key within a table
    pub fn key(&self) -> RowKey {
        (
            self.company.clone(),
            self.product.clone(),
            self.sex,
            self.age,
            self.pay_years,
            self.base_face_amount.normalize(),
        )
    }

    /// Key of the plan and insured, ignoring the face-amount bracket
    pub fn plan_key(&self) -> PlanKey {
        (
            self.company.clone(),
            self.product.clone(),
            self.sex,
            self.age,
            self.pay_years,
        )
    }
}

/// (company, product, sex, age, pay_years, base_face_amount)
pub type RowKey = (Option<String>, Option<String>, Sex, u8, u32, Decimal);

/// (company, product, sex, age, pay_years)
pub type PlanKey = (Option<String>, Option<String>, Sex, u8, u32);

/// Which milestone columns the source carried
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MilestoneColumns {
    pub years: BTreeSet<u32>,
    pub surrender_value: bool,
    pub death_benefit: bool,
    pub bonus: bool,
}

/// Immutable, load-ordered collection of reference rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceTable {
    rows: Vec<ReferenceRow>,
    columns: MilestoneColumns,
}

impl ReferenceTable {
    pub fn new(rows: Vec<ReferenceRow>, columns: MilestoneColumns) -> Self {
        Self { rows, columns }
    }

    /// Build a table from in-memory rows, deriving the column set from them
    pub fn from_rows(rows: Vec<ReferenceRow>) -> Self {
        let mut columns = MilestoneColumns::default();
        for row in &rows {
            for (&year, values) in &row.milestones {
                columns.years.insert(year);
                columns.surrender_value = true;
                columns.death_benefit |= !values.death_benefit.is_zero();
                columns.bonus |= !values.bonus.is_zero();
            }
        }
        Self { rows, columns }
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn columns(&self) -> &MilestoneColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct companies in load order
    pub fn companies(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for company in self.rows.iter().filter_map(|r| r.company.as_deref()) {
            if !seen.contains(&company) {
                seen.push(company);
            }
        }
        seen
    }

    /// Distinct (company, product) pairs in load order
    pub fn products(&self) -> Vec<(Option<&str>, Option<&str>)> {
        let mut seen = Vec::new();
        for row in &self.rows {
            let pair = (row.company.as_deref(), row.product.as_deref());
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
        seen
    }
}
