//! Query and quote records

use crate::table::Sex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Milestone policy years shown on standard illustrations
pub const STANDARD_MILESTONE_YEARS: [u32; 7] = [1, 5, 10, 20, 30, 40, 70];

/// A user-supplied quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub sex: Sex,
    pub age: u8,
    pub pay_years: u32,

    /// Face amount the quote is scaled to; must be positive
    pub requested_face_amount: Decimal,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub product: Option<String>,

    /// Restrict the milestone years returned; `None` returns every year the row has
    #[serde(default)]
    pub milestone_years: Option<BTreeSet<u32>>,
}

impl Query {
    pub fn new(sex: Sex, age: u8, pay_years: u32, requested_face_amount: Decimal) -> Self {
        Self {
            sex,
            age,
            pay_years,
            requested_face_amount,
            company: None,
            product: None,
            milestone_years: None,
        }
    }

    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn years<I: IntoIterator<Item = u32>>(mut self, years: I) -> Self {
        self.milestone_years = Some(years.into_iter().collect());
        self
    }

    /// Drop company/product filters, e.g. to compare every plan for the same insured
    pub fn without_filters(&self) -> Self {
        Self {
            company: None,
            product: None,
            ..self.clone()
        }
    }
}

/// Scaled values for one milestone policy year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneQuote {
    pub policy_year: u32,
    pub surrender_value: Decimal,
    pub death_benefit: Decimal,
    pub bonus: Decimal,
}

/// Resolver output: one reference row scaled to the requested face amount
///
/// Values are exact decimals; rounding happens only at presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub company: Option<String>,
    pub product: Option<String>,
    pub sex: Sex,
    pub age: u8,
    pub pay_years: u32,

    /// Face amount of the matched row
    pub base_face_amount: Decimal,
    pub requested_face_amount: Decimal,

    pub annual_premium: Decimal,

    /// Ascending by policy year
    pub milestones: Vec<MilestoneQuote>,

    /// Whether the source table carried bonus columns
    pub includes_bonus: bool,

    /// Load-order position of the matched row
    pub table_index: usize,
}

impl Quote {
    pub fn milestone(&self, policy_year: u32) -> Option<&MilestoneQuote> {
        self.milestones.iter().find(|m| m.policy_year == policy_year)
    }

    pub fn surrender_value_at(&self, policy_year: u32) -> Option<Decimal> {
        self.milestone(policy_year).map(|m| m.surrender_value)
    }

    /// Premiums paid over the whole pay period; `None` on decimal overflow
    pub fn total_premium(&self) -> Option<Decimal> {
        self.annual_premium.checked_mul(Decimal::from(self.pay_years))
    }

    /// Short label such as `A公司 終身壽險`
    pub fn plan_label(&self) -> String {
        match (&self.company, &self.product) {
            (Some(c), Some(p)) => format!("{} {}", c, p),
            (Some(c), None) => c.clone(),
            (None, Some(p)) => p.clone(),
            (None, None) => "-".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_query_builder() {
        let q = Query::new(Sex::Female, 40, 6, dec!(500000))
            .company("A公司")
            .product("終身壽險")
            .years([1, 5, 10]);

        assert_eq!(q.company.as_deref(), Some("A公司"));
        assert_eq!(q.milestone_years.as_ref().map(|y| y.len()), Some(3));

        let open = q.without_filters();
        assert!(open.company.is_none());
        assert!(open.product.is_none());
        assert_eq!(open.milestone_years, q.milestone_years);
    }

    #[test]
    fn test_total_premium_checked() {
        let mut quote = Quote {
            company: None,
            product: None,
            sex: Sex::Male,
            age: 30,
            pay_years: 20,
            base_face_amount: dec!(1),
            requested_face_amount: dec!(1),
            annual_premium: dec!(1500.25),
            milestones: Vec::new(),
            includes_bonus: false,
            table_index: 0,
        };
        assert_eq!(quote.total_premium(), Some(dec!(30005)));

        quote.annual_premium = Decimal::MAX;
        assert_eq!(quote.total_premium(), None);
    }

    #[test]
    fn test_query_from_json() {
        let q: Query = serde_json::from_str(
            r#"{"sex":"F","age":40,"pay_years":6,"requested_face_amount":"500000"}"#,
        )
        .unwrap();
        assert_eq!(q, Query::new(Sex::Female, 40, 6, dec!(500000)));
    }
}
