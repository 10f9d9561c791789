//! Column synonym table
//!
//! Rate sheets arrive with English or Chinese headers in several spellings.
//! Every header is normalised (see [`normalize_header`]) and then matched
//! against an explicit table of accepted spellings per canonical field.
//! Milestone columns follow a small grammar instead: one keyword naming the
//! value (surrender value, death benefit, bonus) plus a policy year, e.g.
//! `1年後解約金`, `第10年身故保險金`, `sv_5`, `year_20_bonus`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical (non-milestone) columns of a reference table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    Company,
    Product,
    Sex,
    Age,
    PayYears,
    BaseFaceAmount,
    AnnualPremium,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Company,
        CanonicalField::Product,
        CanonicalField::Sex,
        CanonicalField::Age,
        CanonicalField::PayYears,
        CanonicalField::BaseFaceAmount,
        CanonicalField::AnnualPremium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Company => "company",
            CanonicalField::Product => "product",
            CanonicalField::Sex => "sex",
            CanonicalField::Age => "age",
            CanonicalField::PayYears => "pay_years",
            CanonicalField::BaseFaceAmount => "base_face_amount",
            CanonicalField::AnnualPremium => "annual_premium",
        }
    }

    /// Company and product are optional filters; everything else must be present
    pub fn is_required(&self) -> bool {
        !matches!(self, CanonicalField::Company | CanonicalField::Product)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a milestone column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneField {
    SurrenderValue,
    DeathBenefit,
    Bonus,
}

/// One accepted header spelling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpelling {
    /// Normalised spelling
    pub spelling: String,
    /// Multiplier applied to amounts in this column (10 000 for 萬-denominated columns)
    pub unit: Decimal,
}

/// Result of classifying one header cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMatch {
    Field { field: CanonicalField, unit: Decimal },
    Milestone { policy_year: u32, field: MilestoneField },
    Unknown,
}

/// Canonical field → accepted header spellings, plus milestone keywords
#[derive(Debug, Clone)]
pub struct SynonymTable {
    fields: Vec<(CanonicalField, Vec<HeaderSpelling>)>,
    /// (normalised keyword, field), longest keyword first
    milestone_keywords: Vec<(String, MilestoneField)>,
}

const TEN_THOUSAND: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Tokens allowed around the policy year in a milestone header
const MILESTONE_FILLERS: [&str; 9] = ["policyyear", "年後", "年后", "年度", "year", "第", "年", "yr", "y"];

impl Default for SynonymTable {
    fn default() -> Self {
        let mut table = Self {
            fields: Vec::new(),
            milestone_keywords: Vec::new(),
        };

        for s in ["company", "insurer", "insurance_company", "保險公司", "公司"] {
            table.add_spelling(CanonicalField::Company, s, Decimal::ONE);
        }
        for s in ["product", "product_name", "plan", "商品名稱", "商品", "險種", "產品"] {
            table.add_spelling(CanonicalField::Product, s, Decimal::ONE);
        }
        for s in ["sex", "gender", "性別"] {
            table.add_spelling(CanonicalField::Sex, s, Decimal::ONE);
        }
        for s in ["age", "issue_age", "年齡", "投保年齡"] {
            table.add_spelling(CanonicalField::Age, s, Decimal::ONE);
        }
        for s in [
            "pay_years", "pay_period", "payment_period", "payment_years", "premium_term",
            "繳費年期", "繳費期間", "年期",
        ] {
            table.add_spelling(CanonicalField::PayYears, s, Decimal::ONE);
        }
        for s in ["base_face_amount", "face_amount", "insured_amount", "sum_insured", "保額", "投保保額", "保險金額"] {
            table.add_spelling(CanonicalField::BaseFaceAmount, s, Decimal::ONE);
        }
        for s in [
            "投保保額 (萬美元)", "投保保額 (萬)", "保額 (萬)", "保額 (萬美元)",
            "face_amount_10k", "insured_amount_10k",
        ] {
            table.add_spelling(CanonicalField::BaseFaceAmount, s, TEN_THOUSAND);
        }
        for s in ["annual_premium", "premium", "保費", "年繳保費", "年保費", "年繳保險費"] {
            table.add_spelling(CanonicalField::AnnualPremium, s, Decimal::ONE);
        }

        for k in ["解約金", "surrender_value", "surrender", "cash_value", "sv"] {
            table.add_milestone_keyword(MilestoneField::SurrenderValue, k);
        }
        for k in ["身故保險金", "身故金", "death_benefit", "death", "db"] {
            table.add_milestone_keyword(MilestoneField::DeathBenefit, k);
        }
        for k in ["增值回饋分享金", "回饋金", "bonus"] {
            table.add_milestone_keyword(MilestoneField::Bonus, k);
        }

        table
    }
}

impl SynonymTable {
    /// Accept another header spelling for a canonical field
    pub fn add_spelling(&mut self, field: CanonicalField, spelling: &str, unit: Decimal) {
        let spelling = HeaderSpelling {
            spelling: normalize_header(spelling),
            unit,
        };
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some((_, spellings)) => spellings.push(spelling),
            None => self.fields.push((field, vec![spelling])),
        }
    }

    pub fn with_spelling(mut self, field: CanonicalField, spelling: &str, unit: Decimal) -> Self {
        self.add_spelling(field, spelling, unit);
        self
    }

    pub fn add_milestone_keyword(&mut self, field: MilestoneField, keyword: &str) {
        self.milestone_keywords.push((normalize_header(keyword), field));
        self.milestone_keywords
            .sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    }

    /// Accepted spellings for a field
    pub fn spellings(&self, field: CanonicalField) -> &[HeaderSpelling] {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }

    /// Classify a raw header cell
    pub fn classify(&self, header: &str) -> HeaderMatch {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return HeaderMatch::Unknown;
        }

        for (field, spellings) in &self.fields {
            if let Some(s) = spellings.iter().find(|s| s.spelling == normalized) {
                return HeaderMatch::Field { field: *field, unit: s.unit };
            }
        }

        self.classify_milestone(&normalized)
    }

    fn classify_milestone(&self, normalized: &str) -> HeaderMatch {
        let Some((keyword, field)) = self
            .milestone_keywords
            .iter()
            .find(|(k, _)| normalized.contains(k.as_str()))
        else {
            return HeaderMatch::Unknown;
        };

        let mut rest = normalized.replacen(keyword.as_str(), "", 1);
        for filler in MILESTONE_FILLERS {
            rest = rest.replace(filler, "");
        }
        rest = rest.replace(['(', ')'], "");

        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
            return HeaderMatch::Unknown;
        }
        match rest.parse::<u32>() {
            Ok(year) if year > 0 => HeaderMatch::Milestone { policy_year: year, field: *field },
            _ => HeaderMatch::Unknown,
        }
    }
}

/// Normalise a header for lookup: drop BOM, whitespace, `_` and `-`; lowercase
/// ASCII; fold full-width parentheses
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| *c != '\u{feff}' && !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| match c {
            '（' => '(',
            '）' => ')',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(header: &str) -> Option<CanonicalField> {
        match SynonymTable::default().classify(header) {
            HeaderMatch::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    fn milestone(header: &str) -> Option<(u32, MilestoneField)> {
        match SynonymTable::default().classify(header) {
            HeaderMatch::Milestone { policy_year, field } => Some((policy_year, field)),
            _ => None,
        }
    }

    #[test]
    fn test_canonical_spellings() {
        assert_eq!(field("Sex"), Some(CanonicalField::Sex));
        assert_eq!(field("性別"), Some(CanonicalField::Sex));
        assert_eq!(field("\u{feff}保險公司"), Some(CanonicalField::Company));
        assert_eq!(field("Pay Years"), Some(CanonicalField::PayYears));
        assert_eq!(field("pay-years"), Some(CanonicalField::PayYears));
        assert_eq!(field("繳費年期"), Some(CanonicalField::PayYears));
        assert_eq!(field("保費"), Some(CanonicalField::AnnualPremium));
        assert_eq!(field("Annual_Premium"), Some(CanonicalField::AnnualPremium));
        assert_eq!(field("remarks"), None);
    }

    #[test]
    fn test_unit_multiplier() {
        let table = SynonymTable::default();
        assert_eq!(
            table.classify("投保保額 (萬美元)"),
            HeaderMatch::Field { field: CanonicalField::BaseFaceAmount, unit: TEN_THOUSAND }
        );
        assert_eq!(
            table.classify("投保保額（萬美元）"),
            HeaderMatch::Field { field: CanonicalField::BaseFaceAmount, unit: TEN_THOUSAND }
        );
        assert_eq!(
            table.classify("face_amount"),
            HeaderMatch::Field { field: CanonicalField::BaseFaceAmount, unit: Decimal::ONE }
        );
    }

    #[test]
    fn test_milestone_headers() {
        assert_eq!(milestone("1年後解約金"), Some((1, MilestoneField::SurrenderValue)));
        assert_eq!(milestone("30年後解約金"), Some((30, MilestoneField::SurrenderValue)));
        assert_eq!(milestone("第10年身故保險金"), Some((10, MilestoneField::DeathBenefit)));
        assert_eq!(milestone("20年增值回饋分享金"), Some((20, MilestoneField::Bonus)));
        assert_eq!(milestone("sv_5"), Some((5, MilestoneField::SurrenderValue)));
        assert_eq!(milestone("surrender_value_70"), Some((70, MilestoneField::SurrenderValue)));
        assert_eq!(milestone("year_20_bonus"), Some((20, MilestoneField::Bonus)));
        assert_eq!(milestone("death_benefit (40)"), Some((40, MilestoneField::DeathBenefit)));
    }

    #[test]
    fn test_non_milestone_headers() {
        assert_eq!(milestone("bonus"), None);
        assert_eq!(milestone("bonus_text"), None);
        assert_eq!(milestone("sv_0"), None);
        assert_eq!(SynonymTable::default().classify(""), HeaderMatch::Unknown);
    }

    #[test]
    fn test_custom_spelling() {
        let table = SynonymTable::default().with_spelling(CanonicalField::Age, "Alter", Decimal::ONE);
        assert!(matches!(
            table.classify("ALTER"),
            HeaderMatch::Field { field: CanonicalField::Age, .. }
        ));
    }
}
