//! Presentation: currency rounding, CSV downloads, and plain-text tables
//!
//! Quotes carry exact decimals. Rounding to whole currency units happens only
//! here, at the point values leave the engine.

use crate::quote::Quote;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write as _;
use std::io::Write;

/// Header language for exported files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStyle {
    #[default]
    Chinese,
    English,
}

impl HeaderStyle {
    fn milestone_headers(&self, with_bonus: bool) -> Vec<&'static str> {
        let mut headers = match self {
            HeaderStyle::Chinese => vec!["保單年度", "解約金", "身故保險金"],
            HeaderStyle::English => vec!["policy_year", "surrender_value", "death_benefit"],
        };
        if with_bonus {
            headers.push(match self {
                HeaderStyle::Chinese => "增值回饋分享金",
                HeaderStyle::English => "bonus",
            });
        }
        headers
    }

    fn ranking_headers(&self, policy_year: u32) -> Vec<String> {
        match self {
            HeaderStyle::Chinese => vec![
                "保險公司".to_string(),
                "商品名稱".to_string(),
                "保費".to_string(),
                format!("{}年後解約金", policy_year),
            ],
            HeaderStyle::English => vec![
                "company".to_string(),
                "product".to_string(),
                "annual_premium".to_string(),
                format!("surrender_value_year_{}", policy_year),
            ],
        }
    }
}

/// Round to whole currency units, halves away from zero
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn money(value: Decimal) -> String {
    round_currency(value).normalize().to_string()
}

/// Write the milestone schedule of one quote as CSV
pub fn write_quote_csv<W: Write>(quote: &Quote, writer: W, style: HeaderStyle) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(style.milestone_headers(quote.includes_bonus))?;

    for m in &quote.milestones {
        let mut record = vec![
            m.policy_year.to_string(),
            money(m.surrender_value),
            money(m.death_benefit),
        ];
        if quote.includes_bonus {
            record.push(money(m.bonus));
        }
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}

/// Write a ranked plan list as CSV. Plans without a value at the ranking
/// year get an empty cell.
pub fn write_ranking_csv<W: Write>(
    quotes: &[Quote],
    policy_year: u32,
    writer: W,
    style: HeaderStyle,
) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(style.ranking_headers(policy_year))?;

    for q in quotes {
        out.write_record([
            q.company.clone().unwrap_or_default(),
            q.product.clone().unwrap_or_default(),
            money(q.annual_premium),
            q.surrender_value_at(policy_year).map(money).unwrap_or_default(),
        ])?;
    }

    out.flush()?;
    Ok(())
}

/// Human-readable summary of one quote
pub fn render_quote(quote: &Quote) -> String {
    let mut s = String::new();

    let _ = writeln!(s, "{}", quote.plan_label());
    let _ = writeln!(
        s,
        "  Insured: sex={} age={} pay_years={}",
        quote.sex, quote.age, quote.pay_years
    );
    let _ = writeln!(
        s,
        "  Face amount: {} (table base {})",
        money(quote.requested_face_amount),
        money(quote.base_face_amount)
    );
    let _ = writeln!(
        s,
        "  Annual premium: {}   Total premium: {}",
        money(quote.annual_premium),
        quote.total_premium().map(money).unwrap_or_else(|| "-".to_string())
    );

    if quote.milestones.is_empty() {
        let _ = writeln!(s, "  (no milestone values)");
        return s;
    }

    let _ = write!(s, "  {:>6} {:>14} {:>14}", "Year", "Surrender", "Death");
    if quote.includes_bonus {
        let _ = write!(s, " {:>14}", "Bonus");
    }
    s.push('\n');

    for m in &quote.milestones {
        let _ = write!(
            s,
            "  {:>6} {:>14} {:>14}",
            m.policy_year,
            money(m.surrender_value),
            money(m.death_benefit)
        );
        if quote.includes_bonus {
            let _ = write!(s, " {:>14}", money(m.bonus));
        }
        s.push('\n');
    }
    s
}

/// One line per ranked plan
pub fn render_ranking(quotes: &[Quote], policy_year: u32) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Ranked by surrender value at policy year {}", policy_year);
    for (i, q) in quotes.iter().enumerate() {
        let value = q
            .surrender_value_at(policy_year)
            .map(money)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            s,
            "  {:>2}. {:<24} premium {:>12}  surrender {:>14}",
            i + 1,
            q.plan_label(),
            money(q.annual_premium),
            value
        );
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::MilestoneQuote;
    use crate::table::Sex;
    use rust_decimal_macros::dec;

    fn sample_quote(includes_bonus: bool) -> Quote {
        Quote {
            company: Some("A公司".to_string()),
            product: Some("終身壽險".to_string()),
            sex: Sex::Female,
            age: 40,
            pay_years: 6,
            base_face_amount: dec!(1000000),
            requested_face_amount: dec!(333333),
            annual_premium: dec!(20266.6464),
            milestones: vec![
                MilestoneQuote {
                    policy_year: 1,
                    surrender_value: dec!(4000.5),
                    death_benefit: dec!(333333),
                    bonus: dec!(0),
                },
                MilestoneQuote {
                    policy_year: 10,
                    surrender_value: dec!(123333.21),
                    death_benefit: dec!(339999.66),
                    bonus: dec!(2666.664),
                },
            ],
            includes_bonus,
            table_index: 0,
        }
    }

    #[test]
    fn test_round_currency() {
        assert_eq!(round_currency(dec!(2.5)), dec!(3));
        assert_eq!(round_currency(dec!(-2.5)), dec!(-3));
        assert_eq!(round_currency(dec!(2.4999)), dec!(2));
        assert_eq!(round_currency(dec!(30400)), dec!(30400));
    }

    #[test]
    fn test_quote_csv_chinese_with_bonus() {
        let mut buf = Vec::new();
        write_quote_csv(&sample_quote(true), &mut buf, HeaderStyle::Chinese).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "保單年度,解約金,身故保險金,增值回饋分享金");
        assert_eq!(lines[1], "1,4001,333333,0");
        assert_eq!(lines[2], "10,123333,340000,2667");
    }

    #[test]
    fn test_quote_csv_english_without_bonus() {
        let mut buf = Vec::new();
        write_quote_csv(&sample_quote(false), &mut buf, HeaderStyle::English).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().next(), Some("policy_year,surrender_value,death_benefit"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_ranking_csv_blank_for_missing_year() {
        let mut missing = sample_quote(false);
        missing.company = Some("B公司".to_string());
        missing.milestones.truncate(1);

        let mut buf = Vec::new();
        write_ranking_csv(&[sample_quote(false), missing], 10, &mut buf, HeaderStyle::English).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "company,product,annual_premium,surrender_value_year_10");
        assert_eq!(lines[1], "A公司,終身壽險,20267,123333");
        assert_eq!(lines[2], "B公司,終身壽險,20267,");
    }

    #[test]
    fn test_render_quote() {
        let text = render_quote(&sample_quote(true));
        assert!(text.starts_with("A公司 終身壽險\n"));
        assert!(text.contains("Annual premium: 20267"));
        assert!(text.contains("Total premium: 121600"));
        assert!(text.contains("Bonus"));
        assert!(text.contains("123333"));
    }

    #[test]
    fn test_render_quote_survives_huge_premium() {
        let mut quote = sample_quote(false);
        quote.annual_premium = Decimal::MAX;
        let text = render_quote(&quote);
        assert!(text.contains("Total premium: -"));
    }

    #[test]
    fn test_render_ranking_marks_missing() {
        let mut missing = sample_quote(false);
        missing.milestones.clear();
        let text = render_ranking(&[sample_quote(false), missing], 10);
        assert!(text.contains(" 1. A公司 終身壽險"));
        assert!(text.lines().nth(2).unwrap().ends_with('-'));
    }
}
