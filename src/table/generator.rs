//! Synthetic rate table generator
//!
//! Produces the demonstration rate sheet used to seed shared spreadsheets:
//! three companies × three products × both sexes × ages 18–68 (step 2) ×
//! pay periods {6, 12, 20} × face amounts {50, 100, 200, 500} 萬.
//!
//! Premium formula: `base = 1000 + 5·age + 20·pay_years`, scaled by
//! `face_amount / 100` (face in 萬). Surrender values are fixed multiples of
//! the annual premium at policy years 1/5/10/20/30.

use super::{MilestoneValues, ReferenceRow, Sex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Face amounts in the generated sheet are quoted in 萬 (10 000)
const FACE_UNIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Parameters for generating a rate sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorParams {
    #[serde(default = "default_companies")]
    pub companies: Vec<String>,

    #[serde(default = "default_products")]
    pub products: Vec<String>,

    /// Issue ages (inclusive start, exclusive end, step)
    #[serde(default = "default_age_range")]
    pub ages: (u8, u8, u8),

    #[serde(default = "default_pay_years")]
    pub pay_years: Vec<u32>,

    /// Face amounts in 萬
    #[serde(default = "default_face_amounts")]
    pub face_amounts: Vec<u32>,

    /// (policy year, multiple of annual premium)
    #[serde(default = "default_surrender_multiples")]
    pub surrender_multiples: Vec<(u32, Decimal)>,
}

fn default_companies() -> Vec<String> {
    vec!["A公司".to_string(), "B公司".to_string(), "C公司".to_string()]
}
fn default_products() -> Vec<String> {
    vec!["終身壽險".to_string(), "定期壽險".to_string(), "投資型壽險".to_string()]
}
fn default_age_range() -> (u8, u8, u8) {
    (18, 70, 2)
}
fn default_pay_years() -> Vec<u32> {
    vec![6, 12, 20]
}
fn default_face_amounts() -> Vec<u32> {
    vec![50, 100, 200, 500]
}
fn default_surrender_multiples() -> Vec<(u32, Decimal)> {
    vec![
        (1, Decimal::new(2, 1)),
        (5, Decimal::new(15, 1)),
        (10, Decimal::new(3, 0)),
        (20, Decimal::new(5, 0)),
        (30, Decimal::new(7, 0)),
    ]
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            companies: default_companies(),
            products: default_products(),
            ages: default_age_range(),
            pay_years: default_pay_years(),
            face_amounts: default_face_amounts(),
            surrender_multiples: default_surrender_multiples(),
        }
    }
}

impl GeneratorParams {
    fn ages(&self) -> impl Iterator<Item = u8> {
        let (start, end, step) = self.ages;
        (start..end).step_by(step.max(1) as usize)
    }
}

/// Annual premium for a face amount quoted in 萬
pub fn formula_premium(age: u8, pay_years: u32, face_amount_wan: u32) -> Decimal {
    let base = Decimal::from(1000 + 5 * age as u32 + 20 * pay_years);
    base * Decimal::from(face_amount_wan) / Decimal::from(100)
}

/// Generate rows in sheet order (company, product, sex, age, pay period, face)
pub fn generate(params: &GeneratorParams) -> Vec<ReferenceRow> {
    let mut rows = Vec::new();

    for company in &params.companies {
        for product in &params.products {
            for sex in [Sex::Male, Sex::Female] {
                for age in params.ages() {
                    for &pay_years in &params.pay_years {
                        for &face in &params.face_amounts {
                            let premium = formula_premium(age, pay_years, face);
                            let mut row = ReferenceRow::new(
                                sex,
                                age,
                                pay_years,
                                Decimal::from(face) * FACE_UNIT,
                                premium,
                            )
                            .with_company(company.as_str())
                            .with_product(product.as_str());

                            for &(year, multiple) in &params.surrender_multiples {
                                row.milestones.insert(year, MilestoneValues {
                                    surrender_value: premium * multiple,
                                    ..Default::default()
                                });
                            }
                            rows.push(row);
                        }
                    }
                }
            }
        }
    }

    log::debug!("Generated {} synthetic rate rows", rows.len());
    rows
}

/// Write rows with the sheet's Chinese headers
pub fn write_csv<W: Write>(rows: &[ReferenceRow], params: &GeneratorParams, writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = ["保險公司", "商品名稱", "性別", "年齡", "繳費年期", "投保保額 (萬美元)", "保費"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (year, _) in &params.surrender_multiples {
        header.push(format!("{}年後解約金", year));
    }
    out.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.company.clone().unwrap_or_default(),
            row.product.clone().unwrap_or_default(),
            match row.sex {
                Sex::Male => "男".to_string(),
                Sex::Female => "女".to_string(),
            },
            row.age.to_string(),
            row.pay_years.to_string(),
            (row.base_face_amount / FACE_UNIT).normalize().to_string(),
            row.annual_premium.normalize().to_string(),
        ];
        for (year, _) in &params.surrender_multiples {
            record.push(
                row.milestones
                    .get(year)
                    .map(|m| m.surrender_value.normalize().to_string())
                    .unwrap_or_default(),
            );
        }
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{load_from_reader, LoaderConfig};
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_generation() {
        let rows = generate(&GeneratorParams::default());
        // 3 companies × 3 products × 2 sexes × 26 ages × 3 periods × 4 faces
        assert_eq!(rows.len(), 5616);

        let first = &rows[0];
        assert_eq!(first.company.as_deref(), Some("A公司"));
        assert_eq!(first.sex, Sex::Male);
        assert_eq!(first.age, 18);
        assert_eq!(first.base_face_amount, dec!(500000));
        // (1000 + 90 + 120) × 0.5
        assert_eq!(first.annual_premium, dec!(605));
        assert_eq!(first.milestones[&1].surrender_value, dec!(121));
        assert_eq!(first.milestones[&30].surrender_value, dec!(4235));

        assert!(rows.iter().all(|r| r.age <= 68));
    }

    #[test]
    fn test_formula_is_linear_in_face() {
        assert_eq!(formula_premium(40, 6, 100) * dec!(5), formula_premium(40, 6, 500));
        assert_eq!(formula_premium(40, 6, 100), dec!(1320));
    }

    #[test]
    fn test_written_sheet_reloads() {
        let params = GeneratorParams {
            companies: vec!["A公司".to_string()],
            products: vec!["終身壽險".to_string()],
            ages: (40, 42, 2),
            ..Default::default()
        };
        let rows = generate(&params);

        let mut buf = Vec::new();
        write_csv(&rows, &params, &mut buf).unwrap();

        let loaded = load_from_reader(buf.as_slice(), &LoaderConfig::default()).unwrap();
        assert_eq!(loaded.report.rows_dropped, 0);

        let reloaded: Vec<ReferenceRow> = loaded
            .table
            .rows()
            .iter()
            .cloned()
            .map(|mut r| {
                r.line = 0;
                r
            })
            .collect();
        assert_eq!(reloaded, rows);
    }
}
