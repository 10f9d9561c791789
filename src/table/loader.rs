//! Reference table loader
//!
//! Turns a delimited rate sheet (local file, remote sheet export, or raw bytes)
//! into an immutable [`ReferenceTable`]. Headers are mapped through the
//! [`SynonymTable`]; malformed rows are dropped and reported, never fatal.

use super::synonyms::{CanonicalField, HeaderMatch, MilestoneField, SynonymTable};
use super::{MilestoneColumns, MilestoneValues, ReferenceRow, ReferenceTable, PlanKey, RowKey, Sex, MAX_AGE};
use crate::error::{LoadError, RowError, RowErrorKind, SchemaError};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default path to the reference rate table
pub const DEFAULT_TABLE_PATH: &str = "data/reference_rates.csv";

/// Where a reference table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Path(PathBuf),
    /// Remote sheet export, fetched with one blocking GET
    Url(String),
    Bytes(Vec<u8>),
}

impl TableSource {
    /// Interpret a path-or-URL string
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            TableSource::Url(trimmed.to_string())
        } else {
            TableSource::Path(PathBuf::from(trimmed))
        }
    }

    pub fn location(&self) -> String {
        match self {
            TableSource::Path(p) => p.display().to_string(),
            TableSource::Url(u) => u.clone(),
            TableSource::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl Default for TableSource {
    fn default() -> Self {
        TableSource::Path(PathBuf::from(DEFAULT_TABLE_PATH))
    }
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}

/// Loader settings
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    pub synonyms: SynonymTable,

    /// Field delimiter; `None` means comma, or tab for `.tsv` paths
    pub delimiter: Option<u8>,

    /// Pay periods on offer; `None` accepts any positive period
    pub allowed_pay_years: Option<BTreeSet<u32>>,

    /// Face amount assumed when the source has no face-amount column
    pub default_base_face_amount: Option<Decimal>,
}

/// Per-load diagnostics reported alongside the table
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Non-blank data rows seen
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rows_dropped: usize,
    /// Rows whose key repeats an earlier row; kept, the first one wins lookups
    pub duplicate_keys: usize,
    /// Rows sharing (company, product, sex, age, pay_years) with an earlier
    /// row but quoting another face amount
    pub bracketed_keys: usize,
    pub errors: Vec<RowError>,
    /// Header cells that matched nothing in the synonym table
    pub ignored_columns: Vec<String>,
}

/// A loaded table plus its report
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: ReferenceTable,
    pub report: LoadReport,
}

/// Load a reference table from any supported source
pub fn load(source: &TableSource, config: &LoaderConfig) -> Result<LoadedTable, LoadError> {
    match source {
        TableSource::Path(path) => load_from_path(path, config),
        TableSource::Url(url) => {
            let bytes = fetch_url(url)?;
            parse_table(bytes.as_slice(), config, config.delimiter.unwrap_or(b','), url)
        }
        TableSource::Bytes(bytes) => {
            parse_table(bytes.as_slice(), config, config.delimiter.unwrap_or(b','), "<bytes>")
        }
    }
}

/// Load a reference table from a local file
pub fn load_from_path<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<LoadedTable, LoadError> {
    let path = path.as_ref();
    let location = path.display().to_string();
    let file = File::open(path).map_err(|e| LoadError::unavailable(location.as_str(), e))?;

    let is_tsv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    let delimiter = config.delimiter.unwrap_or(if is_tsv { b'\t' } else { b',' });

    parse_table(file, config, delimiter, &location)
}

/// Load a reference table from any reader (string buffer, network body, ...)
pub fn load_from_reader<R: Read>(reader: R, config: &LoaderConfig) -> Result<LoadedTable, LoadError> {
    parse_table(reader, config, config.delimiter.unwrap_or(b','), "<reader>")
}

fn fetch_url(url: &str) -> Result<Vec<u8>, LoadError> {
    log::debug!("Fetching reference table from {}", url);
    let response = reqwest::blocking::get(url).map_err(|e| LoadError::unavailable(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::unavailable(url, format!("HTTP status {}", status)));
    }

    let bytes = response.bytes().map_err(|e| LoadError::unavailable(url, e))?;
    Ok(bytes.to_vec())
}

/// Column positions resolved from the header row
struct Layout {
    fields: HashMap<CanonicalField, (usize, Decimal)>,
    milestones: Vec<(usize, u32, MilestoneField)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord, synonyms: &SynonymTable, report: &mut LoadReport) -> Self {
        let mut fields = HashMap::new();
        let mut milestones = Vec::new();

        for (idx, header) in headers.iter().enumerate() {
            match synonyms.classify(header) {
                HeaderMatch::Field { field, unit } => {
                    if fields.contains_key(&field) {
                        log::debug!("Ignoring repeated {} column {:?}", field, header);
                        report.ignored_columns.push(header.to_string());
                    } else {
                        fields.insert(field, (idx, unit));
                    }
                }
                HeaderMatch::Milestone { policy_year, field } => {
                    milestones.push((idx, policy_year, field));
                }
                HeaderMatch::Unknown => {
                    if !header.trim().is_empty() {
                        log::debug!("Ignoring unrecognised column {:?}", header);
                        report.ignored_columns.push(header.to_string());
                    }
                }
            }
        }

        Self { fields, milestones }
    }

    fn missing(&self, config: &LoaderConfig) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| f.is_required() && !self.fields.contains_key(f))
            .filter(|f| !(*f == CanonicalField::BaseFaceAmount && config.default_base_face_amount.is_some()))
            .collect()
    }

    fn columns(&self) -> MilestoneColumns {
        let mut columns = MilestoneColumns::default();
        for &(_, year, field) in &self.milestones {
            columns.years.insert(year);
            match field {
                MilestoneField::SurrenderValue => columns.surrender_value = true,
                MilestoneField::DeathBenefit => columns.death_benefit = true,
                MilestoneField::Bonus => columns.bonus = true,
            }
        }
        columns
    }
}

fn parse_table<R: Read>(
    reader: R,
    config: &LoaderConfig,
    delimiter: u8,
    location: &str,
) -> Result<LoadedTable, LoadError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let mut report = LoadReport::default();

    let headers = reader
        .headers()
        .map_err(|e| LoadError::unavailable(location, e))?
        .clone();
    let layout = Layout::from_headers(&headers, &config.synonyms, &mut report);

    let missing = layout.missing(config);
    if !missing.is_empty() {
        return Err(SchemaError { missing }.into());
    }

    let mut rows = Vec::new();
    let mut seen_keys: HashSet<RowKey> = HashSet::new();
    let mut seen_plans: HashSet<PlanKey> = HashSet::new();

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx as u64 + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(LoadError::unavailable(location, e)),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                report.rows_read += 1;
                drop_row(&mut report, RowError { line, kind: RowErrorKind::Malformed(e.to_string()) });
                continue;
            }
        };

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        report.rows_read += 1;

        let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
        match parse_row(&record, &layout, config, line) {
            Ok(row) => {
                let plan_is_new = seen_plans.insert(row.plan_key());
                if !seen_keys.insert(row.key()) {
                    log::warn!("{}: line {} repeats an earlier rate key", location, line);
                    report.duplicate_keys += 1;
                } else if !plan_is_new {
                    log::debug!("{}: line {} adds a face-amount bracket", location, line);
                    report.bracketed_keys += 1;
                }
                rows.push(row);
            }
            Err(kind) => drop_row(&mut report, RowError { line, kind }),
        }
    }

    report.rows_loaded = rows.len();
    log::info!(
        "Loaded {} reference rows from {} ({} dropped, {} duplicate keys)",
        report.rows_loaded,
        location,
        report.rows_dropped,
        report.duplicate_keys
    );

    Ok(LoadedTable {
        table: ReferenceTable::new(rows, layout.columns()),
        report,
    })
}

fn drop_row(report: &mut LoadReport, error: RowError) {
    log::warn!("Dropping reference row: {}", error);
    report.rows_dropped += 1;
    report.errors.push(error);
}

fn cell<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or("").trim()
}

fn field_cell<'r>(record: &'r StringRecord, layout: &Layout, field: CanonicalField) -> Option<(&'r str, Decimal)> {
    layout
        .fields
        .get(&field)
        .map(|&(idx, unit)| (cell(record, idx), unit))
}

fn parse_row(
    record: &StringRecord,
    layout: &Layout,
    config: &LoaderConfig,
    line: u64,
) -> Result<ReferenceRow, RowErrorKind> {
    let text = |field: CanonicalField| -> Option<String> {
        field_cell(record, layout, field)
            .map(|(v, _)| v)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let sex_raw = field_cell(record, layout, CanonicalField::Sex).map(|(v, _)| v).unwrap_or("");
    let sex = Sex::parse(sex_raw).ok_or_else(|| RowErrorKind::UnmappableSex(sex_raw.to_string()))?;

    let age_raw = field_cell(record, layout, CanonicalField::Age).map(|(v, _)| v).unwrap_or("");
    let age = parse_integer(CanonicalField::Age.as_str(), age_raw)?;
    if !(0..=MAX_AGE as i64).contains(&age) {
        return Err(out_of_range(CanonicalField::Age.as_str(), age));
    }

    let pay_raw = field_cell(record, layout, CanonicalField::PayYears).map(|(v, _)| v).unwrap_or("");
    let pay_years = parse_integer(CanonicalField::PayYears.as_str(), pay_raw)?;
    if pay_years <= 0 || pay_years > u32::MAX as i64 {
        return Err(out_of_range(CanonicalField::PayYears.as_str(), pay_years));
    }
    let pay_years = pay_years as u32;
    if let Some(allowed) = &config.allowed_pay_years {
        if !allowed.contains(&pay_years) {
            return Err(RowErrorKind::PayYearsNotAllowed(pay_years));
        }
    }

    let base_face_amount = match field_cell(record, layout, CanonicalField::BaseFaceAmount) {
        Some((raw, unit)) => {
            let name = CanonicalField::BaseFaceAmount.as_str();
            let amount = parse_amount(name, raw)?.ok_or_else(|| RowErrorKind::MissingValue(name.to_string()))?;
            apply_unit(name, amount, unit)?
        }
        None => config
            .default_base_face_amount
            .ok_or_else(|| RowErrorKind::MissingValue(CanonicalField::BaseFaceAmount.as_str().to_string()))?,
    };
    if base_face_amount <= Decimal::ZERO {
        return Err(out_of_range(CanonicalField::BaseFaceAmount.as_str(), base_face_amount));
    }

    let annual_premium = {
        let name = CanonicalField::AnnualPremium.as_str();
        let (raw, unit) = field_cell(record, layout, CanonicalField::AnnualPremium).unwrap_or(("", Decimal::ONE));
        let amount = parse_amount(name, raw)?.ok_or_else(|| RowErrorKind::MissingValue(name.to_string()))?;
        apply_unit(name, amount, unit)?
    };

    let mut row = ReferenceRow::new(sex, age as u8, pay_years, base_face_amount, annual_premium);
    row.company = text(CanonicalField::Company);
    row.product = text(CanonicalField::Product);
    row.line = line;

    for &(idx, year, field) in &layout.milestones {
        let name = milestone_name(year, field);
        let Some(amount) = parse_amount(&name, cell(record, idx))? else {
            continue;
        };
        let values: &mut MilestoneValues = row.milestones.entry(year).or_default();
        match field {
            MilestoneField::SurrenderValue => values.surrender_value = amount,
            MilestoneField::DeathBenefit => values.death_benefit = amount,
            MilestoneField::Bonus => values.bonus = amount,
        }
    }

    Ok(row)
}

fn milestone_name(year: u32, field: MilestoneField) -> String {
    let label = match field {
        MilestoneField::SurrenderValue => "surrender_value",
        MilestoneField::DeathBenefit => "death_benefit",
        MilestoneField::Bonus => "bonus",
    };
    format!("{}[{}]", label, year)
}

fn out_of_range(field: &str, value: impl fmt::Display) -> RowErrorKind {
    RowErrorKind::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Parse an integer cell, accepting `40.0` and a trailing `歲`/`岁`/`年`
fn parse_integer(field: &str, raw: &str) -> Result<i64, RowErrorKind> {
    if raw.is_empty() {
        return Err(RowErrorKind::MissingValue(field.to_string()));
    }
    let invalid = || RowErrorKind::InvalidInteger {
        field: field.to_string(),
        value: raw.to_string(),
    };

    let trimmed = raw.trim_end_matches(['歲', '岁', '年']).trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }

    let d = Decimal::from_str(trimmed).map_err(|_| invalid())?;
    if !d.fract().is_zero() {
        return Err(invalid());
    }
    d.to_i64().ok_or_else(invalid)
}

/// Parse a monetary cell. Empty cells are `None`; negatives are rejected.
fn parse_amount(field: &str, raw: &str) -> Result<Option<Decimal>, RowErrorKind> {
    if raw.is_empty() {
        return Ok(None);
    }

    let cleaned: String = raw
        .trim_start_matches("US$")
        .trim_start_matches("NT$")
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let amount = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| RowErrorKind::InvalidAmount {
            field: field.to_string(),
            value: raw.to_string(),
        })?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(out_of_range(field, amount));
    }
    Ok(Some(amount))
}

fn apply_unit(field: &str, amount: Decimal, unit: Decimal) -> Result<Decimal, RowErrorKind> {
    amount
        .checked_mul(unit)
        .ok_or_else(|| out_of_range(field, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn load_str(csv: &str) -> Result<LoadedTable, LoadError> {
        load_from_reader(csv.as_bytes(), &LoaderConfig::default())
    }

    #[test]
    fn test_load_default_table() {
        let loaded = load_from_path(DEFAULT_TABLE_PATH, &LoaderConfig::default())
            .expect("Failed to load default reference table");

        assert!(loaded.table.len() >= 8);
        assert_eq!(loaded.report.rows_dropped, 0);
        assert_eq!(loaded.report.duplicate_keys, 0);

        let columns = loaded.table.columns();
        assert!(columns.death_benefit);
        assert!(columns.bonus);
        assert!(columns.years.contains(&30));

        let first = &loaded.table.rows()[0];
        assert_eq!(first.company.as_deref(), Some("A公司"));
        assert_eq!(first.sex, Sex::Female);
        assert_eq!(first.annual_premium, dec!(60800));
        assert_eq!(first.line, 2);
    }

    #[test]
    fn test_chinese_headers_with_unit_and_bom() {
        let csv = "\u{feff}保險公司,商品名稱,性別,年齡,繳費年期,投保保額 (萬美元),保費,1年後解約金,5年後解約金\n\
                   A公司,終身壽險,男,18,6,50,605.0,121.0,907.5\n";
        let loaded = load_str(csv).unwrap();

        let row = &loaded.table.rows()[0];
        assert_eq!(row.company.as_deref(), Some("A公司"));
        assert_eq!(row.product.as_deref(), Some("終身壽險"));
        assert_eq!(row.sex, Sex::Male);
        assert_eq!(row.age, 18);
        assert_eq!(row.pay_years, 6);
        assert_eq!(row.base_face_amount, dec!(500000));
        assert_eq!(row.annual_premium, dec!(605));
        assert_eq!(row.milestones[&5].surrender_value, dec!(907.5));
        assert!(!loaded.table.columns().bonus);
    }

    #[test]
    fn test_missing_columns_listed() {
        let err = load_str("company,age,face_amount,premium\nA,40,100,1\n").unwrap_err();
        match err {
            LoadError::Schema(schema) => {
                assert_eq!(schema.missing, vec![CanonicalField::Sex, CanonicalField::PayYears]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_source_is_schema_error() {
        let err = load_str("").unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
    }

    #[test]
    fn test_default_face_amount_fills_missing_column() {
        let config = LoaderConfig {
            default_base_face_amount: Some(dec!(1000000)),
            ..Default::default()
        };
        let loaded = load_from_reader("sex,age,pay_years,premium\nF,40,6,60800\n".as_bytes(), &config).unwrap();
        assert_eq!(loaded.table.rows()[0].base_face_amount, dec!(1000000));
    }

    #[test]
    fn test_bad_rows_dropped_and_counted() {
        let csv = "sex,age,pay_years,face_amount,premium\n\
                   F,40,6,1000000,60800\n\
                   X,40,6,1000000,60800\n\
                   M,forty,6,1000000,60800\n\
                   M,121,6,1000000,60800\n\
                   M,40,6,0,60800\n\
                   M,40,6,1000000,-1\n\
                   ,,,,\n\
                   M,40.0,6,\"1,000,000\",$64500\n";
        let loaded = load_str(csv).unwrap();

        assert_eq!(loaded.table.len(), 2);
        assert_eq!(loaded.report.rows_read, 7);
        assert_eq!(loaded.report.rows_dropped, 5);
        assert_eq!(
            loaded.report.errors[0],
            RowError { line: 3, kind: RowErrorKind::UnmappableSex("X".to_string()) }
        );
        assert!(matches!(loaded.report.errors[1].kind, RowErrorKind::InvalidInteger { .. }));
        assert!(matches!(loaded.report.errors[2].kind, RowErrorKind::OutOfRange { .. }));

        let last = &loaded.table.rows()[1];
        assert_eq!(last.age, 40);
        assert_eq!(last.base_face_amount, dec!(1000000));
        assert_eq!(last.annual_premium, dec!(64500));
    }

    #[test]
    fn test_integer_suffixes() {
        let loaded = load_str("性別,年齡,繳費年期,保額,保費\n女,40歲,6年,100,1\n").unwrap();
        let row = &loaded.table.rows()[0];
        assert_eq!(row.age, 40);
        assert_eq!(row.pay_years, 6);
    }

    #[test]
    fn test_allowed_pay_years() {
        let config = LoaderConfig {
            allowed_pay_years: Some([6, 12, 20].into_iter().collect()),
            ..Default::default()
        };
        let csv = "sex,age,pay_years,face_amount,premium\nF,40,6,100,1\nF,40,7,100,1\n";
        let loaded = load_from_reader(csv.as_bytes(), &config).unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.report.errors[0].kind, RowErrorKind::PayYearsNotAllowed(7));
    }

    #[test]
    fn test_blank_milestone_cells_are_absent_years() {
        let csv = "sex,age,pay_years,face_amount,premium,sv_1,sv_5,db_5,sv_10\n\
                   F,40,6,100,1,10,50,100,\n";
        let loaded = load_str(csv).unwrap();
        let row = &loaded.table.rows()[0];

        assert_eq!(row.milestones.keys().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(row.milestones[&5].death_benefit, dec!(100));
        assert_eq!(row.milestones[&1].death_benefit, Decimal::ZERO);
        assert_eq!(
            loaded.table.columns().years.iter().copied().collect::<Vec<_>>(),
            vec![1, 5, 10]
        );
    }

    #[test]
    fn test_duplicate_keys_counted_and_kept() {
        let csv = "sex,age,pay_years,face_amount,premium\nF,40,6,100,1\nF,40,6,100.00,2\n";
        let loaded = load_str(csv).unwrap();
        assert_eq!(loaded.table.len(), 2);
        assert_eq!(loaded.report.duplicate_keys, 1);
    }

    #[test]
    fn test_face_brackets_counted_separately() {
        let csv = "company,sex,age,pay_years,face_amount,premium\n\
                   A,F,40,6,500000,1\n\
                   A,F,40,6,1000000,2\n\
                   A,F,40,6,2000000,4\n\
                   B,F,40,6,500000,1\n\
                   A,F,40,6,1000000,9\n";
        let loaded = load_str(csv).unwrap();
        assert_eq!(loaded.table.len(), 5);
        assert_eq!(loaded.report.bracketed_keys, 2);
        assert_eq!(loaded.report.duplicate_keys, 1);
    }

    #[test]
    fn test_generated_sheet_reports_brackets() {
        use crate::table::generator::{generate, write_csv, GeneratorParams};

        let params = GeneratorParams {
            companies: vec!["A公司".to_string()],
            products: vec!["終身壽險".to_string()],
            ages: (40, 42, 2),
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_csv(&generate(&params), &params, &mut buf).unwrap();

        let loaded = load_from_reader(buf.as_slice(), &LoaderConfig::default()).unwrap();
        // 2 sexes × 3 pay periods, each with 4 face brackets
        assert_eq!(loaded.report.bracketed_keys, 6 * 3);
        assert_eq!(loaded.report.duplicate_keys, 0);
    }

    #[test]
    fn test_tab_delimited_path() {
        let path = std::env::temp_dir().join(format!("policy_quote_{}.tsv", std::process::id()));
        std::fs::write(&path, "sex\tage\tpay_years\tface_amount\tpremium\nM\t30\t20\t100\t5\n").unwrap();

        let loaded = load_from_path(&path, &LoaderConfig::default());
        std::fs::remove_file(&path).ok();

        let loaded = loaded.unwrap();
        assert_eq!(loaded.table.rows()[0].pay_years, 20);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = load_from_path("data/no_such_table.csv", &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            TableSource::parse("https://example.com/sheet.csv"),
            TableSource::Url("https://example.com/sheet.csv".to_string())
        );
        assert_eq!(
            TableSource::parse("data/rates.csv"),
            TableSource::Path(PathBuf::from("data/rates.csv"))
        );
    }
}
