//! Error types for table loading and quote resolution

use rust_decimal::Decimal;
use thiserror::Error;

use crate::table::{CanonicalField, Sex};

/// Boxed underlying cause of a source failure
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Fatal failures while loading a reference table
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source could not be fetched or parsed at all
    #[error("reference table source unavailable ({location}): {cause}")]
    SourceUnavailable {
        location: String,
        #[source]
        cause: BoxedCause,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl LoadError {
    pub(crate) fn unavailable(location: impl Into<String>, cause: impl Into<BoxedCause>) -> Self {
        LoadError::SourceUnavailable {
            location: location.into(),
            cause: cause.into(),
        }
    }
}

/// Required canonical columns are missing from the header row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reference table is missing required columns: {}", format_fields(.missing))]
pub struct SchemaError {
    pub missing: Vec<CanonicalField>,
}

fn format_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single malformed row. Recovered by dropping the row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct RowError {
    /// 1-based line in the source (header is line 1)
    pub line: u64,
    pub kind: RowErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorKind {
    #[error("unrecognised sex value {0:?}")]
    UnmappableSex(String),

    #[error("{field} is not an integer: {value:?}")]
    InvalidInteger { field: String, value: String },

    #[error("{field} is not an amount: {value:?}")]
    InvalidAmount { field: String, value: String },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: String },

    #[error("pay period {0} is not offered")]
    PayYearsNotAllowed(u32),

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("unreadable record: {0}")]
    Malformed(String),
}

/// The query matched no reference row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "no rate found for sex={sex}, age={age}, pay_years={pay_years}{}",
    describe_filters(.company, .product, .face_amount)
)]
pub struct NoMatchError {
    pub sex: Sex,
    pub age: u8,
    pub pay_years: u32,
    pub company: Option<String>,
    pub product: Option<String>,
    /// Set only when the resolver requires an exact face-amount bracket
    pub face_amount: Option<Decimal>,
}

fn describe_filters(
    company: &Option<String>,
    product: &Option<String>,
    face_amount: &Option<Decimal>,
) -> String {
    let mut out = String::new();
    if let Some(company) = company {
        out.push_str(&format!(", company={}", company));
    }
    if let Some(product) = product {
        out.push_str(&format!(", product={}", product));
    }
    if let Some(face) = face_amount {
        out.push_str(&format!(", face_amount={}", face));
    }
    out
}

/// Failures from the quote resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error(transparent)]
    NoMatch(#[from] NoMatchError),

    #[error("requested face amount must be positive, got {0}")]
    InvalidFaceAmount(Decimal),

    #[error("arithmetic overflow while scaling row at line {line}")]
    Overflow { line: u64 },
}
