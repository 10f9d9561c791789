//! Policy Quote - reference-table lookup and proration engine for life insurance illustrations
//!
//! This library provides:
//! - Loading of rate sheets (CSV/TSV, local or fetched over HTTP) with bilingual header synonyms
//! - Exact-match quote resolution, scaled linearly to the requested face amount
//! - Plan comparison by surrender value at a chosen policy year
//! - CSV and text presentation with whole-unit currency rounding
//! - A synthetic rate-sheet generator for demos and tests

pub mod error;
pub mod table;
pub mod quote;
pub mod export;
pub mod config;
pub mod session;

// Re-export commonly used types
pub use error::{LoadError, NoMatchError, QuoteError, RowError, SchemaError};
pub use table::{ReferenceRow, ReferenceTable, Sex, TableSource};
pub use quote::{Query, Quote, QuoteResolver, ScalingPolicy};
pub use config::QuoteConfig;
pub use session::QuoteSession;
