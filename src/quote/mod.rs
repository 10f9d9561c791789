//! Quote resolution: match a query against a reference table and scale the
//! matched row to the requested face amount

mod query;
mod resolver;
mod ranking;

pub use query::{MilestoneQuote, Query, Quote, STANDARD_MILESTONE_YEARS};
pub use resolver::{resolve, resolve_all, QuoteResolver, ResolverConfig, ScalingPolicy};
pub use ranking::{best_plans, rank_by_surrender_value};
