//! AWS Lambda handler for policy quotes
//!
//! Accepts an insured profile as JSON and returns the prorated quote, or every
//! matching plan ranked by surrender value when `rank_by_year` is given.
//!
//! The reference table is loaded once at cold start from `QUOTE_TABLE`.
//! Supports Lambda Function URLs for direct HTTP access.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use policy_quote::{Query, QuoteConfig, QuoteError, QuoteSession, Quote, Sex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Quote request body
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// M/F or 男/女
    pub sex: String,
    pub age: u8,
    pub pay_years: u32,
    pub face_amount: Decimal,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub product: Option<String>,

    /// Milestone years to return (default: every year in the table)
    #[serde(default)]
    pub years: Option<BTreeSet<u32>>,

    /// Rank all matching plans at this policy year instead of quoting one
    #[serde(default)]
    pub rank_by_year: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuoteResponse {
    Single {
        quote: Quote,
        execution_time_ms: u64,
    },
    Ranked {
        rank_by_year: u32,
        plans: Vec<Quote>,
        execution_time_ms: u64,
    },
}

fn error_response(status: u16, body: serde_json::Value) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Text(body.to_string()))?)
}

fn json_response(body: &QuoteResponse) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::Text(serde_json::to_string(body)?))?)
}

fn quote_error_response(err: QuoteError) -> Result<Response<Body>, Error> {
    match err {
        QuoteError::NoMatch(no_match) => error_response(
            404,
            json!({
                "error": no_match.to_string(),
                "sex": no_match.sex,
                "age": no_match.age,
                "pay_years": no_match.pay_years,
                "company": no_match.company,
                "product": no_match.product,
                "face_amount": no_match.face_amount,
            }),
        ),
        QuoteError::InvalidFaceAmount(_) => error_response(400, json!({ "error": err.to_string() })),
        QuoteError::Overflow { .. } => error_response(500, json!({ "error": err.to_string() })),
    }
}

/// Lambda handler function
async fn handler(session: &QuoteSession, event: Request) -> Result<Response<Body>, Error> {
    let start = std::time::Instant::now();

    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(Response::builder()
            .status(200)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Body::Empty)?);
    }

    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: QuoteRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => return error_response(400, json!({ "error": format!("Invalid JSON: {}", e) })),
    };

    let sex = match Sex::parse(&request.sex) {
        Some(s) => s,
        None => return error_response(400, json!({ "error": format!("Unrecognised sex: {}", request.sex) })),
    };

    let mut query = Query::new(sex, request.age, request.pay_years, request.face_amount);
    query.company = request.company;
    query.product = request.product;
    query.milestone_years = request.years;

    let response = match request.rank_by_year {
        Some(year) => match session.best_plans(&query, year) {
            Ok(plans) => QuoteResponse::Ranked {
                rank_by_year: year,
                plans,
                execution_time_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => return quote_error_response(e),
        },
        None => match session.quote(&query) {
            Ok(quote) => QuoteResponse::Single {
                quote,
                execution_time_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => return quote_error_response(e),
        },
    };

    json_response(&response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    // Blocking load (file or HTTP fetch) off the async workers
    let config = QuoteConfig::from_env();
    let session = tokio::task::spawn_blocking(move || QuoteSession::open(&config)).await??;
    let session = Arc::new(session);

    run(service_fn(move |event: Request| {
        let session = Arc::clone(&session);
        async move { handler(&session, event).await }
    }))
    .await
}
