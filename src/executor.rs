//! Query executor: count checks, paginated fetches and exact-name lookups against the catalogue.
//!
//! All round trips of one call run sequentially. Transient failures (no response, 5xx, 408,
//! 429, an undecodable body) are retried with exponential backoff until the retry budget is
//! spent; any other 4xx means the catalogue rejected the query and is returned immediately.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::transport::{HttpResponse, HttpTransport};

/// Hard per-request result cap of the catalogue.
pub const PAGE_SIZE: usize = 1000;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(60_000);

const EXPANDS: &[&str] = &["Attributes", "Assets", "Locations"];
const COUNT_FIELD: &str = "@odata.count";
const BODY_EXCERPT: usize = 300;

/// What to fetch: everything matching a rendered filter, or products by exact name.
#[derive(Debug, Clone, Copy)]
pub enum QueryTarget<'a> {
    Filter(&'a str),
    Names(&'a [String]),
}

/// Paging options of a filter fetch. Ignored by name lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub skip: usize,
    /// Upper bound on the number of records; `None` fetches everything.
    pub n_entries: Option<usize>,
    /// Passed through verbatim as `$orderby`, e.g. `ContentDate/Start desc`.
    pub orderby: Option<String>,
}

impl FetchOptions {
    pub fn first(n_entries: usize) -> Self {
        FetchOptions { n_entries: Some(n_entries), ..Default::default() }
    }
}

/// Raw records in the order received, the page payloads they came from, and the total the
/// catalogue declared for the filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages: Vec<Value>,
    pub declared_total: Option<u64>,
}

pub struct QueryExecutor {
    transport: Arc<dyn HttpTransport>,
    catalog_url: String,
    page_size: usize,
    retry_delay: Duration,
    max_retry_delay: Duration,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, catalog_url: impl Into<String>) -> Self {
        QueryExecutor {
            transport,
            catalog_url: catalog_url.into(),
            page_size: PAGE_SIZE,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        }
    }

    /// Page sizes above the catalogue cap are clamped to it.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    pub fn with_retry_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_delay = initial;
        self.max_retry_delay = max.max(initial);
        self
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Delay after the given failed attempt (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay.saturating_mul(factor).min(self.max_retry_delay)
    }

    /// Number of products matching `filter`, from a single-record request.
    pub fn check(&self, filter: &str, timeout: Duration, max_retries: u32) -> Result<u64> {
        let mut params = filter_param(filter);
        params.push(("$count".to_string(), "true".to_string()));
        params.push(("$top".to_string(), "1".to_string()));
        let response = self.request(&params, timeout, max_retries)?;
        let count = declared_count(&response)?;
        debug!(products = count, "count check complete");
        Ok(count)
    }

    pub fn fetch_all(
        &self,
        target: QueryTarget<'_>,
        options: &FetchOptions,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<FetchOutcome> {
        match target {
            QueryTarget::Filter(filter) => self.fetch_filtered(filter, options, timeout, max_retries),
            QueryTarget::Names(names) => self.fetch_names(names, timeout, max_retries),
        }
    }

    fn fetch_filtered(
        &self,
        filter: &str,
        options: &FetchOptions,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut skip = options.skip;
        loop {
            let remaining = options.n_entries.map(|cap| cap.saturating_sub(outcome.records.len()));
            if remaining == Some(0) {
                break;
            }
            let top = remaining.map_or(self.page_size, |r| r.min(self.page_size));

            let mut params = filter_param(filter);
            params.push(("$skip".to_string(), skip.to_string()));
            params.push(("$top".to_string(), top.to_string()));
            params.push(("$count".to_string(), "true".to_string()));
            if let Some(orderby) = &options.orderby {
                params.push(("$orderby".to_string(), orderby.clone()));
            }
            push_expands(&mut params);

            let started = Instant::now();
            let page = self.request(&params, timeout, max_retries)?;
            let total = if outcome.pages.is_empty() {
                Some(declared_count(&page)?)
            } else {
                page.get(COUNT_FIELD).and_then(Value::as_u64)
            };
            if total.is_some() {
                outcome.declared_total = total;
            }
            let mut values = page_values(&page)?;
            values.truncate(top);
            let received = values.len();
            debug!(
                skip = skip,
                top = top,
                received = received,
                ms = started.elapsed().as_millis() as u64,
                "page received"
            );
            outcome.records.extend(values);
            outcome.pages.push(page);
            skip += received;

            if received == 0 {
                break;
            }
            match outcome.declared_total {
                Some(total) if skip as u64 >= total => break,
                None if received < top => break,
                _ => {}
            }
        }
        Ok(outcome)
    }

    fn fetch_names(&self, names: &[String], timeout: Duration, max_retries: u32) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        for name in names {
            let mut params = filter_param(&format!("Name eq '{}'", name.replace('\'', "''")));
            params.push(("$count".to_string(), "true".to_string()));
            push_expands(&mut params);
            match self.request(&params, timeout, max_retries) {
                Ok(page) => {
                    if page.get(COUNT_FIELD).is_none() {
                        warn!(name = %name, "catalog answered a name lookup without a count, skipping");
                        continue;
                    }
                    let values = page_values(&page)?;
                    if values.is_empty() {
                        debug!(name = %name, "no product with this name");
                    }
                    outcome.records.extend(values);
                    outcome.pages.push(page);
                }
                Err(e @ QueryError::InvalidQuery { .. }) => {
                    warn!(name = %name, error = %e, "catalog rejected product name, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        outcome.declared_total = Some(outcome.records.len() as u64);
        Ok(outcome)
    }

    /// One logical request, retried on transient failures.
    fn request(&self, params: &[(String, String)], timeout: Duration, max_retries: u32) -> Result<Value> {
        let attempts = max_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            debug!(attempt = attempt, url = %self.catalog_url, "catalog request");
            match self.transport.get(&self.catalog_url, params, timeout) {
                Ok(response) if response.is_success() => match serde_json::from_str::<Value>(&response.body) {
                    Ok(value) => return Ok(value),
                    Err(e) => last_error = format!("undecodable response body: {}", e),
                },
                Ok(response) if is_transient(response.status) => {
                    last_error = format!("HTTP {}: {}", response.status, excerpt(&response));
                }
                Ok(response) => {
                    return Err(QueryError::InvalidQuery {
                        status: Some(response.status),
                        message: format!("HTTP {}: {}", response.status, excerpt(&response)),
                    });
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < attempts {
                let delay = self.backoff(attempt);
                warn!(
                    attempt = attempt,
                    attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "catalog request failed, retrying"
                );
                thread::sleep(delay);
            }
        }
        Err(QueryError::QueryExecution { attempts, message: last_error })
    }
}

fn is_transient(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

fn excerpt(response: &HttpResponse) -> String {
    let body = response.body.trim();
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

fn filter_param(filter: &str) -> Vec<(String, String)> {
    if filter.is_empty() {
        Vec::new()
    } else {
        vec![("$filter".to_string(), filter.to_string())]
    }
}

fn push_expands(params: &mut Vec<(String, String)>) {
    for expand in EXPANDS {
        params.push(("$expand".to_string(), expand.to_string()));
    }
}

fn declared_count(response: &Value) -> Result<u64> {
    response
        .get(COUNT_FIELD)
        .and_then(Value::as_u64)
        .ok_or_else(|| QueryError::InvalidQuery {
            status: None,
            message: format!("response carries no {}: {}", COUNT_FIELD, truncate_json(response)),
        })
}

fn page_values(page: &Value) -> Result<Vec<Value>> {
    page.get("value")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| QueryError::MalformedResponse("page without a 'value' array".to_string()))
}

fn truncate_json(value: &Value) -> String {
    let text = value.to_string();
    match text.char_indices().nth(BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
