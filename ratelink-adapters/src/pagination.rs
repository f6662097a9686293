//! Pagination draining
//!
//! Pages are requested strictly one after another: page N+1 is only asked
//! for once page N has been consumed. Every style stops on an empty page,
//! and `max_pages` bounds the loop when a backend never reports the end.

use ratelink_core::{value_at_path, CancellationToken, IntegrationError, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Default safety bound on pages per fetch
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// How a vendor splits list responses into pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PaginationStyle {
    /// Single response holding every item
    #[default]
    None,
    OffsetLimit {
        #[serde(default = "default_offset_param")]
        offset_param: String,
        #[serde(default = "default_limit_param")]
        limit_param: String,
        #[serde(default = "default_page_size")]
        page_size: usize,
        /// Path to the reported total item count
        #[serde(default)]
        total_path: Option<String>,
    },
    PageNumber {
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default = "default_size_param")]
        size_param: String,
        #[serde(default = "default_page_size")]
        page_size: usize,
        #[serde(default = "default_first_page")]
        first_page: u64,
        #[serde(default)]
        total_pages_path: Option<String>,
        #[serde(default)]
        total_path: Option<String>,
    },
    Cursor {
        #[serde(default = "default_cursor_param")]
        cursor_param: String,
        next_cursor_path: String,
        #[serde(default)]
        size_param: Option<String>,
        #[serde(default)]
        page_size: Option<usize>,
    },
    /// Each response carries the absolute URL of the next page
    NextLink { next_url_path: String },
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_size_param() -> String {
    "page_size".to_string()
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_first_page() -> u64 {
    1
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(flatten)]
    pub style: PaginationStyle,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            style: PaginationStyle::None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl PaginationConfig {
    pub fn new(style: PaginationStyle) -> Self {
        Self {
            style,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn offset_limit(page_size: usize, total_path: Option<&str>) -> Self {
        Self::new(PaginationStyle::OffsetLimit {
            offset_param: default_offset_param(),
            limit_param: default_limit_param(),
            page_size,
            total_path: total_path.map(str::to_string),
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// One page request produced by the drainer
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    /// Relative path, or an absolute URL for next-link pagination
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// Items drained from every page, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub pages: usize,
    /// Cancellation stopped the fetch; `records` holds what was drained so far
    pub cancelled: bool,
    /// `max_pages` stopped the fetch before the backend reported the end
    pub truncated: bool,
    pub warnings: Vec<String>,
}

/// Where the drainer is between pages
enum Position {
    Offset(u64),
    Page(u64),
    Token(Option<String>),
    Link(Option<String>),
    Single,
}

/// Items of one page: the value at `results_path`, or the body itself when
/// it is an array, or the first array found under a common wrapper key.
pub fn extract_items(body: &Value, results_path: Option<&str>) -> Result<Vec<Value>> {
    let found = match results_path {
        Some(path) => value_at_path(body, path).ok_or_else(|| {
            IntegrationError::Serialization(format!("Results path '{}' not found in response", path))
        })?,
        None => match body {
            Value::Array(_) => body,
            Value::Object(map) => ["data", "items", "results", "records"]
                .iter()
                .find_map(|key| map.get(*key).filter(|v| v.is_array()))
                .unwrap_or(body),
            _ => body,
        },
    };

    match found {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => Ok(vec![found.clone()]),
        other => Err(IntegrationError::Serialization(format!(
            "Expected a list of records, got {}",
            other
        ))),
    }
}

fn number_at(body: &Value, path: Option<&str>) -> Option<u64> {
    let value = value_at_path(body, path?)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn text_at(body: &Value, path: &str) -> Option<String> {
    match value_at_path(body, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drain every page of `path`, calling `fetch` once per page.
///
/// `query` is sent on every page next to the pagination parameters. A
/// cancelled token stops the loop between pages and the records drained so
/// far are returned with `cancelled` set.
pub async fn drain<F, Fut>(
    config: &PaginationConfig,
    path: &str,
    query: &[(String, String)],
    results_path: Option<&str>,
    cancel: Option<&CancellationToken>,
    mut fetch: F,
) -> Result<FetchOutcome>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut outcome = FetchOutcome::default();
    let mut position = match &config.style {
        PaginationStyle::None => Position::Single,
        PaginationStyle::OffsetLimit { .. } => Position::Offset(0),
        PaginationStyle::PageNumber { first_page, .. } => Position::Page(*first_page),
        PaginationStyle::Cursor { .. } => Position::Token(None),
        PaginationStyle::NextLink { .. } => Position::Link(None),
    };

    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            debug!(pages = outcome.pages, records = outcome.records.len(), "Pagination cancelled");
            outcome.cancelled = true;
            break;
        }

        if outcome.pages >= config.max_pages {
            let message = format!(
                "Stopped after {} pages without reaching the end of the result set",
                config.max_pages
            );
            warn!(path, max_pages = config.max_pages, "Pagination safety bound reached");
            outcome.warnings.push(message);
            outcome.truncated = true;
            break;
        }

        let request = page_request(&config.style, &position, path, query);
        let body = fetch(request).await?;
        outcome.pages += 1;

        let items = extract_items(&body, results_path)?;
        let count = items.len();
        for (idx, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(record) => outcome.records.push(record),
                other => outcome.warnings.push(format!(
                    "Page {} item {} is not an object and was skipped: {}",
                    outcome.pages, idx, other
                )),
            }
        }

        debug!(path, page = outcome.pages, items = count, total = outcome.records.len(), "Drained page");

        if count == 0 {
            break;
        }

        let next = match (&config.style, &position) {
            (PaginationStyle::None, _) => None,
            (
                PaginationStyle::OffsetLimit {
                    page_size,
                    total_path,
                    ..
                },
                Position::Offset(offset),
            ) => {
                let next_offset = offset + count as u64;
                match number_at(&body, total_path.as_deref()) {
                    Some(total) if next_offset >= total => None,
                    Some(_) => Some(Position::Offset(next_offset)),
                    None if count < *page_size => None,
                    None => Some(Position::Offset(next_offset)),
                }
            }
            (
                PaginationStyle::PageNumber {
                    page_size,
                    first_page,
                    total_pages_path,
                    total_path,
                    ..
                },
                Position::Page(page),
            ) => {
                let pages_done = page - first_page + 1;
                let total_pages = number_at(&body, total_pages_path.as_deref());
                let total_items = number_at(&body, total_path.as_deref());
                let done = match (total_pages, total_items) {
                    (Some(total_pages), _) => pages_done >= total_pages,
                    (None, Some(total)) => outcome.records.len() as u64 >= total,
                    (None, None) => count < *page_size,
                };
                (!done).then(|| Position::Page(page + 1))
            }
            (PaginationStyle::Cursor { next_cursor_path, .. }, Position::Token(current)) => {
                advance(text_at(&body, next_cursor_path), current.as_deref(), &mut outcome)
                    .map(|t| Position::Token(Some(t)))
            }
            (PaginationStyle::NextLink { next_url_path }, Position::Link(current)) => {
                advance(text_at(&body, next_url_path), current.as_deref(), &mut outcome)
                    .map(|l| Position::Link(Some(l)))
            }
            _ => None,
        };

        match next {
            Some(next) => position = next,
            None => break,
        }
    }

    Ok(outcome)
}

/// Next token or link, refusing one that does not move forward
fn advance(next: Option<String>, current: Option<&str>, outcome: &mut FetchOutcome) -> Option<String> {
    let next = next?;
    if current == Some(next.as_str()) {
        warn!(token = %next, "Pagination token repeated; stopping");
        outcome
            .warnings
            .push(format!("Pagination stopped: next page token '{}' repeated", next));
        return None;
    }
    Some(next)
}

fn page_request(style: &PaginationStyle, position: &Position, path: &str, query: &[(String, String)]) -> PageRequest {
    let mut params = query.to_vec();
    let path = match (style, position) {
        (
            PaginationStyle::OffsetLimit {
                offset_param,
                limit_param,
                page_size,
                ..
            },
            Position::Offset(offset),
        ) => {
            params.push((offset_param.clone(), offset.to_string()));
            params.push((limit_param.clone(), page_size.to_string()));
            path.to_string()
        }
        (
            PaginationStyle::PageNumber {
                page_param,
                size_param,
                page_size,
                ..
            },
            Position::Page(page),
        ) => {
            params.push((page_param.clone(), page.to_string()));
            params.push((size_param.clone(), page_size.to_string()));
            path.to_string()
        }
        (
            PaginationStyle::Cursor {
                cursor_param,
                size_param,
                page_size,
                ..
            },
            Position::Token(token),
        ) => {
            if let (Some(param), Some(size)) = (size_param, page_size) {
                params.push((param.clone(), size.to_string()));
            }
            if let Some(token) = token {
                params.push((cursor_param.clone(), token.clone()));
            }
            path.to_string()
        }
        // the link already carries its own query string
        (PaginationStyle::NextLink { .. }, Position::Link(Some(link))) => {
            params.clear();
            link.clone()
        }
        _ => path.to_string(),
    };

    PageRequest { path, query: params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn items(range: std::ops::Range<u64>) -> Vec<Value> {
        range.map(|i| json!({"id": i})).collect()
    }

    fn query_value(request: &PageRequest, name: &str) -> Option<u64> {
        request
            .query
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.parse().ok())
    }

    #[tokio::test]
    async fn test_offset_limit_drains_to_total() {
        let config = PaginationConfig::offset_limit(100, Some("total_count"));
        let outcome = drain(&config, "/rates", &[], Some("data"), None, |req| async move {
            let offset = query_value(&req, "offset").unwrap_or(0);
            let end = (offset + 100).min(250);
            Ok(json!({"data": items(offset..end), "total_count": 250}))
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.records.len(), 250);
        let ids: Vec<u64> = outcome.records.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, (0..250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_single_page_without_metadata() {
        let outcome = drain(&PaginationConfig::default(), "/m", &[], None, None, |_| async {
            Ok(json!([{"id": 1}, {"id": 2}]))
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn test_safety_bound_stops_runaway_backend() {
        let config = PaginationConfig::offset_limit(10, Some("total")).with_max_pages(5);
        let outcome = drain(&config, "/m", &[], Some("items"), None, |req| async move {
            let offset = query_value(&req, "offset").unwrap_or(0);
            // reports a total it never reaches
            Ok(json!({"items": items(offset..offset + 10), "total": 1_000_000}))
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 5);
        assert_eq!(outcome.records.len(), 50);
        assert!(outcome.truncated);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops() {
        let config = PaginationConfig::new(PaginationStyle::Cursor {
            cursor_param: "cursor".into(),
            next_cursor_path: "next".into(),
            size_param: None,
            page_size: None,
        });
        let outcome = drain(&config, "/m", &[], Some("items"), None, |_| async {
            Ok(json!({"items": [{"id": 1}], "next": "same"}))
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 2);
        assert!(outcome.warnings[0].contains("repeated"));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_results() {
        let token = CancellationToken::new();
        let calls = Arc::new(Mutex::new(0));
        let config = PaginationConfig::offset_limit(2, None);

        let outcome = drain(&config, "/m", &[], None, Some(&token), |req| {
            let token = token.clone();
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                let offset = query_value(&req, "offset").unwrap_or(0);
                if offset >= 2 {
                    token.cancel();
                }
                Ok(json!(items(offset..offset + 2)))
            }
        })
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_extract_items_shapes() {
        assert_eq!(extract_items(&json!({"results": [1]}), None).unwrap(), vec![json!(1)]);
        assert_eq!(extract_items(&json!({"a": {"b": []}}), Some("a.b")).unwrap(), Vec::<Value>::new());
        assert!(extract_items(&json!({"a": 1}), Some("missing")).is_err());
        assert_eq!(extract_items(&json!({"id": 7}), None).unwrap().len(), 1);
    }
}
