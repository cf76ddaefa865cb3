//! HAR 1.2 data model and the builder that assembles it from network
//! observations.
//!
//! The builder is deliberately free of CDP types: it takes already-converted
//! requests/responses keyed by an opaque request id, so assembly stays
//! testable without a browser.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarLog {
    pub version: String,
    pub creator: HarCreator,
    pub pages: Vec<HarPage>,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

impl Default for HarCreator {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    pub started_date_time: DateTime<Utc>,
    pub id: String,
    pub title: String,
    pub page_timings: HarPageTimings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPageTimings {
    pub on_content_load: f64,
    pub on_load: f64,
}

impl Default for HarPageTimings {
    fn default() -> Self {
        // Unknown per the HAR spec
        Self {
            on_content_load: -1.0,
            on_load: -1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub pageref: String,
    pub started_date_time: DateTime<Utc>,
    /// Total elapsed time in milliseconds.
    pub time: f64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub cache: HarCache,
    pub timings: HarTimings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub cookies: Vec<HarCookie>,
    pub headers: Vec<HarHeader>,
    pub query_string: Vec<HarQueryParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

impl HarRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let query_string = query_params(&url);
        Self {
            method: method.into(),
            url,
            http_version: "HTTP/1.1".to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            query_string,
            post_data: None,
            headers_size: -1,
            body_size: -1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: i64,
    pub status_text: String,
    pub http_version: String,
    pub cookies: Vec<HarCookie>,
    pub headers: Vec<HarHeader>,
    pub content: HarContent,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

impl HarResponse {
    pub fn new(status: i64, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            http_version: "HTTP/1.1".to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            content: HarContent::default(),
            redirect_url: String::new(),
            headers_size: -1,
            body_size: -1,
        }
    }

    /// Placeholder for requests the browser never answered (aborted, still
    /// in flight at stop time).
    fn unanswered() -> Self {
        Self::new(0, "")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    pub size: i64,
    pub mime_type: String,
}

impl Default for HarContent {
    fn default() -> Self {
        Self {
            size: -1,
            mime_type: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarQueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarCookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    pub mime_type: String,
    pub text: String,
}

/// Always serialized as `{}`; capture does not inspect the browser cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarCache {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarTimings {
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
}

/// Parse the query component of a URL into HAR name/value pairs. No
/// percent-decoding: values are recorded as sent.
pub fn query_params(url: &str) -> Vec<HarQueryParam> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => HarQueryParam {
                name: name.to_string(),
                value: value.to_string(),
            },
            None => HarQueryParam {
                name: pair.to_string(),
                value: String::new(),
            },
        })
        .collect()
}

struct PendingEntry {
    seq: u64,
    started_date_time: DateTime<Utc>,
    started: Instant,
    request: HarRequest,
    response: Option<HarResponse>,
    wait_ms: f64,
    total_ms: f64,
}

/// Accumulates network observations and assembles the final [`Har`].
pub struct HarBuilder {
    started_at: DateTime<Utc>,
    pending: HashMap<String, PendingEntry>,
    seq: u64,
}

impl Default for HarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HarBuilder {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            pending: HashMap::new(),
            seq: 0,
        }
    }

    /// Record a request going out. A repeated id (redirect hop) replaces the
    /// earlier observation; the final hop is what the log keeps.
    pub fn request_started(&mut self, request_id: impl Into<String>, request: HarRequest) {
        self.seq += 1;
        self.pending.insert(
            request_id.into(),
            PendingEntry {
                seq: self.seq,
                started_date_time: Utc::now(),
                started: Instant::now(),
                request,
                response: None,
                wait_ms: 0.0,
                total_ms: 0.0,
            },
        );
    }

    pub fn response_received(&mut self, request_id: &str, response: HarResponse) {
        if let Some(entry) = self.pending.get_mut(request_id) {
            let elapsed = entry.started.elapsed().as_secs_f64() * 1_000.0;
            entry.wait_ms = elapsed;
            entry.total_ms = elapsed;
            entry.response = Some(response);
        }
    }

    pub fn loading_finished(&mut self, request_id: &str, encoded_length: Option<i64>) {
        if let Some(entry) = self.pending.get_mut(request_id) {
            entry.total_ms = entry.started.elapsed().as_secs_f64() * 1_000.0;
            if let (Some(response), Some(length)) = (entry.response.as_mut(), encoded_length) {
                response.body_size = length;
                response.content.size = length;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Assemble the log. Entries come out in request-start order; requests
    /// without a response get a status-0 placeholder.
    pub fn finish(self, page_url: Option<&str>) -> Har {
        const PAGE_ID: &str = "page_1";

        let mut pending: Vec<PendingEntry> = self.pending.into_values().collect();
        pending.sort_by_key(|entry| entry.seq);

        let entries = pending
            .into_iter()
            .map(|entry| {
                let receive = (entry.total_ms - entry.wait_ms).max(0.0);
                HarEntry {
                    pageref: PAGE_ID.to_string(),
                    started_date_time: entry.started_date_time,
                    time: entry.total_ms,
                    request: entry.request,
                    response: entry.response.unwrap_or_else(HarResponse::unanswered),
                    cache: HarCache::default(),
                    timings: HarTimings {
                        send: 0.0,
                        wait: entry.wait_ms,
                        receive,
                    },
                }
            })
            .collect();

        Har {
            log: HarLog {
                version: "1.2".to_string(),
                creator: HarCreator::default(),
                pages: vec![HarPage {
                    started_date_time: self.started_at,
                    id: PAGE_ID.to_string(),
                    title: page_url.unwrap_or_default().to_string(),
                    page_timings: HarPageTimings::default(),
                }],
                entries,
            },
        }
    }
}
