//! CDP-side of HAR capture: enables the Network domain on a page and feeds
//! the builder from background listener tasks.

use super::log::{Har, HarBuilder, HarHeader, HarPostData, HarRequest, HarResponse};
use crate::error::ProviderError;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived, Headers,
    Request, Response,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Records network activity on one page from `attach` until `stop`.
///
/// Listener tasks share the builder behind a separate std mutex so capture
/// never contends with the async provider locks. Dropping the recorder
/// without `stop` aborts the tasks and discards the log.
pub struct HarRecorder {
    builder: Arc<Mutex<HarBuilder>>,
    tasks: Vec<JoinHandle<()>>,
    page_url: String,
}

impl HarRecorder {
    /// Enable the Network domain and start capturing. Must be attached
    /// before navigation so the initial document request is recorded.
    pub async fn attach(page: &Page, page_url: impl Into<String>) -> Result<Self, ProviderError> {
        let page_url = page_url.into();
        page.execute(EnableParams::default()).await?;

        let builder = Arc::new(Mutex::new(HarBuilder::new()));
        let mut tasks = Vec::with_capacity(3);

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let sink = builder.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let request = har_request(&event.request);
                if let Ok(mut builder) = sink.lock() {
                    builder.request_started(event.request_id.inner().clone(), request);
                }
            }
        }));

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let sink = builder.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let response = har_response(&event.response);
                if let Ok(mut builder) = sink.lock() {
                    builder.response_received(event.request_id.inner(), response);
                }
            }
        }));

        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let sink = builder.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                if let Ok(mut builder) = sink.lock() {
                    builder.loading_finished(
                        event.request_id.inner(),
                        Some(event.encoded_data_length as i64),
                    );
                }
            }
        }));

        tracing::debug!(page_url = %page_url, "HAR capture started");
        Ok(Self {
            builder,
            tasks,
            page_url,
        })
    }

    /// Stop capturing and assemble the log.
    pub fn stop(self) -> Har {
        for task in &self.tasks {
            task.abort();
        }
        let builder = self
            .builder
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default();
        tracing::debug!(page_url = %self.page_url, "HAR capture stopped");
        builder.finish(Some(&self.page_url))
    }
}

impl Drop for HarRecorder {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn har_request(request: &Request) -> HarRequest {
    let mut har = HarRequest::new(request.method.clone(), request.url.clone());
    har.headers = header_list(&request.headers);
    if let Some(body) = &request.post_data {
        har.body_size = body.len() as i64;
        har.post_data = Some(HarPostData {
            mime_type: String::new(),
            text: body.clone(),
        });
    }
    har
}

fn har_response(response: &Response) -> HarResponse {
    let mut har = HarResponse::new(response.status, response.status_text.clone());
    if let Some(protocol) = &response.protocol {
        har.http_version = protocol.clone();
    }
    har.headers = header_list(&response.headers);
    har.content.mime_type = response.mime_type.clone();
    har.body_size = response.encoded_data_length as i64;
    har
}

/// CDP headers arrive as a JSON object; flatten it into HAR name/value
/// pairs. Non-string values (rare, but the protocol allows them) are kept
/// via their JSON rendering.
fn header_list(headers: &Headers) -> Vec<HarHeader> {
    let Ok(value) = serde_json::to_value(headers) else {
        return Vec::new();
    };
    let Some(map) = value.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, value)| HarHeader {
            name: name.clone(),
            value: match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            },
        })
        .collect()
}
