//! Host-facing browser lifecycle.
//!
//! The host runner drives a fixed call order per session:
//! `init → open_browser → [resize/screenshot/hover] → close_browser →
//! dispose`. All operations delegate to chromiumoxide; the provider only
//! adds per-session bookkeeping, configuration resolution, and optional HAR
//! capture. Calls for one session are issued sequentially by the host; the
//! registry guard is the only cross-call exclusion.

use crate::config::{LaunchPlan, ProviderConfig};
use crate::error::ProviderError;
use crate::har::{report, HarRecorder};
use crate::session::{ScreenSize, Session, SessionRegistry};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    Bounds, GetWindowForTargetParams, SetWindowBoundsParams, WindowState,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[cfg(test)]
mod tests;

/// JS probe for the screen dimensions available to the session's window.
const SCREEN_PROBE_JS: &str = "({ width: screen.availWidth, height: screen.availHeight })";

/// Host hook awaited during `open_browser`, after navigation and before the
/// session becomes visible to other calls. The default provider has no gate
/// and proceeds immediately.
#[async_trait]
pub trait ReadyGate: Send + Sync {
    async fn wait_ready(&self, session_id: &str);
}

/// Browser provider: session-keyed launch/teardown plus thin delegations to
/// the page and window handles.
#[derive(Default)]
pub struct BrowserProvider {
    registry: SessionRegistry,
    ready_gate: Option<Arc<dyn ReadyGate>>,
}

impl BrowserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready_gate(gate: Arc<dyn ReadyGate>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            ready_gate: Some(gate),
        }
    }

    /// Host lifecycle entry point. The provider allocates nothing up front.
    pub async fn init(&self) -> Result<(), ProviderError> {
        tracing::debug!("Browser provider initialized");
        Ok(())
    }

    /// Close every session still open. Individual close failures are logged
    /// and do not stop the sweep.
    pub async fn dispose(&self) -> Result<(), ProviderError> {
        let ids = self.registry.open_ids().await;
        if ids.is_empty() {
            return Ok(());
        }
        tracing::info!(count = ids.len(), "Disposing provider, closing remaining sessions");
        for id in ids {
            if let Err(e) = self.close_browser(&id).await {
                tracing::warn!(session_id = %id, error = %e, "Failed to close session during dispose");
            }
        }
        Ok(())
    }

    /// Launch a browser for `id` and navigate it to `url`.
    ///
    /// Sequencing: resolve the launch plan, launch, obtain the page (app
    /// mode adopts the window the browser opened itself), attach and start
    /// HAR capture when configured, navigate unless app mode, await the
    /// host's ready gate, maximize unless headless, probe the screen size,
    /// then register the session. An id that is still open is rejected with
    /// [`ProviderError::SessionAlreadyOpen`].
    pub async fn open_browser(
        &self,
        id: &str,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<(), ProviderError> {
        if self.registry.contains(id).await {
            return Err(ProviderError::SessionAlreadyOpen(id.to_string()));
        }

        let plan = LaunchPlan::build(url, config);
        tracing::info!(
            session_id = %id,
            url = %url,
            app_mode = plan.app_mode,
            headless = plan.headless,
            har = config.har.is_some(),
            "Opening browser session"
        );

        let (mut browser, handler_task) = launch_browser(&plan).await?;

        let (page, screen, har) = match self.open_on_browser(&browser, &plan, url, config, id).await
        {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Tearing down browser after failed open");
                if let Err(close_err) = browser.close().await {
                    tracing::warn!(session_id = %id, error = %close_err, "Failed to close browser");
                }
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        // A losing race here drops the session, which kills the freshly
        // spawned browser process.
        self.registry
            .insert(
                id,
                Session {
                    browser,
                    handler_task,
                    page,
                    screen,
                    har,
                },
            )
            .await
    }

    /// Steps between launch and registration, separated so a failure in any
    /// of them tears the browser down in one place.
    async fn open_on_browser(
        &self,
        browser: &Browser,
        plan: &LaunchPlan,
        url: &str,
        config: &ProviderConfig,
        id: &str,
    ) -> Result<(Page, ScreenSize, Option<(HarRecorder, crate::config::HarOutputConfig)>), ProviderError>
    {
        let page = acquire_page(browser, plan).await?;

        let har = match &config.har {
            Some(outputs) => {
                if outputs.is_empty() {
                    tracing::warn!(session_id = %id, "HAR capture enabled but no output path configured");
                }
                Some((HarRecorder::attach(&page, url).await?, outputs.clone()))
            }
            None => None,
        };

        if let Some(nav_url) = &plan.navigation_url {
            match tokio::time::timeout(plan.launch_timeout, page.goto(nav_url)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ProviderError::NavigationTimeout(plan.launch_timeout)),
            }
        }

        if let Some(gate) = &self.ready_gate {
            tracing::debug!(session_id = %id, "Waiting for host ready signal");
            gate.wait_ready(id).await;
        }

        if !plan.headless {
            maximize_page(&page).await?;
        }

        let screen = probe_screen_size(&page).await?;
        tracing::debug!(
            session_id = %id,
            width = screen.width,
            height = screen.height,
            "Recorded available screen size"
        );

        Ok((page, screen, har))
    }

    /// Stop HAR capture (writing configured outputs), close the page and
    /// browser, and drop all state for `id`.
    pub async fn close_browser(&self, id: &str) -> Result<(), ProviderError> {
        let session = self.registry.remove(id).await?;
        tracing::info!(session_id = %id, "Closing browser session");
        let mut session = session.write().await;

        if let Some((recorder, outputs)) = session.har.take() {
            let har = recorder.stop();
            report::write_reports(&har, &outputs).await?;
        }

        // Finish teardown before surfacing close errors so a failed page
        // close never leaks the browser process.
        let page_result = session.page.clone().close().await;
        let browser_result = session.browser.close().await;
        let _ = session.browser.wait().await;
        session.handler_task.abort();

        page_result?;
        browser_result?;
        Ok(())
    }

    /// Resize the session's viewport via a CDP device-metrics override.
    pub async fn resize_window(
        &self,
        id: &str,
        width: u32,
        height: u32,
    ) -> Result<(), ProviderError> {
        let session = self.registry.get(id).await?;
        let session = session.read().await;
        set_viewport(&session.page, width, height).await
    }

    /// True iff the requested dimensions each fit within the screen size
    /// recorded when the session opened.
    pub async fn can_resize_window_to_dimensions(
        &self,
        id: &str,
        width: u32,
        height: u32,
    ) -> Result<bool, ProviderError> {
        let session = self.registry.get(id).await?;
        let session = session.read().await;
        Ok(session.screen.fits(width, height))
    }

    /// Capture a PNG of the session's page to `path`, creating the
    /// destination directory if needed. When both dimensions are given the
    /// viewport is resized first.
    pub async fn take_screenshot(
        &self,
        id: &str,
        path: &Path,
        width: Option<u32>,
        height: Option<u32>,
        full_page: bool,
    ) -> Result<(), ProviderError> {
        let session = self.registry.get(id).await?;
        let session = session.read().await;

        if let (Some(width), Some(height)) = (width, height) {
            set_viewport(&session.page, width, height).await?;
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        let png = session.page.screenshot(params).await?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, png).await?;
        tracing::debug!(session_id = %id, path = %path.display(), "Saved screenshot");
        Ok(())
    }

    /// Hover the first element matching `selector` on the session's page.
    pub async fn hover_element(&self, id: &str, selector: &str) -> Result<(), ProviderError> {
        let session = self.registry.get(id).await?;
        let session = session.read().await;
        let element = session.page.find_element(selector).await?;
        element.hover().await?;
        Ok(())
    }

    /// Maximize the OS window hosting the session's page.
    pub async fn maximize_window(&self, id: &str) -> Result<(), ProviderError> {
        let session = self.registry.get(id).await?;
        let session = session.read().await;
        maximize_page(&session.page).await
    }
}

/// Directory where the fetcher caches downloaded Chrome binaries.
fn fetcher_cache_dir() -> PathBuf {
    let base = std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from);
    base.join(".cache/browser-provider/chromium")
}

fn browser_config(
    plan: &LaunchPlan,
    executable: Option<&Path>,
) -> Result<BrowserConfig, ProviderError> {
    let mut builder = BrowserConfig::builder()
        .args(plan.args.clone())
        .viewport(Viewport {
            width: plan.viewport.width,
            height: plan.viewport.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .request_timeout(plan.launch_timeout);

    builder = if plan.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(ProviderError::LaunchFailed)
}

async fn try_launch(
    plan: &LaunchPlan,
    executable: Option<&Path>,
) -> Result<(Browser, JoinHandle<()>), ProviderError> {
    let config = browser_config(plan, executable)?;

    let launched = tokio::time::timeout(plan.launch_timeout, Browser::launch(config))
        .await
        .map_err(|_| {
            ProviderError::LaunchFailed(format!(
                "timed out after {:?} waiting for browser launch",
                plan.launch_timeout
            ))
        })?;
    let (browser, mut handler) =
        launched.map_err(|e| ProviderError::LaunchFailed(e.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::warn!("CDP handler error: {e}");
            }
        }
    });

    Ok((browser, handler_task))
}

/// Launch a browser for the plan. Tries the system Chrome first (zero
/// download); on failure, downloads a compatible Chromium via the fetcher
/// and caches it for future runs.
async fn launch_browser(plan: &LaunchPlan) -> Result<(Browser, JoinHandle<()>), ProviderError> {
    match try_launch(plan, None).await {
        Ok(launched) => return Ok(launched),
        Err(e) => {
            tracing::info!("System Chrome not available ({e}), trying fetcher...");
        }
    }

    let cache_dir = fetcher_cache_dir();
    tracing::info!("Downloading Chrome to {cache_dir:?} (first run only)...");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        ProviderError::LaunchFailed(format!(
            "Failed to create cache dir {}: {e}",
            cache_dir.display()
        ))
    })?;

    let fetcher_opts = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .map_err(|e| ProviderError::LaunchFailed(format!("Fetcher config error: {e}")))?;

    let fetcher = BrowserFetcher::new(fetcher_opts);
    let info = fetcher
        .fetch()
        .await
        .map_err(|e| ProviderError::LaunchFailed(format!("Chrome download failed: {e:#}")))?;

    tracing::info!("Using Chrome at {:?}", info.executable_path);

    try_launch(plan, Some(&info.executable_path)).await
}

/// In app mode the browser opens the `--app=` window itself; adopt that
/// page instead of creating one. Otherwise open a blank page to navigate.
async fn acquire_page(browser: &Browser, plan: &LaunchPlan) -> Result<Page, ProviderError> {
    if !plan.app_mode {
        return browser.new_page("about:blank").await.map_err(Into::into);
    }

    let deadline = tokio::time::Instant::now() + plan.launch_timeout;
    loop {
        if let Some(page) = browser.pages().await?.into_iter().next() {
            return Ok(page);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ProviderError::LaunchFailed(
                "app-mode window never produced a page".to_string(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn set_viewport(page: &Page, width: u32, height: u32) -> Result<(), ProviderError> {
    let params = SetDeviceMetricsOverrideParams::builder()
        .width(width)
        .height(height)
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(ProviderError::Command)?;
    page.execute(params).await?;
    Ok(())
}

async fn maximize_page(page: &Page) -> Result<(), ProviderError> {
    let window = page
        .execute(
            GetWindowForTargetParams::builder()
                .target_id(page.target_id().clone())
                .build(),
        )
        .await?;

    let params = SetWindowBoundsParams::builder()
        .window_id(window.window_id.clone())
        .bounds(Bounds::builder().window_state(WindowState::Maximized).build())
        .build()
        .map_err(ProviderError::Command)?;
    page.execute(params).await?;
    Ok(())
}

async fn probe_screen_size(page: &Page) -> Result<ScreenSize, ProviderError> {
    let result = page.evaluate(SCREEN_PROBE_JS).await?;
    let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(Into::into)
}
