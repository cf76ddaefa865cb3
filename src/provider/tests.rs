//! Provider tests.
//!
//! Registry behavior is covered without a browser; the end-to-end tests
//! launch a real Chromium against a local HTTP server and are `#[ignore]`d
//! (run with `cargo test -- --ignored` on a machine with Chrome or network
//! access for the fetcher).

use super::*;
use crate::config::{HarOutputConfig, LaunchOverrides, ProviderConfig};
use crate::error::ProviderError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ============================================================================
// Registry behavior (no browser required)
// ============================================================================

#[tokio::test]
async fn resize_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider.resize_window("nope", 800, 600).await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn can_resize_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider
        .can_resize_window_to_dimensions("ghost", 800, 600)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
}

#[tokio::test]
async fn screenshot_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider
        .take_screenshot("ghost", Path::new("/tmp/shot.png"), None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
}

#[tokio::test]
async fn hover_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider.hover_element("ghost", "#button").await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
}

#[tokio::test]
async fn close_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider.close_browser("ghost").await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
}

#[tokio::test]
async fn maximize_unknown_session_is_not_found() {
    let provider = BrowserProvider::new();
    let err = provider.maximize_window("ghost").await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
}

#[tokio::test]
async fn init_and_dispose_with_no_sessions() {
    let provider = BrowserProvider::new();
    provider.init().await.unwrap();
    provider.dispose().await.unwrap();
}

#[tokio::test]
async fn open_browser_rejects_unreadable_config_before_launching() {
    // Config loading happens host-side; a provider fed a config loaded from
    // a bad path never gets called. This asserts the loader contract.
    let err = ProviderConfig::from_file("/no/such/config.json").unwrap_err();
    assert!(matches!(err, ProviderError::Config { .. }));
}

// ============================================================================
// End-to-end tests (real Chromium, local server)
// ============================================================================

/// Install a log subscriber for the e2e runs so `RUST_LOG` works there.
/// Safe to call from every test; only the first call wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Simple HTTP test server that serves static content.
struct TestServer {
    addr: std::net::SocketAddr,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(html: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept = listener.accept() => {
                        if let Ok((mut socket, _)) = accept {
                            tokio::spawn(async move {
                                let mut buf = [0u8; 1024];
                                let _ = socket.read(&mut buf).await;

                                let response = format!(
                                    "HTTP/1.1 200 OK\r\n\
                                     Content-Type: text/html\r\n\
                                     Content-Length: {}\r\n\
                                     Connection: close\r\n\
                                     \r\n\
                                     {}",
                                    html.len(),
                                    html
                                );
                                let _ = socket.write_all(response.as_bytes()).await;
                            });
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown: shutdown_tx,
            handle,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

fn e2e_config() -> ProviderConfig {
    ProviderConfig {
        chromium: LaunchOverrides {
            args: Some(vec!["--no-sandbox".to_string()]),
            ..LaunchOverrides::default()
        },
        ..ProviderConfig::default()
    }
}

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Provider Test</title></head>
<body><button id="target">Hover me</button></body>
</html>"#;

#[tokio::test]
#[ignore = "launches a real Chromium"]
async fn e2e_session_lifecycle() {
    init_tracing();
    let server = TestServer::start(PAGE).await;
    let dir = tempfile::tempdir().unwrap();
    let provider = BrowserProvider::new();
    provider.init().await.unwrap();

    let mut config = e2e_config();
    config.har = Some(HarOutputConfig {
        file: Some(dir.path().join("capture/net.har")),
        html: Some(dir.path().join("capture/net.html")),
    });

    provider.open_browser("s1", &server.url(), &config).await.unwrap();

    // Double open for a still-open id is rejected
    let err = provider
        .open_browser("s1", &server.url(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::SessionAlreadyOpen(_)));

    // Screen size was probed: something must fit, something absurd must not
    assert!(provider
        .can_resize_window_to_dimensions("s1", 1, 1)
        .await
        .unwrap());
    assert!(!provider
        .can_resize_window_to_dimensions("s1", 100_000, 100_000)
        .await
        .unwrap());

    provider.resize_window("s1", 640, 480).await.unwrap();
    provider.hover_element("s1", "#target").await.unwrap();

    let shot = dir.path().join("shots/page.png");
    provider
        .take_screenshot("s1", &shot, Some(800), Some(600), true)
        .await
        .unwrap();
    assert!(shot.is_file());

    provider.close_browser("s1").await.unwrap();

    // HAR configured with both outputs writes exactly two files
    assert!(dir.path().join("capture/net.har").is_file());
    assert!(dir.path().join("capture/net.html").is_file());
    assert_eq!(
        std::fs::read_dir(dir.path().join("capture")).unwrap().count(),
        2
    );
    let har: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("capture/net.har")).unwrap())
            .unwrap();
    assert!(!har["log"]["entries"].as_array().unwrap().is_empty());

    // All session state is gone
    let err = provider.close_browser("s1").await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));
    let err = provider.resize_window("s1", 640, 480).await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));

    provider.dispose().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
#[ignore = "launches a real Chromium"]
async fn e2e_app_mode_adopts_browser_page() {
    init_tracing();
    let server = TestServer::start(PAGE).await;
    let provider = BrowserProvider::new();

    let mut config = e2e_config();
    config.app_mode = true;

    provider.open_browser("app", &server.url(), &config).await.unwrap();
    // The page the browser opened itself is usable without navigation
    provider.hover_element("app", "#target").await.unwrap();
    provider.close_browser("app").await.unwrap();

    server.shutdown().await;
}

#[tokio::test]
#[ignore = "launches a real Chromium"]
async fn e2e_dispose_closes_abandoned_sessions() {
    init_tracing();
    let server = TestServer::start(PAGE).await;
    let provider = BrowserProvider::new();

    provider
        .open_browser("left-open", &server.url(), &e2e_config())
        .await
        .unwrap();
    provider.dispose().await.unwrap();

    let err = provider.hover_element("left-open", "#target").await.unwrap_err();
    assert!(matches!(err, ProviderError::SessionNotFound(_)));

    server.shutdown().await;
}
