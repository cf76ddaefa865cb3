//! HAR output: raw JSON and a self-contained HTML report.
//!
//! The HTML report is a static template with a single placeholder token
//! substituted by the serialized log. Both writers create the destination's
//! parent directory first.

use super::log::Har;
use crate::config::HarOutputConfig;
use crate::error::ProviderError;
use std::path::Path;

pub(crate) const PLACEHOLDER: &str = "__HAR_DATA__";

const REPORT_TEMPLATE: &str = include_str!("report.html");

/// Write the log verbatim as pretty-printed JSON.
pub async fn write_json(har: &Har, path: &Path) -> Result<(), ProviderError> {
    ensure_parent(path).await?;
    let json = serde_json::to_vec_pretty(har)?;
    tokio::fs::write(path, json).await?;
    tracing::info!(path = %path.display(), "Wrote HAR log");
    Ok(())
}

/// Write the HTML report with the serialized log embedded at the
/// placeholder token.
pub async fn write_html(har: &Har, path: &Path) -> Result<(), ProviderError> {
    ensure_parent(path).await?;
    let html = render_report(har)?;
    tokio::fs::write(path, html).await?;
    tracing::info!(path = %path.display(), "Wrote HAR report");
    Ok(())
}

/// Write every output the config asks for. Both set means exactly two files.
pub async fn write_reports(har: &Har, config: &HarOutputConfig) -> Result<(), ProviderError> {
    if let Some(path) = &config.file {
        write_json(har, path).await?;
    }
    if let Some(path) = &config.html {
        write_html(har, path).await?;
    }
    Ok(())
}

fn render_report(har: &Har) -> Result<String, ProviderError> {
    let json = serde_json::to_string(har)?;
    // `</script>` inside the embedded JSON would terminate the script block
    let json = json.replace("</", "<\\/");
    Ok(REPORT_TEMPLATE.replace(PLACEHOLDER, &json))
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
