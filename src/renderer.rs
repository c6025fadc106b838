//! Rendering operations.
//!
//! Each operation is fully self-contained: it opens its own browser session,
//! configures and navigates a page, produces one artifact and tears
//! everything down again — success, failure or timeout. Nothing is shared
//! between concurrent operations.

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Page as CdpPage;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::Performance;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::Tab;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{RenderError, Result};
use crate::page::Page;
use crate::session::{Session, DEFAULT_VIEWPORT};
use crate::text;

/// Bounded wait for a caller-supplied CSS selector.
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// 20 CSS pixels expressed in inches, the unit `printToPDF` expects.
const PDF_MARGIN_INCHES: f64 = 20.0 / 96.0;

/// Returns the full document markup with every `<script>` element removed.
const STRIPPED_HTML_JS: &str = r#"
(() => {
    const clone = document.documentElement.cloneNode(true);
    const scripts = clone.getElementsByTagName('script');
    while (scripts.length > 0) {
        scripts[0].parentNode.removeChild(scripts[0]);
    }
    return clone.outerHTML;
})()
"#;

// ============================================================================
// Options
// ============================================================================

/// Screenshot options as they arrive from the routing layer. Numeric fields
/// are strings there; anything absent or malformed falls back to defaults.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    pub width: Option<String>,
    pub height: Option<String>,
    pub full_page: Option<String>,
}

impl ScreenshotOptions {
    /// Viewport for this call: both dimensions must parse, otherwise the
    /// default applies.
    pub fn viewport(&self) -> (u32, u32) {
        match (parse_dimension(&self.width), parse_dimension(&self.height)) {
            (Some(width), Some(height)) => (width, height),
            _ => DEFAULT_VIEWPORT,
        }
    }

    pub fn full_page(&self) -> bool {
        flag(&self.full_page)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PdfOptions {
    pub format: Option<String>,
    pub landscape: Option<String>,
}

impl PdfOptions {
    /// Paper size in inches for the requested format; unknown formats fall
    /// back to A4 like the rest of the option handling.
    pub fn paper_size(&self) -> (f64, f64) {
        match self
            .format
            .as_deref()
            .map(|f| f.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("letter") => (8.5, 11.0),
            Some("legal") => (8.5, 14.0),
            Some("tabloid") => (11.0, 17.0),
            Some("a3") => (11.69, 16.54),
            Some("a5") => (5.83, 8.27),
            _ => (8.27, 11.69), // A4
        }
    }

    pub fn landscape(&self) -> bool {
        flag(&self.landscape)
    }
}

fn parse_dimension(value: &Option<String>) -> Option<u32> {
    value
        .as_deref()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim) == Some("true")
}

/// Browser performance counters plus the page's own performance timeline.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsReport {
    #[schema(value_type = Object)]
    pub metrics: serde_json::Value,
    #[schema(value_type = Object)]
    pub performance: serde_json::Value,
}

// ============================================================================
// Operations
// ============================================================================

/// Capture a PNG screenshot of `url`, optionally at an overridden viewport
/// and optionally of the full scroll height.
pub async fn capture_screenshot(url: &str, options: &ScreenshotOptions) -> Result<Vec<u8>> {
    let session = Session::open_with_viewport(options.viewport())?;
    let result = screenshot_action(&session, url, options.full_page()).await;
    session.close();
    result
}

async fn screenshot_action(session: &Session, url: &str, full_page: bool) -> Result<Vec<u8>> {
    let page = Page::configure(session)?;
    page.navigate(url).await?;

    let clip = if full_page {
        Some(full_page_clip(page.tab())?)
    } else {
        None
    };
    let image =
        page.tab()
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, clip, true)?;
    Ok(image)
}

/// Measure the document's scrollable extent so the capture covers the whole
/// page rather than the visible viewport.
fn full_page_clip(tab: &Arc<Tab>) -> Result<CdpPage::Viewport> {
    #[derive(Deserialize)]
    struct Extent {
        width: f64,
        height: f64,
    }

    let extent: Extent = eval_json(
        tab,
        "JSON.stringify({
            width: Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0),
            height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)
        })",
    )?;

    Ok(CdpPage::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width.max(1.0),
        height: extent.height.max(1.0),
        scale: 1.0,
    })
}

/// Render `url` to a paginated PDF with fixed 20 px margins on all sides.
pub async fn render_pdf(url: &str, options: &PdfOptions) -> Result<Vec<u8>> {
    let session = Session::open()?;
    let result = pdf_action(&session, url, options).await;
    session.close();
    result
}

async fn pdf_action(session: &Session, url: &str, options: &PdfOptions) -> Result<Vec<u8>> {
    let page = Page::configure(session)?;
    page.navigate(url).await?;

    let (paper_width, paper_height) = options.paper_size();
    let pdf = page.tab().print_to_pdf(Some(PrintToPdfOptions {
        landscape: Some(options.landscape()),
        print_background: Some(true),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(PDF_MARGIN_INCHES),
        margin_bottom: Some(PDF_MARGIN_INCHES),
        margin_left: Some(PDF_MARGIN_INCHES),
        margin_right: Some(PDF_MARGIN_INCHES),
        ..Default::default()
    }))?;
    Ok(pdf)
}

/// Return page markup: the matched element's inner HTML when a selector is
/// given, otherwise the whole document with `<script>` elements stripped.
pub async fn page_content(url: &str, selector: Option<&str>) -> Result<String> {
    let session = Session::open()?;
    let result = content_action(&session, url, selector).await;
    session.close();
    result
}

async fn content_action(session: &Session, url: &str, selector: Option<&str>) -> Result<String> {
    let page = Page::configure(session)?;
    page.navigate(url).await?;
    page.tab().wait_for_element("body")?;
    page.await_dynamic_settle().await;

    match selector {
        Some(selector) => {
            page.tab()
                .wait_for_element_with_custom_timeout(selector, SELECTOR_TIMEOUT)
                .map_err(|_| RenderError::ElementNotFound {
                    selector: selector.to_string(),
                })?;

            let probe = format!(
                "(() => {{ const el = document.querySelector({sel}); return el ? el.innerHTML : null; }})()",
                sel = serde_json::to_string(selector)
                    .map_err(|e| RenderError::Configuration(format!("invalid selector: {e}")))?,
            );
            let markup = page.tab().evaluate(&probe, false)?;
            match markup.value.as_ref().and_then(|v| v.as_str()) {
                Some(inner) => Ok(inner.to_string()),
                None => Err(RenderError::ElementNotFound {
                    selector: selector.to_string(),
                }),
            }
        }
        None => eval_string(page.tab(), STRIPPED_HTML_JS),
    }
}

/// Execute caller-supplied script source in the page and return its value.
/// A page-side exception becomes an [`RenderError::Evaluation`] carrying the
/// in-page message.
pub async fn evaluate_script(url: &str, script: &str) -> Result<serde_json::Value> {
    if script.trim().is_empty() {
        return Err(RenderError::Configuration(
            "script must not be empty".to_string(),
        ));
    }
    let session = Session::open()?;
    let result = evaluate_action(&session, url, script).await;
    session.close();
    result
}

async fn evaluate_action(
    session: &Session,
    url: &str,
    script: &str,
) -> Result<serde_json::Value> {
    let page = Page::configure(session)?;
    page.navigate(url).await?;

    #[derive(Deserialize)]
    struct Outcome {
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    }

    let wrapper = evaluation_wrapper(script)?;
    let outcome: Outcome = {
        let result = page.tab().evaluate(&wrapper, true)?;
        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RenderError::Evaluation("script produced no serializable result".to_string())
            })?;
        serde_json::from_str(raw)
            .map_err(|e| RenderError::Browser(anyhow::anyhow!("malformed evaluation result: {e}")))?
    };

    match outcome.error {
        Some(message) => Err(RenderError::Evaluation(message)),
        None => Ok(outcome.value.unwrap_or(serde_json::Value::Null)),
    }
}

/// Wrap caller source so exceptions come back as data instead of tearing
/// down the CDP call, and promises are awaited like a devtools console would.
fn evaluation_wrapper(script: &str) -> Result<String> {
    let source = serde_json::to_string(script)
        .map_err(|e| RenderError::Configuration(format!("invalid script source: {e}")))?;
    Ok(format!(
        r#"
(async () => {{
    try {{
        let value = (0, eval)({source});
        if (value instanceof Promise) {{
            value = await value;
        }}
        return JSON.stringify({{ value: value === undefined ? null : value }});
    }} catch (err) {{
        return JSON.stringify({{ error: String(err && err.message ? err.message : err) }});
    }}
}})()
"#
    ))
}

/// Collect browser performance counters and the page's performance snapshot.
pub async fn collect_metrics(url: &str) -> Result<MetricsReport> {
    let session = Session::open()?;
    let result = metrics_action(&session, url).await;
    session.close();
    result
}

async fn metrics_action(session: &Session, url: &str) -> Result<MetricsReport> {
    let page = Page::configure(session)?;

    // Counters only accumulate once the domain is enabled, so enable before
    // the navigation they should describe.
    page.tab()
        .call_method(Performance::Enable { time_domain: None })?;
    page.navigate(url).await?;

    let counters = page.tab().call_method(Performance::GetMetrics(None))?;
    let metrics: serde_json::Map<String, serde_json::Value> = counters
        .metrics
        .into_iter()
        .map(|m| (m.name, serde_json::json!(m.value)))
        .collect();

    let performance = eval_json(page.tab(), "JSON.stringify(performance.toJSON())")?;

    Ok(MetricsReport {
        metrics: serde_json::Value::Object(metrics),
        performance,
    })
}

/// Extract the page's human-readable text with structural spacing.
pub async fn visible_text(url: &str) -> Result<String> {
    let session = Session::open()?;
    let result = text_action(&session, url).await;
    session.close();
    result
}

async fn text_action(session: &Session, url: &str) -> Result<String> {
    let page = Page::configure(session)?;
    page.navigate(url).await?;
    page.tab().wait_for_element("body")?;
    page.await_dynamic_settle().await;

    let snapshot = text::capture_snapshot(page.tab())?;
    Ok(text::extract_visible_text(&snapshot))
}

// ============================================================================
// Evaluation helpers
// ============================================================================

fn eval_string(tab: &Arc<Tab>, script: &str) -> Result<String> {
    let result = tab.evaluate(script, false)?;
    result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| RenderError::Browser(anyhow::anyhow!("expected a string result from page")))
}

fn eval_json<T: serde::de::DeserializeOwned>(tab: &Arc<Tab>, script: &str) -> Result<T> {
    let raw = eval_string(tab, script)?;
    serde_json::from_str(&raw)
        .map_err(|e| RenderError::Browser(anyhow::anyhow!("malformed page result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_defaults_when_dimensions_missing_or_malformed() {
        let options = ScreenshotOptions::default();
        assert_eq!(options.viewport(), DEFAULT_VIEWPORT);

        let options = ScreenshotOptions {
            width: Some("not-a-number".into()),
            height: Some("1080".into()),
            full_page: None,
        };
        assert_eq!(options.viewport(), DEFAULT_VIEWPORT);

        let options = ScreenshotOptions {
            width: Some("0".into()),
            height: Some("600".into()),
            full_page: None,
        };
        assert_eq!(options.viewport(), DEFAULT_VIEWPORT);
    }

    #[test]
    fn viewport_override_needs_both_dimensions() {
        let options = ScreenshotOptions {
            width: Some("800".into()),
            height: Some("600".into()),
            full_page: None,
        };
        assert_eq!(options.viewport(), (800, 600));

        let options = ScreenshotOptions {
            width: Some("800".into()),
            height: None,
            full_page: None,
        };
        assert_eq!(options.viewport(), DEFAULT_VIEWPORT);
    }

    #[test]
    fn flags_only_accept_the_string_true() {
        let options = ScreenshotOptions {
            full_page: Some("true".into()),
            ..Default::default()
        };
        assert!(options.full_page());

        for value in ["false", "TRUE", "1", "yes", ""] {
            let options = ScreenshotOptions {
                full_page: Some(value.into()),
                ..Default::default()
            };
            assert!(!options.full_page(), "{value:?} should not enable fullPage");
        }
    }

    #[test]
    fn paper_formats_map_to_inches_with_a4_fallback() {
        let a4 = PdfOptions::default().paper_size();
        assert_eq!(a4, (8.27, 11.69));

        let letter = PdfOptions {
            format: Some("Letter".into()),
            landscape: None,
        };
        assert_eq!(letter.paper_size(), (8.5, 11.0));

        let unknown = PdfOptions {
            format: Some("postcard".into()),
            landscape: None,
        };
        assert_eq!(unknown.paper_size(), a4);
    }

    #[test]
    fn pdf_margins_are_twenty_css_pixels() {
        assert!((PDF_MARGIN_INCHES - 20.0 / 96.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluation_wrapper_embeds_source_as_json_literal() {
        let wrapper = evaluation_wrapper("document.title + \"!\"").unwrap();
        assert!(wrapper.contains(r#""document.title + \"!\"""#));
        assert!(wrapper.contains("instanceof Promise"));
        assert!(wrapper.contains("JSON.stringify({ error:"));
    }

    #[tokio::test]
    async fn empty_scripts_are_rejected_before_a_browser_is_launched() {
        let err = evaluate_script("https://example.com", "   ").await;
        assert!(matches!(err, Err(RenderError::Configuration(_))));
    }
}
