//! HTTP routing layer.
//!
//! Thin glue over the rendering operations: query/body validation, option
//! pass-through and status mapping. Every handler is stateless — each call
//! owns a fresh browser session end to end.

use axum::extract::Query;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{RenderError, Result};
use crate::renderer::{self, PdfOptions, ScreenshotOptions};

/// The core expects well-formed URLs, so malformed ones are rejected here.
fn validated_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| RenderError::Configuration(format!("invalid url: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(RenderError::Configuration(format!(
            "unsupported url scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed.into())
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// Target URL to render
    pub url: String,
    /// Viewport width override in pixels
    pub width: Option<String>,
    /// Viewport height override in pixels
    pub height: Option<String>,
    /// Capture the full scroll height when "true"
    pub full_page: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PdfParams {
    /// Target URL to render
    pub url: String,
    /// Paper format (A4 default; Letter, Legal, Tabloid, A3, A5)
    pub format: Option<String>,
    /// Landscape orientation when "true"
    pub landscape: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ContentParams {
    /// Target URL to render
    pub url: String,
    /// CSS selector narrowing the extraction to one element
    pub selector: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UrlParams {
    /// Target URL to render
    pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EvaluateBody {
    /// Script source executed in the page context
    pub script: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluateResponse {
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TextResponse {
    pub text: String,
}

#[utoipa::path(
    get,
    path = "/api/screenshot",
    params(ScreenshotParams),
    responses(
        (status = 200, description = "PNG screenshot", content_type = "image/png", body = Vec<u8>),
        (status = 400, description = "Invalid URL or options"),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn screenshot(Query(params): Query<ScreenshotParams>) -> Result<impl IntoResponse> {
    let url = validated_url(&params.url)?;
    let options = ScreenshotOptions {
        width: params.width,
        height: params.height,
        full_page: params.full_page,
    };
    let image = renderer::capture_screenshot(&url, &options).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], image))
}

#[utoipa::path(
    get,
    path = "/api/pdf",
    params(PdfParams),
    responses(
        (status = 200, description = "Rendered PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Invalid URL or options"),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn pdf(Query(params): Query<PdfParams>) -> Result<impl IntoResponse> {
    let url = validated_url(&params.url)?;
    let options = PdfOptions {
        format: params.format,
        landscape: params.landscape,
    };
    let document = renderer::render_pdf(&url, &options).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], document))
}

#[utoipa::path(
    get,
    path = "/api/content",
    params(ContentParams),
    responses(
        (status = 200, description = "Page markup", body = ContentResponse),
        (status = 404, description = "Selector matched no element"),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn content(Query(params): Query<ContentParams>) -> Result<Json<ContentResponse>> {
    let url = validated_url(&params.url)?;
    let content = renderer::page_content(&url, params.selector.as_deref()).await?;
    Ok(Json(ContentResponse { content }))
}

#[utoipa::path(
    post,
    path = "/api/evaluate",
    params(UrlParams),
    request_body = EvaluateBody,
    responses(
        (status = 200, description = "Script result", body = EvaluateResponse),
        (status = 400, description = "Invalid URL, empty script, or in-page exception"),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn evaluate(
    Query(params): Query<UrlParams>,
    Json(body): Json<EvaluateBody>,
) -> Result<Json<EvaluateResponse>> {
    let url = validated_url(&params.url)?;
    let result = renderer::evaluate_script(&url, &body.script).await?;
    Ok(Json(EvaluateResponse { result }))
}

#[utoipa::path(
    get,
    path = "/api/metrics",
    params(UrlParams),
    responses(
        (status = 200, description = "Performance counters and timeline", body = renderer::MetricsReport),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn metrics(Query(params): Query<UrlParams>) -> Result<Json<renderer::MetricsReport>> {
    let url = validated_url(&params.url)?;
    let report = renderer::collect_metrics(&url).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/text",
    params(UrlParams),
    responses(
        (status = 200, description = "Visible page text", body = TextResponse),
        (status = 504, description = "Navigation timed out")
    ),
    tag = "renderer"
)]
pub async fn text(Query(params): Query<UrlParams>) -> Result<Json<TextResponse>> {
    let url = validated_url(&params.url)?;
    let text = renderer::visible_text(&url).await?;
    Ok(Json(TextResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_http_urls_pass_validation() {
        assert!(validated_url("https://example.com/page?x=1").is_ok());
        assert!(validated_url("http://localhost:8080").is_ok());
    }

    #[test]
    fn malformed_urls_are_configuration_errors() {
        assert!(matches!(
            validated_url("not a url"),
            Err(RenderError::Configuration(_))
        ));
        assert!(matches!(
            validated_url("file:///etc/passwd"),
            Err(RenderError::Configuration(_))
        ));
    }

    #[test]
    fn screenshot_params_accept_camel_case_full_page() {
        let params: ScreenshotParams = serde_json::from_str(
            r#"{"url": "https://example.com", "fullPage": "true", "width": "800"}"#,
        )
        .unwrap();
        assert_eq!(params.full_page.as_deref(), Some("true"));
        assert_eq!(params.width.as_deref(), Some("800"));
        assert!(params.height.is_none());
    }
}
