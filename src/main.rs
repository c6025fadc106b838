mod api;
mod error;
mod identity;
mod page;
mod renderer;
mod session;
mod stealth;
mod text;

use axum::routing::{get, post};
use axum::Router;
use dotenv::dotenv;
use std::env;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::screenshot,
        api::pdf,
        api::content,
        api::evaluate,
        api::metrics,
        api::text
    ),
    components(
        schemas(
            api::ContentResponse,
            api::EvaluateBody,
            api::EvaluateResponse,
            api::TextResponse,
            renderer::MetricsReport
        )
    ),
    tags(
        (name = "renderer", description = "Headless rendering API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    // A missing Chrome binary should fail the boot, not the first request.
    let executable = session::verify_executable()?;
    tracing::info!(chrome = %executable.display(), "browser executable resolved");

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/screenshot", get(api::screenshot))
        .route("/api/pdf", get(api::pdf))
        .route("/api/content", get(api::content))
        .route("/api/evaluate", post(api::evaluate))
        .route("/api/metrics", get(api::metrics))
        .route("/api/text", get(api::text))
        .layer(CorsLayer::permissive());

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
