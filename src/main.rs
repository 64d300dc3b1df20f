use pathology_report_service::create_app;
use tokio::net::TcpListener;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Missing configuration is surfaced per request as a 500; warn early so a
    // misconfigured deployment is visible in the logs at startup.
    if std::env::var("OPENROUTER_API_KEY").is_err() {
        warn!("OPENROUTER_API_KEY is not set; report and chat requests will fail");
    }
    if std::env::var("API_BASE_URL").is_err() {
        warn!("API_BASE_URL is not set; report requests will fail");
    }

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let app = create_app()?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("Pathology Report Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Report endpoint: POST http://{}/api/generate-report", addr);
    info!("Chat endpoint: POST http://{}/api/chat", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
