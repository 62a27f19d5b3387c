use tokio::net::TcpListener;
use tracing::{error, info};
use triage_service::{ServiceConfig, create_app, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may come from the environment
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let app = create_app(&config)?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!(
        %addr,
        default_language = %config.default_language,
        chat_model = %config.openrouter.chat_model,
        vision_model = %config.openrouter.vision_model,
        hospital_model = %config.openrouter.search_model,
        "Symptom triage service starting"
    );
    info!("Chat endpoint: POST http://{}/chat", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
