use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mesabot::config::AppConfig;
use mesabot::db;
use mesabot::db::stores::{SqliteBookingStore, SqliteFlowStore, SqliteMenu};
use mesabot::handlers;
use mesabot::services::ai::groq::GroqProvider;
use mesabot::services::ai::ollama::OllamaProvider;
use mesabot::services::ai::LlmProvider;
use mesabot::services::availability::AvailabilityPolicy;
use mesabot::services::messaging::twilio::TwilioWhatsAppProvider;
use mesabot::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                "llama3.2".to_string(),
            ))
        }
    };
    let messaging = TwilioWhatsAppProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_whatsapp_number.clone(),
    );

    let availability = AvailabilityPolicy::from_config(&config);
    let ttl_minutes = config.conversation_ttl_minutes;

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        config: config.clone(),
        llm,
        messaging: Box::new(messaging),
        menu: Box::new(SqliteMenu::new(Arc::clone(&db))),
        bookings: Box::new(SqliteBookingStore::new(Arc::clone(&db))),
        flows: Box::new(SqliteFlowStore::new(Arc::clone(&db), ttl_minutes)),
        availability,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/whatsapp", post(handlers::webhook::whatsapp_webhook))
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
