pub mod analysis; // Gemini/Ollama clients, retry and fallback
pub mod api; // axum HTTP API
pub mod app_state;
pub mod auth; // Sign-up, login, verification, password reset
pub mod config;
pub mod crypto;
pub mod db;
pub mod imaging; // Upload validation
pub mod mail;
pub mod models;
pub mod report; // PDF, DOCX, PPTX and text rendering
pub mod session; // Per-login workspaces

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Process entry point: configure, build shared state, serve until Ctrl-C.
pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match config::AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!(dir = %config.data_dir.display(), "Cannot create data directory: {e}");
        std::process::exit(1);
    }

    // Built outside the async runtime: the providers own blocking HTTP clients.
    let provider = match analysis::build_provider(&config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Analysis provider unavailable: {e}");
            std::process::exit(1);
        }
    };
    let mailer: Arc<dyn mail::Mailer> = Arc::from(mail::mailer_from_config(&config.smtp));

    let state = Arc::new(app_state::AppState::new(config, provider, mailer));

    // Run migrations before accepting requests.
    if let Err(e) = state.open_db() {
        tracing::error!(path = %state.db_path().display(), "Database unavailable: {e}");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    // `state` outlives the runtime; the blocking HTTP client must not be dropped inside it.
    if let Err(e) = runtime.block_on(api::serve(state.clone())) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
