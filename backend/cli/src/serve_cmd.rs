//! `homh serve`: wire configuration, provider, agent and store into the gateway.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use homh_agent::{CompanionAgent, PersonaRegistry, PromptCompiler, StreamGenerator};
use homh_config::{defaults, redacted_snapshot, HomhConfig, CONFIG_PATH_VAR};
use homh_core::{GenerationOptions, LlmProvider};
use homh_gateway::{start_server, GatewayState};
use homh_llm::GeminiProvider;
use homh_logging::init_logger;
use homh_store::{ChatStore, SqliteChatStore};

pub async fn run(bind_override: Option<String>) -> Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
    let mut config = match homh_config::load_and_prepare(config_path.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            // The logger is not up yet; report on stderr before exiting.
            eprintln!("homh: startup configuration error: {e:#}");
            return Err(e);
        }
    };
    if let Some(bind) = bind_override {
        config.server.bind = Some(bind);
    }

    init_logger(config.logging.dir.as_deref().map(Path::new), config.log_level());
    info!(config = %redacted_snapshot(&config), "Configuration loaded");

    let addr: SocketAddr = config
        .bind()
        .parse()
        .with_context(|| format!("Invalid bind address `{}`", config.bind()))?;

    let store: Arc<dyn ChatStore> = match SqliteChatStore::open(config.database_url()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to open chat database");
            return Err(e);
        }
    };

    let agent = build_agent(&config)?;
    info!(
        addr = %addr,
        model = config.provider.model.as_deref().unwrap_or(defaults::DEFAULT_MODEL),
        "Starting HOMH gateway"
    );

    start_server(
        addr,
        GatewayState::new(agent, store),
        config.cors_origins(),
        shutdown_signal(),
    )
    .await
}

fn build_agent(config: &HomhConfig) -> Result<CompanionAgent> {
    let provider = &config.provider;
    let mut gemini = GeminiProvider::new(config.api_key())
        .with_default_model(provider.model.as_deref().unwrap_or(defaults::DEFAULT_MODEL));
    if let Some(url) = &provider.base_url {
        gemini = gemini.with_base_url(url);
    }
    let gemini: Arc<dyn LlmProvider> = Arc::new(gemini);

    let timeout = Duration::from_secs(
        provider
            .timeout_secs
            .unwrap_or(defaults::DEFAULT_PROVIDER_TIMEOUT_SECS),
    );
    let generator = StreamGenerator::new(gemini)
        .with_options(GenerationOptions {
            temperature: provider.temperature,
            max_output_tokens: provider.max_output_tokens,
        })
        .with_fragment_timeout(timeout);

    let compiler = PromptCompiler::new()?;
    Ok(CompanionAgent::new(
        Arc::new(PersonaRegistry::builtin()),
        Arc::new(compiler),
        generator,
    ))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
