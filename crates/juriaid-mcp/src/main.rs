mod config;
mod document;
mod error;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use juriaid_common::auth::AuthClient;
use juriaid_common::credentials::{CredentialStore, MemoryCredentialStore, RedisCredentialStore};
use juriaid_common::orchestrator::OrchestratorClient;

use config::Config;
use server::JuriAidServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting juriaid MCP server");

    let config = Config::from_env()?;
    info!(
        orchestrator = %config.orchestrator.base_url,
        auth = %config.auth.base_url,
        redis = config.redis_url.is_some(),
        max_document_bytes = config.max_document_bytes,
        "configuration loaded"
    );

    let credentials: Arc<dyn CredentialStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let store = RedisCredentialStore::new(
                Some(url),
                &config.credentials_namespace,
                config.credentials_ttl_secs,
            );
            if store.is_available().await {
                info!(namespace = %config.credentials_namespace, "redis connected, credentials persisted");
            } else {
                info!("redis unavailable, logins will not persist");
            }
            Arc::new(store)
        }
        None => {
            info!("no REDIS_URL, keeping credentials in memory");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let orchestrator = Arc::new(OrchestratorClient::new(
        config.orchestrator.clone(),
        Arc::clone(&credentials),
    )?);
    let auth = Arc::new(AuthClient::new(config.auth.clone(), credentials)?);

    let server = JuriAidServer::new(orchestrator, auth, config.max_document_bytes);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
