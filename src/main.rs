//src/main.rs

use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pos_backend::{
    config::{AppState, Config},
    middleware::auth::CurrentActor,
    models::auth::ActorContext,
};

/// Devolve o contexto resolvido a partir do token.
async fn get_me(CurrentActor(actor): CurrentActor) -> Json<ActorContext> {
    Json(actor)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/me", get(get_me))
        .with_state(app_state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
