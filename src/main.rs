use anyhow::Context;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod game;
mod protocol;
mod shared;
mod store;
mod transport;

use config::ServerConfig;
use game::layout::default_node_definitions;
use game::nodes::{load_node_definitions, NodeDefinition};
use game::world::World;
use shared::identity_token::{sign_identity_token, IdentityClaims};
use store::SqlitePlayerStore;
use transport::gate::{credential_from_request, IdentityGate};
use transport::ws_session::handle_socket;

const DEBUG_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

struct AppState {
    world: Arc<World>,
    gate: IdentityGate,
    debug_commands: bool,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenRequest {
    #[serde(rename = "playerId")]
    player_id: String,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct DebugTokenResponse {
    token: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    let store = SqlitePlayerStore::connect(&config.database_url).await?;
    let definitions = node_definitions(&config)?;

    let world = World::new(config.world_settings(), Arc::new(store), definitions);
    world.start();

    let state = Arc::new(AppState {
        world: Arc::clone(&world),
        gate: IdentityGate::new(config.token_secret.clone()),
        debug_commands: config.debug_commands,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut app: Router<Arc<AppState>> = Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/nodes", get(nodes))
        .route("/api/ws", get(ws_handler));

    if config.debug_commands {
        tracing::warn!("debug commands enabled");
        app = app.route("/api/debug/token", post(debug_token));
    }

    let app: Router = app.layer(cors).with_state(state);

    let address = format!("0.0.0.0:{}", config.port);
    tracing::info!("listening on {address}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down world");
    world.shutdown().await;
    Ok(())
}

fn node_definitions(config: &ServerConfig) -> anyhow::Result<Vec<NodeDefinition>> {
    let Some(path) = &config.nodes_file else {
        return Ok(default_node_definitions());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    load_node_definitions(&contents).with_context(|| format!("invalid nodes in {}", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(?error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(?error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn health() -> impl IntoResponse {
    Json(OkResponse { ok: true })
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.world.stats().await)
}

async fn nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.world.nodes_snapshot().await)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = credential_from_request(query.token.as_deref(), &headers);
    let identity = match state.gate.verify(credential) {
        Ok(identity) => identity,
        Err(error) => {
            tracing::info!(%error, "rejected connection");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    ok: false,
                    error: "Unauthorized".to_string(),
                }),
            )
                .into_response();
        }
    };
    let world = Arc::clone(&state.world);
    ws.on_upgrade(move |socket| handle_socket(socket, world, identity))
        .into_response()
}

async fn debug_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DebugTokenRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    if !state.debug_commands {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                ok: false,
                error: "Debug commands disabled".to_string(),
            }),
        )
            .into_response();
    }
    let Ok(Json(payload)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                ok: false,
                error: "Invalid JSON".to_string(),
            }),
        )
            .into_response();
    };

    let expires_at = app::time::now_millis() + DEBUG_TOKEN_TTL_MS;
    let claims = IdentityClaims {
        player_id: payload.player_id,
        name: payload.name.unwrap_or_default(),
        expires_at_ms: expires_at,
    };
    match sign_identity_token(&claims, state.gate.secret()) {
        Ok(token) => Json(DebugTokenResponse { token, expires_at }).into_response(),
        Err(error) => {
            tracing::warn!(?error, "failed to mint debug token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    ok: false,
                    error: "Token signing failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}
