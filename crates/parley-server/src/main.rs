use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::messages;
use parley_api::upload;
use parley_db::{Store, StoreConfig};
use parley_gateway::connection;
use parley_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let database_url = std::env::var("DATABASE_URL").ok();
    let sqlite_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Upload directory must exist before the first register request
    tokio::fs::create_dir_all(upload::UPLOAD_DIR).await?;

    // Select the backend, then make sure the tables exist before any route
    // is reachable. A broken backend is logged; individual requests will
    // report it.
    let store = Store::connect(&StoreConfig {
        database_url,
        sqlite_path: PathBuf::from(sqlite_path),
    })
    .await;
    if let Err(e) = store.init_schema().await {
        error!("schema init failed: {}", e);
    }

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner { store, dispatcher });

    // Routes
    let app = Router::new()
        .route_service("/", ServeFile::new("public/index.html"))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/messages", get(messages::get_messages))
        .route("/message", post(messages::post_message))
        .route("/gateway", get(ws_upgrade))
        .nest_service("/uploads", ServeDir::new(upload::UPLOAD_DIR))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.dispatcher.clone()))
}
