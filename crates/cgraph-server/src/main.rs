//! Binary entrypoint for the concept graph HTTP server.
//!
//! Reads configuration from environment variables:
//! - `CGRAPH_DB_PATH`: SQLite database file path (default: "conceptgraph.db")
//! - `CGRAPH_PORT`: Server listen port (default: "3000")
//! - `CGRAPH_DANGLING`: "tolerate" or "reject" unresolvable pointers
//!   (default: "tolerate")

use cgraph_server::config::ServerConfig;
use cgraph_server::router::build_router;
use cgraph_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("Invalid server configuration");

    let state = AppState::new(&config.db_path, config.sync_options())
        .expect("Failed to initialize application state");

    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!(
        db = %config.db_path,
        dangling = ?config.dangling,
        "concept graph server starting on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
