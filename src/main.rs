use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use snipshare::app::{router, AppState};
use snipshare::db::store::PgDocumentStore;

#[derive(Debug, Parser)]
#[command(name = "snipshare", about = "Snippet sharing backend")]
struct Args {
    /// Directory of static assets to serve alongside the API.
    #[arg(long = "static", value_name = "DIR")]
    static_dir: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:80")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snipshare=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Starting snipshare server...");

    // Connect to Postgres
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to a Postgres connection string");

    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = PgDocumentStore::new(pool);
    store.migrate().await.expect("Failed to apply migrations");

    tracing::info!("Connected to Postgres");

    let state = AppState {
        store: Arc::new(store),
    };

    if let Some(ref dir) = args.static_dir {
        tracing::info!("Serving static content from {}", dir.display());
    }

    let app = router(state, args.static_dir.as_deref());

    // Start the server
    tracing::info!("Listening on http://{}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
