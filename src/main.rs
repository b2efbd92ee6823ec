use docket::state::{AppConfig, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docket=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting docket server...");

    let config = AppConfig::from_env();
    let state = AppState::from_env(&config)
        .await
        .expect("Failed to initialize services");

    let app = docket::api::routes::router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
