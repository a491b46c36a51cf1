use axum::middleware as axum_middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    delete_link, list_links, post_url, redirect_link, unknown_endpoint, verify_link, AppState,
};
use crate::middleware::admission;

/// Builds the full router: routes, tracing, CORS and the admission
/// middleware. The admission layer runs before routing so the interval
/// throttle covers unknown paths too.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/urls", get(list_links))
        .route("/url/:id", get(redirect_link))
        .route("/post-url", post(post_url))
        .route("/verify/:id", patch(verify_link))
        .route("/delete/:id", delete(delete_link))
        .fallback(unknown_endpoint)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    admission,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    pub fn new(state: AppState, bind_addr: SocketAddr) -> Self {
        Self {
            app: create_app(state),
            bind_addr,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("linkgate listening on {}", self.bind_addr);

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, initiating graceful shutdown");
        },
    }
}
