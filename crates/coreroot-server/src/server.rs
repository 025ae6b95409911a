use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use coreroot_core::{SharedClock, SystemClock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, error::StartupError, handlers, state::AppState};

pub struct CoreRootServer {
    addr: SocketAddr,
    app: Router,
}

/// Content routes, mounted under `/api`.
fn content_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/post/",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/post/{id}/",
            get(handlers::read_post)
                .put(handlers::replace_post)
                .patch(handlers::patch_post)
                .delete(handlers::delete_post),
        )
        .route("/post/{id}/like/", post(handlers::like_post))
        .route("/post/{id}/remove_like/", post(handlers::remove_like_post))
        .route(
            "/post/{post_id}/comment/",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/post/{post_id}/comment/{id}/",
            get(handlers::read_comment)
                .put(handlers::replace_comment)
                .patch(handlers::patch_comment)
                .delete(handlers::delete_comment),
        )
        .route(
            "/user/{id}/",
            get(handlers::read_user).patch(handlers::patch_user),
        )
}

pub fn build_app(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .nest("/api/auth", coreroot_auth::http::router())
        .nest("/api", content_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    config: AppConfig,
    clock: SharedClock,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            clock: SystemClock::shared(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> Result<CoreRootServer, StartupError> {
        let state = AppState::build(&self.config, self.clock).await?;
        let app = build_app(state, self.config.server.body_limit_bytes);

        Ok(CoreRootServer {
            addr: self.config.addr(),
            app,
        })
    }
}

impl CoreRootServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> Result<(), StartupError> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
