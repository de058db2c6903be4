//! HTTP transport: thin JSON endpoints over the façades.

mod handlers;
mod middleware;
mod proxy;

pub use proxy::RedditBridge;

use axum::{
    Router,
    extract::FromRef,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::{LeadersService, NbaService, ThreadResolver};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AppState {
    pub nba: NbaService,
    pub leaders: LeadersService,
    pub threads: ThreadResolver,
    pub bridge: RedditBridge,
}

impl FromRef<AppState> for RedditBridge {
    fn from_ref(state: &AppState) -> Self {
        state.bridge.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/scoreboard", get(handlers::scoreboard))
        .route("/api/boxscore/{id}", get(handlers::boxscore))
        .route("/api/standings", get(handlers::standings))
        .route("/api/season-leaders", get(handlers::season_leaders))
        .route(
            "/api/season-leaders/bulk",
            get(handlers::season_leaders_bulk),
        )
        .route("/api/reddit/index", get(handlers::reddit_index))
        .route("/api/reddit/search", post(handlers::reddit_search))
        .route("/api/reddit/comments/{id}", get(handlers::reddit_comments))
        .route("/api/reddit/threads", get(handlers::reddit_threads))
        .route(
            "/api/reddit/subreddit/{name}",
            get(handlers::reddit_subreddit),
        )
        .route("/api/reddit/proxy", get(proxy::reddit_proxy))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}
