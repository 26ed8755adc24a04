use std::borrow::Cow;
use std::path::Path;

use axum::{
    Json, Router,
    extract::State,
    response::Html,
    routing::get,
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use board_gateway::MemoryStore;
use board_types::api::{BoardView, InitConfig};
use board_types::models::{Comment, Direction, comment_fields};
use board_widget::boot::INIT_CONFIG_PATH;
use board_widget::escape::{escape_html, escape_html_opt};
use board_widget::{BoardState, ClockStyle, TimeLabel, render};

use crate::live;

pub const LIVE_PATH: &str = "/live";

#[derive(Clone)]
pub struct AppState {
    pub store: MemoryStore,
    pub config: InitConfig,
    pub clock: ClockStyle,
}

impl AppState {
    fn comments(&self) -> Vec<Comment> {
        self.store
            .snapshot(&self.config.collection, comment_fields::CREATED_AT, Direction::Descending)
            .documents
            .iter()
            .map(Comment::from_document)
            .collect()
    }
}

pub fn app(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index))
        .route(INIT_CONFIG_PATH, get(init_config))
        .route("/comments", get(list_comments))
        .route("/health", get(health))
        .route(LIVE_PATH, get(live::ws_upgrade))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn init_config(State(state): State<AppState>) -> Json<InitConfig> {
    Json(state.config)
}

async fn list_comments(State(state): State<AppState>) -> Json<Vec<Comment>> {
    Json(state.comments())
}

/// Liveness plus a view of how many clients the store is serving.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.store.session_count(),
        "live_queries": state.store.open_query_count(),
        "viewers": state.store.child_count(&state.config.presence_path),
    }))
}

/// First paint comes from the server; the page script takes over from
/// there through the live socket.
async fn index(State(state): State<AppState>) -> Html<String> {
    let board = BoardState {
        comments: state.comments(),
        viewer_count: Some(state.store.child_count(&state.config.presence_path)),
        ..BoardState::default()
    };
    let view = render(&board, &TimeLabel::local(state.clock));
    Html(page_html(&view, &state.config))
}

fn page_html(view: &BoardView, config: &InitConfig) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Comments</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body data-live-url="{live}">
    <section class="viewers">Viewing now: <span id="viewer-count">{count}</span></section>
    <form id="comment-form">
        <input id="username" name="username" placeholder="Your name" value="{author}">
        <textarea id="message" name="message" placeholder="Write a comment"></textarea>
        <button type="submit"{disabled}>{label}</button>
    </form>
    <div id="comments-list">
{list}    </div>
    <script src="/static/board.js"></script>
</body>
</html>
"#,
        live = escape_html_opt(config.live_url.as_deref()).unwrap_or(Cow::Borrowed(LIVE_PATH)),
        count = escape_html(&view.viewer_count),
        author = escape_html(&view.form.author),
        disabled = if view.submit.disabled { " disabled" } else { "" },
        label = escape_html(&view.submit.label),
        list = view.list_html,
    )
}
