//! Static endpoints: robots.txt and the owner's public profile

use axum::{Json, Router, extract::State, http::header, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/robots.txt", get(robots))
        .route("/profile", get(profile))
}

#[derive(Serialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub links: Vec<serde_json::Value>,
}

async fn robots() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        "User-agent: *\nDisallow: /\n",
    )
}

/// GET /profile - Who this availability belongs to
async fn profile(State(state): State<AppState>) -> Json<Profile> {
    let config = state.talk_to().config();
    Json(Profile {
        name: config.name.clone().unwrap_or_else(|| "me".to_string()),
        email: config.email.clone().unwrap_or_default(),
        links: config.links.clone(),
    })
}
