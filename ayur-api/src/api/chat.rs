//! Wellness chat endpoint

use axum::{routing::post, Json, Router};

use super::form::FormFields;
use crate::wellness::{self, WellnessReply};
use crate::AppState;

/// POST /api/ayurveda-chat
///
/// Form field `message`; a missing message gets the general tip.
pub async fn ayurveda_chat(form: FormFields) -> Json<WellnessReply> {
    Json(wellness::respond(form.get("message").unwrap_or_default()))
}

/// Build chat routes
pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/api/ayurveda-chat", post(ayurveda_chat))
}
