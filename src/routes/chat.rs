use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::services::telegram;

#[derive(Debug, Deserialize)]
pub struct ChatLinkQuery {
    pub title: String,
    pub location: String,
    pub question: Option<String>,
}

/// Everything `None` means the hand-off is disabled; the report view renders
/// without the chat panel instead of failing.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

pub async fn chat_link(
    State(state): State<AppState>,
    Query(params): Query<ChatLinkQuery>,
) -> Json<ChatLink> {
    let Some(token) = state.config.telegram_bot_token.as_deref() else {
        tracing::debug!("TELEGRAM_BOT_TOKEN not set, chat hand-off disabled");
        return Json(ChatLink::default());
    };

    let Some(info) = telegram::bot_info(&state.http, token).await else {
        return Json(ChatLink::default());
    };

    let message = telegram::consultation_message(
        &params.title,
        &params.location,
        params.question.as_deref(),
    );

    Json(ChatLink {
        url: telegram::deep_link(&info.username, &message),
        bot_username: Some(info.username),
        bot_name: Some(info.first_name),
    })
}
