use serde::Deserialize;

const DEFAULT_QUESTION: &str = "¿Es una buena inversión?";

#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub username: String,
    pub first_name: String,
}

#[derive(Deserialize)]
struct GetMeResponse {
    ok: bool,
    result: Option<BotInfo>,
}

/// Resolves the bot handle needed for t.me deep links. `None` on any
/// failure; the chat hand-off is then disabled, never blocking.
pub async fn bot_info(client: &reqwest::Client, token: &str) -> Option<BotInfo> {
    let url = format!("https://api.telegram.org/bot{token}/getMe");

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Telegram getMe request failed");
            return None;
        }
    };

    match response.json::<GetMeResponse>().await {
        Ok(body) if body.ok => body.result,
        Ok(_) => {
            tracing::warn!("Telegram getMe returned ok=false");
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "Telegram getMe returned an unreadable body");
            None
        }
    }
}

/// Deep link opening a chat with the bot, message prefilled.
pub fn deep_link(bot_username: &str, text: &str) -> Option<String> {
    let mut url = reqwest::Url::parse("https://t.me/").ok()?.join(bot_username).ok()?;
    url.query_pairs_mut().append_pair("text", text);
    Some(url.to_string())
}

/// The prefilled consultation message handed to the bot.
pub fn consultation_message(title: &str, location: &str, question: Option<&str>) -> String {
    let question = match question {
        Some(q) if !q.trim().is_empty() => q,
        _ => DEFAULT_QUESTION,
    };
    format!(
        "Hola! Vengo de InmoAI Analytics. Quisiera consultar sobre el inmueble: \
         \"{title}\" en {location}. Mi duda es: {question}"
    )
}
