use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    /// Presence selects the Postgres backend; absent means the in-memory
    /// session store. Evaluated once at startup, never re-checked.
    pub database_url: Option<String>,
    /// Owner id stamped on records in database mode.
    pub app_user_id: String,
    pub webhook_url: String,
    pub webhook_max_retries: u32,
    pub webhook_initial_backoff: Duration,
    pub llm_provider: String,
    pub llm_model: String,
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub orchestration_timeout: Duration,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("APP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("APP_PORT must be a number"),
            environment: env::var("APP_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            app_user_id: env::var("APP_USER_ID")
                .unwrap_or_else(|_| "local-user-123".to_string()),
            webhook_url: env::var("ANALYSIS_WEBHOOK_URL")
                .expect("ANALYSIS_WEBHOOK_URL must be set"),
            webhook_max_retries: env::var("WEBHOOK_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("WEBHOOK_MAX_RETRIES must be a number"),
            webhook_initial_backoff: Duration::from_millis(
                env::var("WEBHOOK_INITIAL_BACKOFF_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .expect("WEBHOOK_INITIAL_BACKOFF_MS must be a number"),
            ),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "google".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            google_api_key: env::var("GOOGLE_API_KEY").ok(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            orchestration_timeout: Duration::from_secs(
                env::var("ORCHESTRATION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "240".to_string())
                    .parse()
                    .expect("ORCHESTRATION_TIMEOUT_SECS must be a number"),
            ),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "property-report-generator".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            default_temperature: env::var("DEFAULT_TEMPERATURE")
                .unwrap_or_else(|_| "0.3".to_string())
                .parse()
                .expect("DEFAULT_TEMPERATURE must be a number"),
            default_max_tokens: env::var("DEFAULT_MAX_TOKENS")
                .unwrap_or_else(|_| "8192".to_string())
                .parse()
                .expect("DEFAULT_MAX_TOKENS must be a number"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
