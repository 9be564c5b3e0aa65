use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub discord_token: String,
    pub owner_id: Option<u64>,
    /// Users allowed to talk to the bot. Empty means everyone.
    pub allowed_user_ids: Vec<u64>,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub transcription_model: String,
    pub database_url: String,
    pub llm_timeout_secs: u64,
    // Ad hoc "last N" summaries
    pub summary_last_default: usize,
    pub summary_max_window: usize,
    pub status_message: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            owner_id: env::var("OWNER_ID").ok().and_then(|id| id.parse().ok()),
            allowed_user_ids: parse_user_ids(
                &env::var("ALLOWED_USER_IDS").unwrap_or_default(),
            )?,
            llm_url: env::var("LLM_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            transcription_model: env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/recap.db".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            summary_last_default: env::var("SUMMARY_LAST_DEFAULT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            summary_max_window: env::var("SUMMARY_MAX_WINDOW")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Taking notes".to_string()),
        })
    }
}

/// Parses a comma separated list of Discord user ids.
pub fn parse_user_ids(raw: &str) -> anyhow::Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("ALLOWED_USER_IDS contains an invalid id: '{}'", s))
        })
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("allowed_user_ids", &self.allowed_user_ids)
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("transcription_model", &self.transcription_model)
            .field("database_url", &self.database_url)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("summary_last_default", &self.summary_last_default)
            .field("summary_max_window", &self.summary_max_window)
            .field("status_message", &self.status_message)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Longer outbound texts are sent as a document attachment
pub const DOCUMENT_THRESHOLD: usize = 4000;
