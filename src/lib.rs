pub mod access;
pub mod commands;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod services;
pub mod summarize;
pub mod voice;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub access: access::AccessList,
    pub llm_client: std::sync::Arc<llm::LlmClient>,
    pub db: db::Database,
    pub summaries: summarize::SummarizationManager,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
