use poise::serenity_prelude as serenity;
use recap::access::AccessList;
use recap::commands::{analyze, start, status, summary};
use recap::db::Database;
use recap::llm::LlmClient;
use recap::summarize::{LlmSummarizer, SummarizationManager};
use recap::{config::Config, ingest, Data, Error};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command '{}' failed: {}", ctx.command().name, error);
            let _ = ctx.say(format!("❌ {}", error)).await;
        }
        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
            warn!("User {} is not on the allow-list", ctx.author().id);
            let _ = ctx.say("⛔ You are not allowed to use this bot.").await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let db = Database::new(&config)?;
    db.execute_init()?;

    let llm_client = Arc::new(LlmClient::new(&config));
    let summaries = SummarizationManager::new(
        db.clone(),
        Arc::new(LlmSummarizer::new(llm_client.clone())),
    );

    let access = AccessList::new(config.allowed_user_ids.iter().copied());
    if access.is_open() {
        warn!("ALLOWED_USER_IDS is empty, every user can talk to the bot");
    }

    let mut owners = HashSet::new();
    if let Some(owner_id) = config.owner_id {
        owners.insert(serenity::UserId::new(owner_id));
    }

    let data = Data {
        config,
        access,
        llm_client,
        db,
        summaries,
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                start::start(),
                summary::summary(),
                summary::summary_last(),
                summary::summary_reset(),
                analyze::analyze(),
                status::status(),
            ],
            owners,
            command_check: Some(|ctx| {
                Box::pin(async move { Ok(ctx.data().access.is_allowed(ctx.author().id.get())) })
            }),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::Message { new_message } = event {
                        ingest::handle_message(ctx, new_message, data).await?;
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                ctx.set_activity(Some(serenity::ActivityData::custom(
                    data.config.status_message.clone(),
                )));

                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
