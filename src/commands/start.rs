use crate::{Context, Error};

const WELCOME: &str = "👋 Hi! I keep notes of this channel and turn them into reports.\n\n\
Just chat as usual (voice notes get transcribed too), then:\n\
• `/summary`: decisions, action items and risks from everything new since the last summary\n\
• `/summary_last`: a one-off summary of the last N messages\n\
• `/analyze`: paste meeting notes or a chat log and get the same report\n\
• `/status`: how much is still waiting to be summarized";

/// Show what the bot does and how to use it
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(WELCOME).await?;
    Ok(())
}
