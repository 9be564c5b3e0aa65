use crate::commands::send_report;
use crate::{Context, Error};
use tracing::error;

/// Turn pasted notes or a chat log into decisions and action items
#[poise::command(slash_command)]
pub async fn analyze(
    ctx: Context<'_>,
    #[description = "Meeting notes or a chat log to analyze"] text: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    match ctx.data().summaries.analyze(&text).await {
        Ok(Some(report)) => send_report(ctx, &report).await?,
        Ok(None) => {
            ctx.say("📭 Nothing to analyze.").await?;
        }
        Err(e) => {
            error!("Analysis requested by {} failed: {}", ctx.author().name, e);
            ctx.say(format!("❌ Analysis failed: {}", e)).await?;
        }
    }

    Ok(())
}
