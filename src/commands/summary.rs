use crate::commands::send_report;
use crate::services::bookmark::BookmarkStore;
use crate::summarize::SummaryOutcome;
use crate::{Context, Error};
use tracing::{error, info};

fn channel_conversation(ctx: &Context<'_>) -> i64 {
    ctx.channel_id().get() as i64
}

/// Summarize everything said since the last summary
#[poise::command(slash_command)]
pub async fn summary(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let conversation_id = channel_conversation(&ctx);
    match ctx.data().summaries.summarize_new(conversation_id).await {
        Ok(SummaryOutcome::NothingNew) => {
            ctx.say("📭 Nothing new since the last summary.").await?;
        }
        Ok(SummaryOutcome::Report {
            report,
            message_count,
            covered,
        }) => {
            ctx.say(format!("📋 Summary of **{}** new messages:", message_count))
                .await?;
            if let Err(e) = send_report(ctx, &report).await {
                // The bookmark has already moved past these messages.
                error!(
                    "Report for conversation {} covering messages {:?} was not delivered, \
                     /summary_reset to summarize them again: {}",
                    conversation_id, covered, e
                );
                return Err(e);
            }
        }
        Err(e) => {
            error!("Summary failed in conversation {}: {}", conversation_id, e);
            ctx.say(format!("❌ Summary failed: {}", e)).await?;
        }
    }

    Ok(())
}

/// Summarize the last N messages, regardless of earlier summaries
#[poise::command(slash_command)]
pub async fn summary_last(
    ctx: Context<'_>,
    #[description = "How many recent messages to include"]
    #[min = 1]
    #[max = 500]
    count: Option<usize>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let config = &ctx.data().config;
    let count = count
        .unwrap_or(config.summary_last_default)
        .clamp(1, config.summary_max_window.max(1));

    let conversation_id = channel_conversation(&ctx);
    match ctx
        .data()
        .summaries
        .summarize_recent(conversation_id, count)
        .await
    {
        Ok(SummaryOutcome::NothingNew) => {
            ctx.say("📭 No messages stored for this channel yet.").await?;
        }
        Ok(SummaryOutcome::Report {
            report,
            message_count,
            ..
        }) => {
            ctx.say(format!("📋 Summary of the last **{}** messages:", message_count))
                .await?;
            send_report(ctx, &report).await?;
        }
        Err(e) => {
            error!("Ad hoc summary failed in conversation {}: {}", conversation_id, e);
            ctx.say(format!("❌ Summary failed: {}", e)).await?;
        }
    }

    Ok(())
}

/// Forget the summary bookmark so the next summary covers the full history (Owner only)
#[poise::command(slash_command, owners_only)]
pub async fn summary_reset(ctx: Context<'_>) -> Result<(), Error> {
    let conversation_id = channel_conversation(&ctx);
    info!(
        "Bookmark reset for conversation {} requested by {}",
        conversation_id,
        ctx.author().name
    );

    let bookmarks = BookmarkStore::new(ctx.data().db.clone());
    if bookmarks.reset(conversation_id).await? {
        ctx.say("🔄 Bookmark cleared. The next `/summary` covers the whole history.")
            .await?;
    } else {
        ctx.say("📭 This channel has never been summarized.").await?;
    }
    Ok(())
}
