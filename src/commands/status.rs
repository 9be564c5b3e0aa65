use crate::services::bookmark::BookmarkStore;
use crate::services::message_store::MessageStore;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show how much of this channel is already summarized
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let conversation_id = ctx.channel_id().get() as i64;
    let messages = MessageStore::new(ctx.data().db.clone());
    let bookmarks = BookmarkStore::new(ctx.data().db.clone());

    let bookmark = bookmarks.get(conversation_id).await?;
    let total = messages.count_since(conversation_id, 0).await?;
    let pending = messages.count_since(conversation_id, bookmark).await?;

    let last_summarized = match messages.get(bookmark).await? {
        Some(msg) => msg
            .created_at_utc()
            .map(|ts| format!("<t:{}:R>", ts.timestamp()))
            .unwrap_or(msg.created_at),
        None => "Never".to_string(),
    };

    let embed = serenity::CreateEmbed::new()
        .title("📊 Recap Status")
        .field("Stored messages", format!("`{}`", total), true)
        .field("Not yet summarized", format!("`{}`", pending), true)
        .field("Summarized up to", last_summarized, true)
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
