use crate::delivery::{deliver_transcription, ChannelSink};
use crate::services::message_store::MessageStore;
use crate::voice::{tag_transcription, transcribe::{is_voice_attachment, transcribe_attachment}};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, error};

/// Stores every chat message from allowed users. Voice notes are
/// transcribed first and the transcription is echoed back to the channel.
pub async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    if message.author.bot {
        return Ok(());
    }
    if !data.access.is_allowed(message.author.id.get()) {
        debug!("Ignoring message from user {} (not on the allow-list)", message.author.id);
        return Ok(());
    }

    let store = MessageStore::new(data.db.clone());
    let conversation_id = message.channel_id.get() as i64;
    let author_id = message.author.id.get() as i64;
    let author_name = message
        .author
        .global_name
        .as_deref()
        .unwrap_or(message.author.name.as_str());

    let text = message.content.trim();
    if !text.is_empty() {
        store
            .append(conversation_id, author_id, Some(author_name), text)
            .await?;
    }

    for attachment in message.attachments.iter().filter(|a| is_voice_attachment(a)) {
        let typing = message.channel_id.start_typing(&ctx.http);
        let result = transcribe_attachment(&data.llm_client, attachment).await;
        drop(typing);

        let transcription = match result {
            Ok(text) => text,
            Err(e) => {
                error!("Voice transcription failed in channel {}: {}", message.channel_id, e);
                message
                    .channel_id
                    .say(&ctx.http, format!("❌ Transcription failed: {}", e))
                    .await?;
                continue;
            }
        };

        store
            .append(
                conversation_id,
                author_id,
                Some(author_name),
                &tag_transcription(&transcription),
            )
            .await?;

        let sink = ChannelSink::new(ctx.http.clone(), message.channel_id);
        deliver_transcription(&sink, author_name, &transcription).await?;
    }

    Ok(())
}
