//! Outbound text delivery.
//!
//! Texts longer than [`DOCUMENT_THRESHOLD`] characters are written to a
//! temporary file and sent as a document. The file is removed when the
//! delivery finishes, whether the upload succeeded or not.

use crate::config::{DISCORD_MESSAGE_LIMIT, DOCUMENT_THRESHOLD};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Where reports and transcriptions end up.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
    async fn send_document(&self, path: &Path, caption: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Inline,
    Document,
}

pub fn needs_document(text: &str) -> bool {
    text.chars().count() > DOCUMENT_THRESHOLD
}

/// Sends `text` inline, or as a `<file_prefix>*.txt` attachment when it is
/// too long for a message.
pub async fn deliver(
    sink: &dyn ReportSink,
    text: &str,
    file_prefix: &str,
    caption: &str,
) -> anyhow::Result<Delivery> {
    if !needs_document(text) {
        sink.send_text(text).await?;
        return Ok(Delivery::Inline);
    }
    send_as_document(sink, text, file_prefix, caption).await
}

/// Echoes a voice transcription. The size rule looks at the transcription
/// alone; the author decoration goes inline or into the document caption.
pub async fn deliver_transcription(
    sink: &dyn ReportSink,
    author: &str,
    transcription: &str,
) -> anyhow::Result<Delivery> {
    if needs_document(transcription) {
        let caption = format!("🎙️ Transcript of {}'s voice note", author);
        return send_as_document(sink, transcription, "transcript_", &caption).await;
    }
    // Display names are at most 32 characters, so this still fits an embed.
    sink.send_text(&format!("🎙️ {}: {}", author, transcription)).await?;
    Ok(Delivery::Inline)
}

async fn send_as_document(
    sink: &dyn ReportSink,
    text: &str,
    file_prefix: &str,
    caption: &str,
) -> anyhow::Result<Delivery> {
    // Dropping the handle deletes the file on every early return below.
    let mut file = tempfile::Builder::new()
        .prefix(file_prefix)
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;

    info!(
        "Text of {} characters exceeds {}, sending as document",
        text.chars().count(),
        DOCUMENT_THRESHOLD
    );
    sink.send_document(file.path(), caption).await?;

    file.close()?;
    Ok(Delivery::Document)
}

/// Posts into a Discord channel.
pub struct ChannelSink {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
}

impl ChannelSink {
    pub fn new(http: Arc<serenity::Http>, channel_id: serenity::ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ReportSink for ChannelSink {
    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        let builder = if text.chars().count() <= DISCORD_MESSAGE_LIMIT {
            serenity::CreateMessage::new().content(text)
        } else {
            // Embed descriptions take up to 4096 characters.
            let embed = serenity::CreateEmbed::new()
                .title("📋 Recap")
                .description(text)
                .color(0x5865F2);
            serenity::CreateMessage::new().embed(embed)
        };

        self.channel_id.send_message(&self.http, builder).await?;
        Ok(())
    }

    async fn send_document(&self, path: &Path, caption: &str) -> anyhow::Result<()> {
        let attachment = serenity::CreateAttachment::path(path).await?;
        let builder = serenity::CreateMessage::new()
            .content(caption)
            .add_file(attachment);

        debug!("Uploading {:?} to channel {}", path, self.channel_id);
        self.channel_id.send_message(&self.http, builder).await?;
        Ok(())
    }
}
