use crate::llm::LlmClient;
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

pub fn is_voice_attachment(attachment: &serenity::Attachment) -> bool {
    super::is_audio_content_type(attachment.content_type.as_deref())
}

/// Downloads a voice note and converts it to text.
pub async fn transcribe_attachment(
    llm: &LlmClient,
    attachment: &serenity::Attachment,
) -> anyhow::Result<String> {
    debug!(
        "Downloading voice note {} ({} bytes)",
        attachment.filename, attachment.size
    );
    let audio = attachment.download().await?;

    let text = llm.transcribe(&attachment.filename, audio).await?;
    let text = text.trim().to_string();
    if text.is_empty() {
        anyhow::bail!("the voice note contains no recognizable speech");
    }

    info!(
        "Transcribed voice note {} into {} characters",
        attachment.filename,
        text.chars().count()
    );
    Ok(text)
}
