pub mod transcribe;

/// Marks stored text that came from a voice note.
pub const VOICE_PREFIX: &str = "[voice]: ";

pub fn tag_transcription(text: &str) -> String {
    format!("{}{}", VOICE_PREFIX, text.trim())
}

pub fn is_audio_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("audio/"))
}
