//! Incremental summarization pipeline.
//!
//! Each conversation keeps a bookmark pointing at the last message already
//! covered by a summary. A summary request selects every message after the
//! bookmark, sends it to the [`Summarizer`] and only then moves the bookmark
//! to the newest id of that window. A failed summary leaves the bookmark
//! where it was, so the next request sees the same window again.

use crate::db::{ChatLine, Database, MessageId, WindowMessage};
use crate::error::{LlmError, PipelineError};
use crate::llm::LlmClient;
use crate::services::bookmark::BookmarkStore;
use crate::services::message_store::MessageStore;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const REPORT_INSTRUCTIONS: &str = "You are an experienced project manager's assistant. \
You receive a chat transcript, one message per line in the form `author: text`. \
Messages starting with [voice] are transcribed voice notes. \
Turn the transcript into a structured report in Markdown with exactly these sections:\n\n\
📝 **Summary:**\n- what was discussed, in a few bullet points\n\n\
✅ **Action items:**\n- [Owner] Task (deadline, if mentioned)\n\n\
🎯 **Decisions:**\n- ...\n\n\
⚠️ **Risks and open questions:**\n- ...\n\n\
If the owner of a task is unclear, write [?]. If a section has nothing, write \"- none\". \
Ignore greetings and small talk.";

/// Turns an ordered batch of chat lines, or free-form notes, into a report.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, lines: &[ChatLine]) -> Result<String, LlmError>;

    /// Same report, built from text pasted in by the user.
    async fn analyze(&self, notes: &str) -> Result<String, LlmError>;
}

/// One `author: text` line per message, in the given order.
pub fn build_transcript(lines: &[ChatLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}: {}", line.author, line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// [`Summarizer`] backed by the chat completion endpoint.
pub struct LlmSummarizer {
    llm: Arc<LlmClient>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }

    fn build_messages(lines: &[ChatLine]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        Self::report_request(format!("Chat transcript:\n{}", build_transcript(lines)))
    }

    fn report_request(user_content: String) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(REPORT_INSTRUCTIONS.to_string())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_content)
                .build()?
                .into(),
        ])
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, lines: &[ChatLine]) -> Result<String, LlmError> {
        debug!("Requesting report for {} messages", lines.len());
        let messages = Self::build_messages(lines)?;
        self.llm.chat(messages).await
    }

    async fn analyze(&self, notes: &str) -> Result<String, LlmError> {
        debug!("Requesting report for {} characters of notes", notes.chars().count());
        let messages = Self::report_request(notes.to_string())?;
        self.llm.chat(messages).await
    }
}

/// Messages newer than the bookmark, ascending by id.
#[derive(Debug, Clone)]
pub struct Window {
    pub messages: Vec<WindowMessage>,
    pub last_id: MessageId,
}

impl Window {
    /// `None` when there is nothing to summarize.
    pub fn from_messages(messages: Vec<WindowMessage>) -> Option<Self> {
        let last_id = messages.iter().map(|m| m.id).max()?;
        Some(Self { messages, last_id })
    }

    pub fn lines(&self) -> Vec<ChatLine> {
        self.messages.iter().cloned().map(ChatLine::from).collect()
    }

    pub fn id_range(&self) -> RangeInclusive<MessageId> {
        let first = self.messages.iter().map(|m| m.id).min().unwrap_or(self.last_id);
        first..=self.last_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    NothingNew,
    /// `covered` is the id range the bookmark moved over; `None` for ad hoc
    /// summaries, which leave the bookmark alone.
    Report {
        report: String,
        message_count: usize,
        covered: Option<RangeInclusive<MessageId>>,
    },
}

/// Composes the stores and the summarizer. Cheap to clone.
#[derive(Clone)]
pub struct SummarizationManager {
    messages: MessageStore,
    bookmarks: BookmarkStore,
    summarizer: Arc<dyn Summarizer>,
    locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SummarizationManager {
    pub fn new(db: Database, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            messages: MessageStore::new(db.clone()),
            bookmarks: BookmarkStore::new(db),
            summarizer,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn conversation_lock(&self, conversation_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(conversation_id).or_default().clone()
    }

    /// Drops the map entry once no other run holds or waits on it.
    fn release_lock(&self, conversation_id: i64, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map, the other is `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&conversation_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn select_window(&self, conversation_id: i64) -> Result<Option<Window>, PipelineError> {
        let after_id = self.bookmarks.get(conversation_id).await?;
        let messages = self.messages.since(conversation_id, after_id).await?;
        Ok(Window::from_messages(messages))
    }

    /// Summarizes everything after the bookmark and advances it on success.
    ///
    /// Runs are serialized per conversation, so two overlapping requests
    /// never summarize the same messages or move the bookmark backwards.
    pub async fn summarize_new(&self, conversation_id: i64) -> Result<SummaryOutcome, PipelineError> {
        let lock = self.conversation_lock(conversation_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_incremental(conversation_id).await
        };
        self.release_lock(conversation_id, lock);
        result
    }

    async fn run_incremental(&self, conversation_id: i64) -> Result<SummaryOutcome, PipelineError> {
        let Some(window) = self.select_window(conversation_id).await? else {
            info!("No new messages to summarize for conversation {}", conversation_id);
            return Ok(SummaryOutcome::NothingNew);
        };

        info!(
            "Summarizing {} new messages for conversation {} (up to message {})",
            window.messages.len(),
            conversation_id,
            window.last_id
        );

        let report = match self.summarizer.summarize(&window.lines()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    "Summary failed for conversation {}, bookmark left untouched: {}",
                    conversation_id, e
                );
                return Err(e.into());
            }
        };

        self.bookmarks.advance(conversation_id, window.last_id).await?;

        Ok(SummaryOutcome::Report {
            report,
            message_count: window.messages.len(),
            covered: Some(window.id_range()),
        })
    }

    /// Ad hoc summary of the last `limit` messages. Never reads or writes
    /// the bookmark.
    pub async fn summarize_recent(
        &self,
        conversation_id: i64,
        limit: usize,
    ) -> Result<SummaryOutcome, PipelineError> {
        let lines = self.messages.recent(conversation_id, limit).await?;
        if lines.is_empty() {
            return Ok(SummaryOutcome::NothingNew);
        }

        info!(
            "Summarizing last {} messages for conversation {}",
            lines.len(),
            conversation_id
        );
        let report = self.summarizer.summarize(&lines).await?;

        Ok(SummaryOutcome::Report {
            report,
            message_count: lines.len(),
            covered: None,
        })
    }

    /// Report from pasted notes. Touches neither store; `None` for blank
    /// input.
    pub async fn analyze(&self, notes: &str) -> Result<Option<String>, PipelineError> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Ok(None);
        }

        info!("Analyzing {} characters of pasted notes", notes.chars().count());
        let report = self.summarizer.analyze(notes).await?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Records every batch it receives and replays scripted results.
    #[derive(Default)]
    struct FakeSummarizer {
        calls: Mutex<Vec<Vec<ChatLine>>>,
        notes: Mutex<Vec<String>>,
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        delay: Option<Duration>,
    }

    impl FakeSummarizer {
        fn failing_once() -> Self {
            let fake = Self::default();
            fake.script
                .lock()
                .unwrap()
                .push_back(Err(LlmError::Timeout(1)));
            fake
        }

        fn calls(&self) -> Vec<Vec<ChatLine>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, lines: &[ChatLine]) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(lines.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| Ok(format!("report of {} lines", lines.len())))
        }

        async fn analyze(&self, notes: &str) -> Result<String, LlmError> {
            self.notes.lock().unwrap().push(notes.to_string());
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| Ok(format!("analysis of {} chars", notes.len())))
        }
    }

    fn line(author: &str, text: &str) -> ChatLine {
        ChatLine {
            author: author.to_string(),
            text: text.to_string(),
        }
    }

    fn setup(fake: FakeSummarizer) -> (SummarizationManager, MessageStore, BookmarkStore, Arc<FakeSummarizer>) {
        let db = test_db();
        let fake = Arc::new(fake);
        let manager = SummarizationManager::new(db.clone(), fake.clone());
        (manager, MessageStore::new(db.clone()), BookmarkStore::new(db), fake)
    }

    #[test]
    fn test_build_transcript() {
        let lines = vec![line("Alice", "hi"), line("Bob", "[voice]: ok")];
        assert_eq!(build_transcript(&lines), "Alice: hi\nBob: [voice]: ok");
        assert_eq!(build_transcript(&[]), "");
    }

    #[test]
    fn test_window_tracks_max_id() {
        assert!(Window::from_messages(Vec::new()).is_none());
        let window = Window::from_messages(vec![
            WindowMessage { id: 3, author: "A".into(), text: "x".into() },
            WindowMessage { id: 7, author: "B".into(), text: "y".into() },
        ])
        .unwrap();
        assert_eq!(window.last_id, 7);
        assert_eq!(window.id_range(), 3..=7);
        assert_eq!(window.lines(), vec![line("A", "x"), line("B", "y")]);
    }

    #[test]
    fn test_llm_request_carries_instructions_and_transcript() {
        let messages = LlmSummarizer::build_messages(&[line("Alice", "ship it")]).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[tokio::test]
    async fn test_incremental_windows() {
        let (manager, store, bookmarks, fake) = setup(FakeSummarizer::default());
        let c1 = 1;
        store.append(c1, 1, Some("Alice"), "hi").await.unwrap();
        let second = store
            .append(c1, 1, Some("Alice"), "let's ship by Friday")
            .await
            .unwrap();

        let first = store.since(c1, 0).await.unwrap()[0].id;

        let outcome = manager.summarize_new(c1).await.unwrap();
        assert_eq!(
            outcome,
            SummaryOutcome::Report {
                report: "report of 2 lines".to_string(),
                message_count: 2,
                covered: Some(first..=second),
            }
        );
        assert_eq!(bookmarks.get(c1).await.unwrap(), second);

        let third = store.append(c1, 2, Some("Bob"), "ok").await.unwrap();
        let outcome = manager.summarize_new(c1).await.unwrap();
        assert!(matches!(
            outcome,
            SummaryOutcome::Report { covered: Some(ref range), .. } if *range == (third..=third)
        ));
        assert_eq!(bookmarks.get(c1).await.unwrap(), third);

        let calls = fake.calls();
        assert_eq!(
            calls,
            vec![
                vec![line("Alice", "hi"), line("Alice", "let's ship by Friday")],
                vec![line("Bob", "ok")],
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_conversation_is_nothing_new() {
        let (manager, _store, bookmarks, fake) = setup(FakeSummarizer::default());
        assert_eq!(manager.summarize_new(1).await.unwrap(), SummaryOutcome::NothingNew);
        assert_eq!(bookmarks.get(1).await.unwrap(), 0);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_empty_requests_keep_bookmark() {
        let (manager, store, bookmarks, _fake) = setup(FakeSummarizer::default());
        let id = store.append(1, 1, Some("Alice"), "hi").await.unwrap();
        manager.summarize_new(1).await.unwrap();

        assert_eq!(manager.summarize_new(1).await.unwrap(), SummaryOutcome::NothingNew);
        assert_eq!(manager.summarize_new(1).await.unwrap(), SummaryOutcome::NothingNew);
        assert_eq!(bookmarks.get(1).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_failed_summary_leaves_bookmark_and_retries_same_window() {
        let (manager, store, bookmarks, fake) = setup(FakeSummarizer::failing_once());
        store.append(1, 1, Some("Alice"), "hi").await.unwrap();
        let last = store.append(1, 2, Some("Bob"), "hello").await.unwrap();

        let err = manager.summarize_new(1).await.unwrap_err();
        assert!(err.is_summarizer());
        assert_eq!(bookmarks.get(1).await.unwrap(), 0);

        manager.summarize_new(1).await.unwrap();
        assert_eq!(bookmarks.get(1).await.unwrap(), last);

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn test_every_message_lands_in_exactly_one_window() {
        let fake = FakeSummarizer::default();
        {
            let mut script = fake.script.lock().unwrap();
            script.push_back(Ok("first".into()));
            script.push_back(Err(LlmError::EmptyResponse));
            script.push_back(Ok("second".into()));
        }
        let (manager, store, bookmarks, fake) = setup(fake);

        let mut appended = Vec::new();
        let mut summarized: Vec<String> = Vec::new();
        for round in 0..4 {
            for i in 0..3 {
                let text = format!("round {} message {}", round, i);
                store.append(1, 1, Some("Alice"), &text).await.unwrap();
                appended.push(text);
            }
            // Another conversation must not leak into the windows.
            store.append(2, 9, Some("Eve"), "noise").await.unwrap();

            let before = bookmarks.get(1).await.unwrap();
            match manager.summarize_new(1).await {
                Ok(SummaryOutcome::Report { .. }) => {
                    let window = fake.calls().last().unwrap().clone();
                    summarized.extend(window.into_iter().map(|l| l.text));
                    assert!(bookmarks.get(1).await.unwrap() > before);
                }
                Ok(SummaryOutcome::NothingNew) => panic!("window should not be empty"),
                Err(_) => assert_eq!(bookmarks.get(1).await.unwrap(), before),
            }
        }

        assert_eq!(summarized, appended);
        let newest = store.since(1, 0).await.unwrap().last().unwrap().id;
        assert_eq!(bookmarks.get(1).await.unwrap(), newest);
    }

    #[tokio::test]
    async fn test_overlapping_requests_are_serialized() {
        let fake = FakeSummarizer {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let (manager, store, _bookmarks, fake) = setup(fake);
        store.append(1, 1, Some("Alice"), "hi").await.unwrap();
        store.append(1, 2, Some("Bob"), "hey").await.unwrap();

        let (a, b) = tokio::join!(manager.summarize_new(1), manager.summarize_new(1));
        let outcomes = [a.unwrap(), b.unwrap()];
        let reports = outcomes
            .iter()
            .filter(|o| matches!(o, SummaryOutcome::Report { .. }))
            .count();
        assert_eq!(reports, 1);
        assert_eq!(fake.calls().len(), 1);
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_conversation_locks_are_released() {
        let (manager, store, _bookmarks, _fake) = setup(FakeSummarizer::failing_once());
        for conversation in 1..=3 {
            store.append(conversation, 1, Some("Alice"), "hi").await.unwrap();
        }

        assert!(manager.summarize_new(1).await.is_err());
        manager.summarize_new(2).await.unwrap();
        manager.summarize_new(3).await.unwrap();
        manager.summarize_new(4).await.unwrap();
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_summarize_recent_ignores_bookmark() {
        let (manager, store, bookmarks, fake) = setup(FakeSummarizer::default());
        assert_eq!(
            manager.summarize_recent(1, 5).await.unwrap(),
            SummaryOutcome::NothingNew
        );

        store.append(1, 1, Some("Alice"), "one").await.unwrap();
        store.append(1, 2, Some("Bob"), "two").await.unwrap();
        store.append(1, 1, Some("Alice"), "three").await.unwrap();
        bookmarks.advance(1, 1).await.unwrap();

        let outcome = manager.summarize_recent(1, 2).await.unwrap();
        assert!(matches!(
            outcome,
            SummaryOutcome::Report { message_count: 2, covered: None, .. }
        ));
        assert_eq!(fake.calls()[0], vec![line("Bob", "two"), line("Alice", "three")]);
        assert_eq!(bookmarks.get(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summarize_recent_propagates_failure() {
        let (manager, store, bookmarks, _fake) = setup(FakeSummarizer::failing_once());
        store.append(1, 1, Some("Alice"), "one").await.unwrap();
        assert!(manager.summarize_recent(1, 10).await.unwrap_err().is_summarizer());
        assert_eq!(bookmarks.get(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_analyze_passes_notes_through_and_leaves_stores_alone() {
        let (manager, store, bookmarks, fake) = setup(FakeSummarizer::default());
        store.append(1, 1, Some("Alice"), "hi").await.unwrap();

        let notes = "Meeting 12.03\nBob: I'll fix the login page by Monday\nsomeone should call the client";
        let report = manager.analyze(&format!("  {}\n", notes)).await.unwrap();
        assert_eq!(report, Some(format!("analysis of {} chars", notes.len())));
        assert_eq!(*fake.notes.lock().unwrap(), vec![notes.to_string()]);
        assert!(fake.calls().is_empty());

        assert_eq!(store.count_since(1, 0).await.unwrap(), 1);
        assert_eq!(bookmarks.get(1).await.unwrap(), 0);
        assert_eq!(manager.select_window(1).await.unwrap().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_blank_input_skips_the_model() {
        let (manager, _store, _bookmarks, fake) = setup(FakeSummarizer::default());
        assert_eq!(manager.analyze("   \n").await.unwrap(), None);
        assert!(fake.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_propagates_failure() {
        let (manager, _store, _bookmarks, _fake) = setup(FakeSummarizer::failing_once());
        assert!(manager.analyze("notes").await.unwrap_err().is_summarizer());
    }
}
