//! Chat widget backend: remote-first answers with a local keyword fallback.
//!
//! ## Resolution flow
//!
//!   1. The trimmed question is appended to history as a user entry.
//!   2. The [`AnswerService`] is asked once (no retries).
//!   3. Any remote failure (transport, status, body) is swallowed and the
//!      question is matched against the [`KeywordDictionary`] instead.
//!   4. The answer is appended to history as an assistant entry.
//!
//! History is capped at [`HISTORY_LIMIT`] entries (oldest dropped first) and
//! persisted after every append under [`KEY_CHAT_HISTORY`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::storage::{KeyValueStore, StorageError, KEY_CHAT_HISTORY};

pub const HISTORY_LIMIT: usize = 50;
pub const REPLAY_LIMIT: usize = 10;

/// Returned when the remote service answers successfully but without text.
pub const NO_ANSWER: &str = "Sorry, I couldn't get a response. Please try again.";

// ── Conversation history ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub text: String,
    pub sender: Sender,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ConversationEntry {
    pub fn now(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            text: text.into(),
            sender,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ── Keyword fallback ──────────────────────────────────────────────────────────

/// Ordered keyword → canned response pairs plus a default response.
/// The first keyword contained in the lowercased question wins.
#[derive(Debug, Clone)]
pub struct KeywordDictionary {
    entries: Vec<(String, String)>,
    default_response: String,
}

impl KeywordDictionary {
    pub fn new(entries: Vec<(String, String)>, default_response: impl Into<String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(keyword, response)| (keyword.to_lowercase(), response))
            .collect();
        Self {
            entries,
            default_response: default_response.into(),
        }
    }

    pub fn builtin() -> Self {
        let entries = [
            ("meet", "They met on LinkedIn! A Computer Science student and an IT student who connected over a shared passion for technology. Late-night chats about code and dreams laid the foundation for their story."),
            ("dream", "He once had a beautiful dream that they were at the university's Green Belt. He rested his head in her lap and fell asleep. She watched over him, and even though it got dark and she was scared, she didn't wake him. It's a symbol of their care for each other."),
            ("poem", "Here is a verse for you: 'Whatever our souls are made of, his and mine are the same.' - Emily Brontë"),
            ("story", "Their story began on LinkedIn and blossomed at Islamia University Bahawalpur, filled with shared projects, late-night study sessions, and a beautiful dream that symbolizes their connection."),
            ("hello", "Hello! How can I help you learn more about their story?"),
            ("hi", "Hi there! Feel free to ask me anything about their journey."),
        ];
        Self::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            "That's a lovely thought! I can tell you about how they met, about a special dream, or share a poem. What would you like to know?",
        )
    }

    pub fn lookup(&self, input: &str) -> &str {
        let lower = input.to_lowercase();
        self.entries
            .iter()
            .find(|(keyword, _)| lower.contains(keyword.as_str()))
            .map(|(_, response)| response.as_str())
            .unwrap_or(&self.default_response)
    }

    pub fn response_for(&self, keyword: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, response)| response.as_str())
    }

    pub fn default_response(&self) -> &str {
        &self.default_response
    }
}

// ── Remote answer service ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("answer service unreachable: {0}")]
    Transport(String),
    #[error("answer service returned status {0}")]
    Status(u16),
    #[error("answer service sent a malformed body: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait AnswerService: Send + Sync {
    /// `Ok(None)` means the service answered without an `answer` field.
    async fn ask(&self, question: &str, story_context: &str)
        -> Result<Option<String>, AnswerError>;
}

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    #[serde(rename = "storyContext")]
    story_context: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// JSON-over-HTTP answer service.
pub struct HttpAnswerService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnswerService {
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("keepsake/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
        )
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn ask(
        &self,
        question: &str,
        story_context: &str,
    ) -> Result<Option<String>, AnswerError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&AskRequest {
                question,
                story_context,
            })
            .send()
            .await
            .map_err(|e| AnswerError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AnswerError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| AnswerError::Transport(e.to_string()))?;
        let parsed: AskResponse =
            serde_json::from_slice(&body).map_err(|e| AnswerError::Malformed(e.to_string()))?;
        Ok(parsed.answer)
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    AwaitingRemote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

pub struct ChatResolver {
    service: Arc<dyn AnswerService>,
    dictionary: KeywordDictionary,
    story_context: String,
    store: Arc<dyn KeyValueStore>,
    history: Vec<ConversationEntry>,
    phase: ChatPhase,
}

impl ChatResolver {
    /// Build a resolver and load any persisted history. Unreadable history is
    /// discarded rather than treated as an error.
    pub fn new(
        service: Arc<dyn AnswerService>,
        dictionary: KeywordDictionary,
        story_context: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let history = Self::load_history(store.as_ref());
        debug!("Loaded {} chat history entries", history.len());
        Self {
            service,
            dictionary,
            story_context: story_context.into(),
            store,
            history,
            phase: ChatPhase::Idle,
        }
    }

    /// Most recent entries to show when the widget first renders.
    pub fn replay(&self) -> &[ConversationEntry] {
        let start = self.history.len().saturating_sub(REPLAY_LIMIT);
        &self.history[start..]
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn dictionary(&self) -> &KeywordDictionary {
        &self.dictionary
    }

    pub async fn resolve(&mut self, input: &str) -> Result<Reply, ChatError> {
        let question = input.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.record(question, Sender::User)?;

        self.phase = ChatPhase::AwaitingRemote;
        let outcome = self.service.ask(question, &self.story_context).await;
        self.phase = ChatPhase::Idle;

        let reply = match outcome {
            Ok(answer) => Reply {
                text: answer
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| NO_ANSWER.to_string()),
                source: ReplySource::Remote,
            },
            Err(e) => {
                warn!("Answer service unavailable, using fallback: {}", e);
                Reply {
                    text: self.dictionary.lookup(question).to_string(),
                    source: ReplySource::Fallback,
                }
            }
        };
        info!("Chat resolved via {:?}", reply.source);

        self.record(&reply.text, Sender::Assistant)?;
        Ok(reply)
    }

    fn record(&mut self, text: &str, sender: Sender) -> Result<(), ChatError> {
        self.history.push(ConversationEntry::now(text, sender));
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        let json = serde_json::to_string(&self.history).map_err(StorageError::from)?;
        self.store.set(KEY_CHAT_HISTORY, &json)?;
        Ok(())
    }

    fn load_history(store: &dyn KeyValueStore) -> Vec<ConversationEntry> {
        let Some(raw) = store.get(KEY_CHAT_HISTORY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(e) => {
                warn!("Discarding unreadable chat history: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Mutex;

    /// Replays a scripted sequence of outcomes and records the questions.
    struct ScriptedService {
        outcomes: Mutex<Vec<Result<Option<String>, AnswerError>>>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedService {
        fn new(outcomes: Vec<Result<Option<String>, AnswerError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn down() -> Arc<Self> {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl AnswerService for ScriptedService {
        async fn ask(
            &self,
            question: &str,
            story_context: &str,
        ) -> Result<Option<String>, AnswerError> {
            self.seen
                .lock()
                .unwrap()
                .push((question.to_string(), story_context.to_string()));
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Err(AnswerError::Transport("connection refused".into()))
            } else {
                outcomes.remove(0)
            }
        }
    }

    fn resolver_with(service: Arc<ScriptedService>, store: Arc<MemoryStore>) -> ChatResolver {
        ChatResolver::new(service, KeywordDictionary::builtin(), "Once upon a time", store)
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_ordered() {
        let dict = KeywordDictionary::builtin();
        assert_eq!(dict.lookup("How did they MEET?"), dict.response_for("meet").unwrap());
        // "dream" precedes "story" in the dictionary
        assert_eq!(
            dict.lookup("the story of the dream"),
            dict.response_for("dream").unwrap()
        );
        assert_eq!(dict.lookup("Hi!"), dict.response_for("hi").unwrap());
        assert_eq!(dict.lookup("what is love"), dict.default_response());
    }

    #[test]
    fn test_custom_dictionary_keywords_are_lowercased() {
        let dict = KeywordDictionary::new(
            vec![("Green".to_string(), "belt".to_string())],
            "none",
        );
        assert_eq!(dict.lookup("the GREEN belt"), "belt");
        assert_eq!(dict.lookup("blue"), "none");
    }

    #[tokio::test]
    async fn test_dream_scenario_with_remote_down() {
        let store = Arc::new(MemoryStore::new());
        let mut chat = resolver_with(ScriptedService::down(), store);

        let reply = chat.resolve("tell me about their dream").await.unwrap();
        assert_eq!(reply.source, ReplySource::Fallback);
        assert_eq!(
            reply.text,
            KeywordDictionary::builtin().response_for("dream").unwrap()
        );
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test]
    async fn test_unmatched_input_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        let service = ScriptedService::new(vec![Err(AnswerError::Status(502))]);
        let mut chat = resolver_with(service, store);

        let reply = chat.resolve("what a lovely site").await.unwrap();
        assert_eq!(reply.text, KeywordDictionary::builtin().default_response());
    }

    #[tokio::test]
    async fn test_remote_answer_is_returned_verbatim() {
        let store = Arc::new(MemoryStore::new());
        let service = ScriptedService::new(vec![Ok(Some("They met online.".into()))]);
        let mut chat = resolver_with(service.clone(), store);

        let reply = chat.resolve("  how did they meet  ").await.unwrap();
        assert_eq!(
            reply,
            Reply {
                text: "They met online.".into(),
                source: ReplySource::Remote
            }
        );
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0], ("how did they meet".to_string(), "Once upon a time".to_string()));
    }

    #[tokio::test]
    async fn test_empty_remote_answer_is_not_a_failure() {
        let store = Arc::new(MemoryStore::new());
        let service = ScriptedService::new(vec![Ok(None), Ok(Some(String::new()))]);
        let mut chat = resolver_with(service, store);

        for _ in 0..2 {
            let reply = chat.resolve("hello").await.unwrap();
            assert_eq!(reply.text, NO_ANSWER);
            assert_eq!(reply.source, ReplySource::Remote);
        }
    }

    #[tokio::test]
    async fn test_empty_input_leaves_history_untouched() {
        let store = Arc::new(MemoryStore::new());
        let mut chat = resolver_with(ScriptedService::down(), store.clone());

        assert!(matches!(chat.resolve("   ").await, Err(ChatError::EmptyMessage)));
        assert!(chat.history().is_empty());
        assert_eq!(store.get(KEY_CHAT_HISTORY), None);
    }

    #[tokio::test]
    async fn test_history_is_fifo_capped_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let mut chat = resolver_with(ScriptedService::down(), store.clone());

        for n in 0..30 {
            chat.resolve(&format!("question {}", n)).await.unwrap();
        }

        let history = chat.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        // 60 entries were written; the first 10 (questions 0..5 and replies) are gone
        assert_eq!(history[0].text, "question 5");
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[HISTORY_LIMIT - 1].sender, Sender::Assistant);

        let persisted: Vec<ConversationEntry> =
            serde_json::from_str(&store.get(KEY_CHAT_HISTORY).unwrap()).unwrap();
        assert_eq!(persisted, history);
    }

    #[tokio::test]
    async fn test_replay_returns_last_ten_without_appending() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut chat = resolver_with(ScriptedService::down(), store.clone());
            for n in 0..8 {
                chat.resolve(&format!("q{}", n)).await.unwrap();
            }
        }

        let chat = resolver_with(ScriptedService::down(), store);
        assert_eq!(chat.history().len(), 16);
        let replay = chat.replay();
        assert_eq!(replay.len(), REPLAY_LIMIT);
        assert_eq!(replay[0].text, "q3");
        assert_eq!(chat.history().len(), 16);
    }

    #[test]
    fn test_history_uses_site_storage_format() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                KEY_CHAT_HISTORY,
                r#"[{"text":"hi","sender":"user","timestamp":1},{"text":"Hi there!","sender":"ai","timestamp":2}]"#,
            )
            .unwrap();
        let chat = resolver_with(ScriptedService::down(), store);
        assert_eq!(chat.history()[1].sender, Sender::Assistant);

        let json = serde_json::to_string(&chat.history()[1]).unwrap();
        assert!(json.contains(r#""sender":"ai""#));
    }

    /// Reads fine, refuses every write.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let service = ScriptedService::down();
        let mut chat = ChatResolver::new(
            service.clone(),
            KeywordDictionary::builtin(),
            "Once upon a time",
            Arc::new(ReadOnlyStore),
        );

        let err = chat.resolve("tell me about the dream").await.unwrap_err();
        assert!(matches!(err, ChatError::Storage(StorageError::Io(_))));
        // The user entry could not be saved, so the service is never asked
        assert!(service.seen.lock().unwrap().is_empty());
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[test]
    fn test_corrupt_history_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_CHAT_HISTORY, "{oops").unwrap();
        let chat = resolver_with(ScriptedService::down(), store);
        assert!(chat.history().is_empty());
    }
}
