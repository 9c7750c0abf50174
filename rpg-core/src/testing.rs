//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `ScriptedConversation`, a `Conversation` fed from a queue of inputs that
//!   records everything sent to it
//! - `TestHarness` for running commands against an in-memory game
//! - Assertion helpers for verifying chat output

use crate::chat::{ChatError, Conversation, Form, MessageId, Reply};
use crate::character_builder::CharacterBuilder;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::persist::{CharacterStore, MemoryStore};
use crate::service::GameService;
use crate::world::{Character, Race, Sex, UserId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// A description long enough to pass validation.
pub const SAMPLE_DESCRIPTION: &str =
    "A broad-shouldered hunter from the Pale who trusts her bow more than people.";

/// A fully built level 1 Nord owned by `owner`.
pub fn sample_character(owner: &str) -> Character {
    let built = CharacterBuilder::new()
        .owner(UserId::new(owner))
        .name("Test Hero")
        .race(Race::Nord)
        .sex(Sex::Female)
        .description(SAMPLE_DESCRIPTION)
        .build();
    match built {
        Ok(character) => character,
        Err(err) => panic!("sample character is invalid: {err}"),
    }
}

// ============================================================================
// Scripted conversation
// ============================================================================

/// Something the user does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedInput {
    Text(String),
    /// Pick the option at this index.
    Choice(usize),
}

/// Something that happened in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Sent { id: MessageId, text: String },
    FormPosted { id: MessageId, form: Form },
    FormEdited { id: MessageId, form: Form },
    Deleted(MessageId),
    Received { id: MessageId, text: String },
    ChoicesOffered { id: MessageId, options: Vec<String> },
    ChoicePicked { id: MessageId, index: usize },
    ChoicesCleared(MessageId),
}

/// A conversation driven by queued inputs.
///
/// Inputs are consumed in order. A text input that arrives while a choice is
/// pending picks the option with that label; anything else is skipped, the
/// way a chat ignores stray messages.
pub struct ScriptedConversation {
    user: String,
    next_id: AtomicU64,
    inputs: mpsc::UnboundedSender<ScriptedInput>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<ScriptedInput>>,
    events: Mutex<Vec<ChatEvent>>,
    changed: watch::Sender<usize>,
    fail_deletes: AtomicBool,
    avatar: Mutex<Option<String>>,
}

impl ScriptedConversation {
    pub fn new(user: impl Into<String>) -> Arc<Self> {
        let (inputs, inbox) = mpsc::unbounded_channel();
        let (changed, _) = watch::channel(0);
        Arc::new(Self {
            user: user.into(),
            next_id: AtomicU64::new(1),
            inputs,
            inbox: tokio::sync::Mutex::new(inbox),
            events: Mutex::new(Vec::new()),
            changed,
            fail_deletes: AtomicBool::new(false),
            avatar: Mutex::new(None),
        })
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inputs.send(ScriptedInput::Text(text.into()));
    }

    pub fn push_choice(&self, index: usize) {
        let _ = self.inputs.send(ScriptedInput::Choice(index));
    }

    pub fn set_avatar(&self, url: impl Into<String>) {
        *self.avatar.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(url.into());
    }

    /// Make every `delete` fail, as if the bot lacked permission.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.lock_events().clone()
    }

    /// Plain texts sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.lock_events()
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Sent { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent().pop()
    }

    /// Forms posted so far, in their original state.
    pub fn posted_forms(&self) -> Vec<Form> {
        self.lock_events()
            .iter()
            .filter_map(|e| match e {
                ChatEvent::FormPosted { form, .. } => Some(form.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current state of form `id`, with edits applied.
    pub fn form(&self, id: MessageId) -> Option<Form> {
        self.lock_events()
            .iter()
            .filter_map(|e| match e {
                ChatEvent::FormPosted { id: fid, form } | ChatEvent::FormEdited { id: fid, form }
                    if *fid == id =>
                {
                    Some(form.clone())
                }
                _ => None,
            })
            .last()
    }

    /// Current state of the most recently posted form.
    pub fn last_form(&self) -> Option<Form> {
        let id = self.lock_events().iter().rev().find_map(|e| match e {
            ChatEvent::FormPosted { id, .. } => Some(*id),
            _ => None,
        })?;
        self.form(id)
    }

    pub fn was_deleted(&self, id: MessageId) -> bool {
        self.lock_events()
            .iter()
            .any(|e| matches!(e, ChatEvent::Deleted(d) if *d == id))
    }

    /// Wait until `pred` holds for the event log.
    ///
    /// Panics after an hour of (possibly paused) tokio time.
    pub async fn wait_for(&self, pred: impl Fn(&[ChatEvent]) -> bool) {
        let mut changed = self.changed.subscribe();
        let wait = async {
            loop {
                if pred(&self.events()) {
                    return;
                }
                if changed.changed().await.is_err() {
                    return;
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(3600), wait).await.is_err() {
            panic!("condition not reached; events: {:#?}", self.events());
        }
    }

    /// Wait until the latest form's title is `title`.
    pub async fn wait_for_form_title(&self, title: &str) {
        self.wait_for(|_| {
            self.last_form()
                .map(|form| form.title == title)
                .unwrap_or(false)
        })
        .await
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<ChatEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: ChatEvent) {
        let len = {
            let mut events = self.lock_events();
            events.push(event);
            events.len()
        };
        self.changed.send_replace(len);
    }

    fn new_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Conversation for ScriptedConversation {
    fn user(&self) -> &str {
        &self.user
    }

    fn avatar(&self) -> Option<String> {
        self.avatar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn send(&self, text: &str) -> Result<MessageId, ChatError> {
        let id = self.new_id();
        self.record(ChatEvent::Sent {
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn post_form(&self, form: &Form) -> Result<MessageId, ChatError> {
        let id = self.new_id();
        self.record(ChatEvent::FormPosted {
            id,
            form: form.clone(),
        });
        Ok(id)
    }

    async fn edit_form(&self, id: MessageId, form: &Form) -> Result<(), ChatError> {
        self.record(ChatEvent::FormEdited {
            id,
            form: form.clone(),
        });
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), ChatError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ChatError::Forbidden("manage messages".to_string()));
        }
        self.record(ChatEvent::Deleted(id));
        Ok(())
    }

    async fn next_message(&self, timeout: Duration) -> Result<Option<Reply>, ChatError> {
        let mut inbox = self.inbox.lock().await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, inbox.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(ChatError::Closed),
                Ok(Some(ScriptedInput::Text(text))) => {
                    let id = self.new_id();
                    self.record(ChatEvent::Received {
                        id,
                        text: text.clone(),
                    });
                    return Ok(Some(Reply { id, content: text }));
                }
                Ok(Some(ScriptedInput::Choice(_))) => continue,
            }
        }
    }

    async fn choose(
        &self,
        id: MessageId,
        options: &[String],
        timeout: Duration,
    ) -> Result<Option<usize>, ChatError> {
        self.record(ChatEvent::ChoicesOffered {
            id,
            options: options.to_vec(),
        });
        let mut inbox = self.inbox.lock().await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let index = match tokio::time::timeout_at(deadline, inbox.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(ChatError::Closed),
                Ok(Some(ScriptedInput::Choice(index))) if index < options.len() => index,
                Ok(Some(ScriptedInput::Choice(_))) => continue,
                Ok(Some(ScriptedInput::Text(text))) => {
                    match options.iter().position(|o| *o == text) {
                        Some(index) => index,
                        None => continue,
                    }
                }
            };
            self.record(ChatEvent::ChoicePicked { id, index });
            return Ok(Some(index));
        }
    }

    async fn clear_choices(&self, id: MessageId) -> Result<(), ChatError> {
        self.record(ChatEvent::ChoicesCleared(id));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Test harness for running commands against an in-memory game.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub service: GameService,
}

impl TestHarness {
    /// Default config with the starter items.
    pub async fn new() -> Self {
        Self::with_config(GameConfig::default()).await
    }

    pub async fn with_config(config: GameConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = match GameService::new(config, store.clone(), store.clone()).await {
            Ok(service) => service,
            Err(err) => panic!("failed to start game service: {err}"),
        };
        Self { store, service }
    }

    pub fn conversation(&self, user: &str) -> Arc<ScriptedConversation> {
        ScriptedConversation::new(user)
    }

    /// Run one command line as the conversation's user.
    pub async fn run(
        &self,
        conversation: &Arc<ScriptedConversation>,
        line: &str,
    ) -> Result<(), GameError> {
        self.service.handle_line(conversation.clone(), line).await
    }

    pub async fn character(&self, user: &str) -> Option<Character> {
        self.store
            .get_character(&UserId::new(user))
            .await
            .unwrap_or_else(|err| panic!("store failed: {err}"))
    }

    /// Register a Nord named `name` through the full wizard.
    pub async fn register(&self, user: &str, name: &str) -> Character {
        let conversation = self.conversation(user);
        conversation.push_text(name);
        conversation.push_text("nord");
        conversation.push_choice(0);
        conversation.push_text(SAMPLE_DESCRIPTION);
        if let Err(err) = self.run(&conversation, "char new").await {
            panic!("char new failed: {err}");
        }
        conversation.wait_for_form_title("Character created!").await;
        self.service.sessions().wait_closed(&UserId::new(user)).await;
        match self.character(user).await {
            Some(character) => character,
            None => panic!("character {name} was not stored"),
        }
    }

    /// Put `count` plain units of the named catalog item into `user`'s
    /// inventory.
    pub async fn give(&self, user: &str, item: &str, count: u32) {
        let admin = self.conversation(user);
        let line = format!("item add {user} {count} \"{item}\"");
        if let Err(err) = self.run(&admin, &line).await {
            panic!("{line} failed: {err}");
        }
    }
}

/// Assert that the last plain message sent contains `needle`.
#[track_caller]
pub fn assert_last_sent_contains(conversation: &ScriptedConversation, needle: &str) {
    let last = conversation.last_sent();
    assert!(
        last.as_deref().map(|t| t.contains(needle)).unwrap_or(false),
        "expected last message to contain {needle:?}, got {last:?}"
    );
}

/// Assert that nothing at all was sent.
#[track_caller]
pub fn assert_silent(conversation: &ScriptedConversation) {
    let events = conversation.events();
    assert!(events.is_empty(), "expected no output, got {events:#?}");
}
