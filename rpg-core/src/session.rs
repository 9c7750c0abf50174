//! Registration sessions.
//!
//! A [`RegisterSession`] drives one [`RegistrationWizard`] over a
//! [`Conversation`]: a single form message edited in place, one prompt
//! outstanding at a time, user replies deleted once read. The
//! [`SessionRegistry`] makes sure each user has at most one open session.

use crate::character_builder::CharacterBuilder;
use crate::chat::{ChatError, Conversation, Form, MessageId};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::persist::{CharacterStore, StoreError};
use crate::registration::{
    CancelReason, CharacterIntent, RegistrationStep, RegistrationWizard, Transition, WizardInput,
};
use crate::world::{Character, Sex, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Form title while registration runs.
pub const TITLE_IN_PROGRESS: &str = "Character creation";
/// Form title once the character is stored.
pub const TITLE_CREATED: &str = "Character created!";

const FORM_COLOR: u32 = 0xF5A623;

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug)]
struct SessionHandle {
    id: Uuid,
    cancel: Arc<Notify>,
}

/// Process-wide set of open registration sessions, one per user.
///
/// Entries are only added by [`try_register`](Self::try_register) and only
/// removed when the returned guard is dropped, so a session that ends in any
/// way (including its task being aborted) frees its slot.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    open: Arc<Mutex<HashMap<UserId, SessionHandle>>>,
    closed: Arc<Notify>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, SessionHandle>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the session slot for `owner`. `None` if one is already open.
    pub fn try_register(&self, owner: &UserId) -> Option<SessionGuard> {
        let mut open = self.lock();
        if open.contains_key(owner) {
            return None;
        }
        let id = Uuid::new_v4();
        let cancel = Arc::new(Notify::new());
        open.insert(
            owner.clone(),
            SessionHandle {
                id,
                cancel: cancel.clone(),
            },
        );
        debug!(%owner, %id, "registration session opened");
        Some(SessionGuard {
            registry: self.clone(),
            owner: owner.clone(),
            id,
            cancel,
        })
    }

    /// Ask the open session of `owner` to cancel. Returns whether one was
    /// open.
    pub fn cancel(&self, owner: &UserId) -> bool {
        match self.lock().get(owner) {
            Some(handle) => {
                handle.cancel.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, owner: &UserId) -> bool {
        self.lock().contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait until `owner` has no open session.
    pub async fn wait_closed(&self, owner: &UserId) {
        loop {
            let notified = self.closed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_open(owner) {
                return;
            }
            notified.await;
        }
    }
}

/// Holds a user's session slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    owner: UserId,
    id: Uuid,
    cancel: Arc<Notify>,
}

impl SessionGuard {
    pub fn owner(&self) -> &UserId {
        &self.owner
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        {
            let mut open = self.registry.lock();
            if open.get(&self.owner).map(|h| h.id) == Some(self.id) {
                open.remove(&self.owner);
            }
        }
        debug!(owner = %self.owner, id = %self.id, "registration session closed");
        self.registry.closed.notify_waiters();
    }
}

// ============================================================================
// Session
// ============================================================================

/// How a registration session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Created(Box<Character>),
    Cancelled(CancelReason),
    /// The user got a character some other way while the wizard ran.
    AlreadyExists,
}

/// One run of the registration dialogue.
pub struct RegisterSession {
    config: Arc<GameConfig>,
    characters: Arc<dyn CharacterStore>,
    conversation: Arc<dyn Conversation>,
    guard: SessionGuard,
    wizard: RegistrationWizard,
    form: Form,
    form_id: Option<MessageId>,
    /// The latest "invalid input" notice, deleted before the next one.
    notice: Option<MessageId>,
}

impl RegisterSession {
    pub fn new(
        config: Arc<GameConfig>,
        characters: Arc<dyn CharacterStore>,
        conversation: Arc<dyn Conversation>,
        guard: SessionGuard,
    ) -> Self {
        let form = Form::new(TITLE_IN_PROGRESS)
            .with_footer(TITLE_IN_PROGRESS)
            .with_color(FORM_COLOR);
        Self {
            wizard: RegistrationWizard::new(guard.owner().clone()),
            config,
            characters,
            conversation,
            guard,
            form,
            form_id: None,
            notice: None,
        }
    }

    pub fn owner(&self) -> &UserId {
        self.guard.owner()
    }

    /// Run the dialogue to the end.
    ///
    /// Whatever happens, the form is left in a final, non-interactive state
    /// and the session slot is released when this returns.
    pub async fn run(mut self) -> Result<SessionOutcome, GameError> {
        match self.dialogue().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(owner = %self.owner(), error = %err, "registration session failed");
                self.form.fields.clear();
                self.form.description = "Character creation failed. Please try again later.".to_string();
                self.close_form().await;
                Err(err)
            }
        }
    }

    async fn dialogue(&mut self) -> Result<SessionOutcome, GameError> {
        let first = RegistrationStep::Name;
        self.form.description = first.prompt(&self.config);
        let form_id = self.conversation.post_form(&self.form).await?;
        self.form_id = Some(form_id);
        let mut prompted = first;

        while let Some(step) = self.wizard.step() {
            if step != prompted {
                self.form.description = step.prompt(&self.config);
                self.conversation.edit_form(form_id, &self.form).await?;
                prompted = step;
            }

            let input = self.ask(form_id, step).await?;
            match self.wizard.apply(&self.config, input) {
                Transition::Accepted { field, value, .. } => {
                    self.clear_notice().await;
                    if step == RegistrationStep::Description {
                        self.form.description = format!("*{value}*");
                    } else {
                        self.form.push_field(field, value);
                    }
                    self.conversation.edit_form(form_id, &self.form).await?;
                }
                Transition::Rejected(invalid) => {
                    self.clear_notice().await;
                    let text = format!("{}, invalid input! {invalid}", mention(self.owner()));
                    self.notice = Some(self.conversation.send(&text).await?);
                }
                Transition::Cancelled(reason) => {
                    self.clear_notice().await;
                    self.form.fields.clear();
                    self.form.description = match reason {
                        CancelReason::Timeout => "Time is up. Character creation cancelled.",
                        _ => "Character creation cancelled.",
                    }
                    .to_string();
                    self.close_form().await;
                    return Ok(SessionOutcome::Cancelled(reason));
                }
            }
        }

        let intent = self
            .wizard
            .clone()
            .finish()
            .ok_or_else(|| GameError::InvalidInput("registration is incomplete".to_string()))?;
        self.complete(intent).await
    }

    /// Wait for the answer to `step`, or for a forced cancel.
    async fn ask(&self, form_id: MessageId, step: RegistrationStep) -> Result<WizardInput, GameError> {
        let timeout = step.timeout(&self.config);
        let cancel = self.guard.cancel.clone();

        if step.is_choice() {
            let options = self.config.registration.sex_choices.to_vec();
            let picked = tokio::select! {
                _ = cancel.notified() => return Ok(WizardInput::Cancel),
                picked = self.conversation.choose(form_id, &options, timeout) => picked?,
            };
            self.best_effort("clear choices", self.conversation.clear_choices(form_id).await);
            return Ok(match picked {
                Some(index) => match Sex::all().get(index) {
                    Some(sex) => WizardInput::Choice(*sex),
                    None => WizardInput::Text(String::new()),
                },
                None => WizardInput::Timeout,
            });
        }

        let reply = tokio::select! {
            _ = cancel.notified() => return Ok(WizardInput::Cancel),
            reply = self.conversation.next_message(timeout) => reply?,
        };
        Ok(match reply {
            Some(reply) => {
                self.best_effort("delete reply", self.conversation.delete(reply.id).await);
                WizardInput::Text(reply.content)
            }
            None => WizardInput::Timeout,
        })
    }

    async fn complete(&mut self, intent: CharacterIntent) -> Result<SessionOutcome, GameError> {
        let form_id = self.form_id;
        let mut builder = CharacterBuilder::new();
        if let Some(url) = self.conversation.avatar() {
            builder = builder.avatar(url);
        }
        let character = builder
            .owner(intent.owner.clone())
            .name(intent.name)
            .race(intent.race)
            .sex(intent.sex)
            .description(intent.description)
            .template(self.config.race_template(intent.race))
            .build()
            .map_err(|err| GameError::InvalidInput(err.to_string()))?;

        let exists = self.characters.get_character(&intent.owner).await?.is_some();
        let inserted = if exists {
            Err(GameError::CharacterAlreadyExists)
        } else {
            self.characters
                .insert_character(&character)
                .await
                .map_err(|err| match err {
                    StoreError::AlreadyExists(_) => GameError::CharacterAlreadyExists,
                    err => err.into(),
                })
        };

        match inserted {
            Ok(()) => {
                info!(owner = %intent.owner, name = %character.name, race = %character.race, "character created");
                self.form.title = TITLE_CREATED.to_string();
                if let Some(id) = form_id {
                    self.conversation.edit_form(id, &self.form).await?;
                }
                Ok(SessionOutcome::Created(Box::new(character)))
            }
            Err(GameError::CharacterAlreadyExists) => {
                self.form.description = "You already have a character.".to_string();
                self.close_form().await;
                Ok(SessionOutcome::AlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn clear_notice(&mut self) {
        if let Some(id) = self.notice.take() {
            let result = self.conversation.delete(id).await;
            self.best_effort("delete notice", result);
        }
    }

    /// Leave the form in its final state with nothing left to click.
    async fn close_form(&mut self) {
        let Some(id) = self.form_id else {
            return;
        };
        let result = self.conversation.edit_form(id, &self.form).await;
        self.best_effort("edit form", result);
        let result = self.conversation.clear_choices(id).await;
        self.best_effort("clear choices", result);
    }

    fn best_effort(&self, action: &str, result: Result<(), ChatError>) {
        if let Err(err) = result {
            warn!(owner = %self.owner(), action, error = %err, "chat operation failed");
        }
    }
}

/// How messages address a user.
pub fn mention(user: &UserId) -> String {
    format!("@{user}")
}
