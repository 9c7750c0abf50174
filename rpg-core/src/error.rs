//! Error types shared by the engine, the wizard and the command layer.

use crate::chat::ChatError;
use crate::persist::StoreError;
use thiserror::Error;

/// Errors surfaced to the command layer.
///
/// Wizard validation failures never show up here; they are handled inside
/// the registration dialogue by re-prompting.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("character not found")]
    CharacterNotFound,

    #[error("item not found")]
    ItemNotFound,

    #[error("item not found in inventory")]
    ItemNotFoundInInventory,

    #[error("item cannot be equipped")]
    ItemIsNotEquippable,

    #[error("unknown attribute: {0}")]
    AttributeNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no answer before the timeout")]
    Timeout,

    #[error("character already exists")]
    CharacterAlreadyExists,

    #[error("an item named {0:?} already exists")]
    DuplicateItemName(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),
}

impl From<ParseEnumError> for GameError {
    fn from(err: ParseEnumError) -> Self {
        GameError::InvalidInput(err.to_string())
    }
}

/// A string did not name any variant of a keyed enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
