//! Character and item persistence.
//!
//! Characters are keyed by owner and carry a version number: a save is only
//! accepted if the stored version is the one the character was loaded with.
//! Concurrent writers (commands, the regeneration loop) go through
//! [`update_character`], which reloads and retries on conflict.

use crate::error::GameError;
use crate::items::{Item, ItemId};
use crate::world::{Character, UserId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
}

// ============================================================================
// Ports
// ============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn get_character(&self, owner: &UserId) -> Result<Option<Character>, StoreError>;

    /// Insert a new character. Fails with `AlreadyExists` if the owner has one.
    async fn insert_character(&self, character: &Character) -> Result<(), StoreError>;

    /// Save over the stored character if its version still matches, then
    /// bump `character.version`.
    async fn save_character(&self, character: &mut Character) -> Result<(), StoreError>;

    /// Returns whether anything was deleted.
    async fn delete_character(&self, owner: &UserId) -> Result<bool, StoreError>;

    async fn list_owners(&self) -> Result<Vec<UserId>, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load_items(&self) -> Result<Vec<Item>, StoreError>;

    /// Insert a new item. Items are never updated.
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError>;
}

/// Load, modify and save a character, retrying on version conflicts.
///
/// `apply` may run several times and must not have side effects outside the
/// character. If it fails nothing is saved.
pub async fn update_character<S, T, F>(
    store: &S,
    owner: &UserId,
    max_retries: u32,
    mut apply: F,
) -> Result<T, GameError>
where
    S: CharacterStore + ?Sized,
    F: FnMut(&mut Character) -> Result<T, GameError> + Send,
    T: Send,
{
    let mut attempt = 0;
    loop {
        let mut character = store
            .get_character(owner)
            .await?
            .ok_or(GameError::CharacterNotFound)?;
        let value = apply(&mut character)?;
        match store.save_character(&mut character).await {
            Ok(()) => return Ok(value),
            Err(StoreError::VersionConflict { expected, found }) if attempt < max_retries => {
                attempt += 1;
                warn!(%owner, expected, found, attempt, "version conflict, retrying");
            }
            Err(StoreError::NotFound(_)) => return Err(GameError::CharacterNotFound),
            Err(err) => return Err(err.into()),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store that keeps everything in memory. Used by tests and when no data
/// directory is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    characters: RwLock<HashMap<UserId, Character>>,
    items: RwLock<BTreeMap<ItemId, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn get_character(&self, owner: &UserId) -> Result<Option<Character>, StoreError> {
        Ok(self.characters.read().await.get(owner).cloned())
    }

    async fn insert_character(&self, character: &Character) -> Result<(), StoreError> {
        let mut characters = self.characters.write().await;
        if characters.contains_key(&character.owner) {
            return Err(StoreError::AlreadyExists(character.owner.to_string()));
        }
        characters.insert(character.owner.clone(), character.clone());
        Ok(())
    }

    async fn save_character(&self, character: &mut Character) -> Result<(), StoreError> {
        let mut characters = self.characters.write().await;
        let stored = characters
            .get_mut(&character.owner)
            .ok_or_else(|| StoreError::NotFound(character.owner.to_string()))?;
        if stored.version != character.version {
            return Err(StoreError::VersionConflict {
                expected: character.version,
                found: stored.version,
            });
        }
        character.version += 1;
        *stored = character.clone();
        Ok(())
    }

    async fn delete_character(&self, owner: &UserId) -> Result<bool, StoreError> {
        Ok(self.characters.write().await.remove(owner).is_some())
    }

    async fn list_owners(&self) -> Result<Vec<UserId>, StoreError> {
        let mut owners: Vec<UserId> = self.characters.read().await.keys().cloned().collect();
        owners.sort();
        Ok(owners)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn load_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(format!("item {}", item.id)));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }
}

// ============================================================================
// JSON document store
// ============================================================================

/// Store with one pretty-printed JSON document per character and per item:
///
/// ```text
/// <root>/characters/<owner>.json
/// <root>/items/<id>.json
/// ```
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    /// Serializes check-then-write sequences within this process.
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("characters")).await?;
        fs::create_dir_all(root.join("items")).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn character_path(&self, owner: &UserId) -> PathBuf {
        self.root
            .join("characters")
            .join(format!("{}.json", file_stem(owner.as_str())))
    }

    fn item_path(&self, id: ItemId) -> PathBuf {
        self.root.join("items").join(format!("{id}.json"))
    }

    async fn read_character(&self, path: &Path) -> Result<Option<Character>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Write through a temporary file so readers never see half a document.
async fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// File-system-safe, collision-free file name for an owner id.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}

#[async_trait]
impl CharacterStore for JsonStore {
    async fn get_character(&self, owner: &UserId) -> Result<Option<Character>, StoreError> {
        self.read_character(&self.character_path(owner)).await
    }

    async fn insert_character(&self, character: &Character) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.character_path(&character.owner);
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(character.owner.to_string()));
        }
        write_document(&path, character).await
    }

    async fn save_character(&self, character: &mut Character) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.character_path(&character.owner);
        let stored = self
            .read_character(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(character.owner.to_string()))?;
        if stored.version != character.version {
            return Err(StoreError::VersionConflict {
                expected: character.version,
                found: stored.version,
            });
        }
        character.version += 1;
        if let Err(err) = write_document(&path, character).await {
            character.version -= 1;
            return Err(err);
        }
        Ok(())
    }

    async fn delete_character(&self, owner: &UserId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.character_path(owner)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Unreadable documents are logged and skipped.
    async fn list_owners(&self) -> Result<Vec<UserId>, StoreError> {
        // Parse just enough to get the owner
        #[derive(Deserialize)]
        struct Partial {
            owner: UserId,
        }

        let mut owners = Vec::new();
        let mut entries = fs::read_dir(self.root.join("characters")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }
            let parsed = match fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<Partial>(&content).map_err(StoreError::from),
                Err(err) => Err(err.into()),
            };
            match parsed {
                Ok(partial) => owners.push(partial.owner),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable character"),
            }
        }
        owners.sort();
        Ok(owners)
    }
}

#[async_trait]
impl ItemStore for JsonStore {
    async fn load_items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut entries = fs::read_dir(self.root.join("items")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path).await?;
                items.push(serde_json::from_str::<Item>(&content)?);
            }
        }
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.item_path(item.id);
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(format!("item {}", item.id)));
        }
        write_document(&path, item).await
    }
}
