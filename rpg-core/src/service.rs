//! Command dispatch.
//!
//! [`GameService`] owns the item catalog and the session registry and runs
//! one parsed [`Command`] per chat line. Problems the user can fix (unknown
//! item, missing character, bad arguments) are answered in chat; storage and
//! transport failures are returned to the caller.

use crate::chat::Conversation;
use crate::commands::{Command, USAGE};
use crate::config::GameConfig;
use crate::display::{character_sheet, inventory_pages, item_card, item_ref_name};
use crate::equipment::{equip_item, unequip_item};
use crate::error::GameError;
use crate::items::{Item, ItemCatalog, ItemDraft, STARTER_ITEMS};
use crate::persist::{update_character, CharacterStore, ItemStore};
use crate::session::{mention, RegisterSession, SessionOutcome, SessionRegistry};
use crate::world::{EquipmentSlot, Inventory, ItemRef, UserId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The game, as seen from the chat.
#[derive(Clone)]
pub struct GameService {
    config: Arc<GameConfig>,
    characters: Arc<dyn CharacterStore>,
    items: Arc<dyn ItemStore>,
    catalog: Arc<RwLock<ItemCatalog>>,
    sessions: SessionRegistry,
}

impl GameService {
    /// Load the item catalog and, if it is empty, seed the starter items.
    pub async fn new(
        config: GameConfig,
        characters: Arc<dyn CharacterStore>,
        items: Arc<dyn ItemStore>,
    ) -> Result<Self, GameError> {
        let mut catalog = ItemCatalog::from_items(items.load_items().await?)?;
        if catalog.is_empty() && config.seed_items {
            for draft in STARTER_ITEMS.iter() {
                let item = catalog.create(draft.clone())?;
                items.insert_item(&item).await?;
                catalog.insert(item)?;
            }
            info!(count = catalog.len(), "seeded starter items");
        }
        debug!(items = catalog.len(), "item catalog loaded");

        Ok(Self {
            config: Arc::new(config),
            characters,
            items,
            catalog: Arc::new(RwLock::new(catalog)),
            sessions: SessionRegistry::new(),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn characters(&self) -> &Arc<dyn CharacterStore> {
        &self.characters
    }

    /// Parse and run one command line (without the bot prefix) on behalf of
    /// the conversation's user.
    pub async fn handle_line(
        &self,
        conversation: Arc<dyn Conversation>,
        line: &str,
    ) -> Result<(), GameError> {
        let user = UserId::new(conversation.user());
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => {
                let text = format!(
                    "{}, {err}. Type `{}help` for the list of commands.",
                    mention(&user),
                    self.config.bot.prefix
                );
                conversation.send(&text).await?;
                return Ok(());
            }
        };
        debug!(%user, ?command, "command");

        if command.is_admin() && !self.config.is_admin(&user) {
            let text = format!("{}, you are not allowed to do that.", mention(&user));
            conversation.send(&text).await?;
            return Ok(());
        }

        match self.execute(&conversation, &user, command).await {
            Ok(()) => Ok(()),
            Err(err) => match user_message(&err, &self.config.bot.prefix) {
                Some(message) => {
                    conversation
                        .send(&format!("{}, {message}", mention(&user)))
                        .await?;
                    Ok(())
                }
                None => Err(err),
            },
        }
    }

    async fn execute(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        command: Command,
    ) -> Result<(), GameError> {
        match command {
            Command::CharInfo { user: target } => {
                self.char_info(conversation, target.as_ref().unwrap_or(user)).await
            }
            Command::CharNew => self.char_new(conversation, user).await,
            Command::CharCancel => self.char_cancel(conversation, user).await,
            Command::CharDelete => self.char_delete(conversation, user).await,
            Command::Inventory { user: target } => {
                self.inventory(conversation, target.as_ref().unwrap_or(user)).await
            }
            Command::Equip { item } => self.equip(conversation, user, &item).await,
            Command::Unequip { slot } => self.unequip(conversation, user, slot).await,
            Command::ItemInfo { name } => self.item_info(conversation, &name).await,
            Command::ItemNew(draft) => self.item_new(conversation, user, draft).await,
            Command::ItemAdd {
                user: target,
                count,
                item,
                maker,
                temper,
            } => {
                self.item_add(conversation, user, &target, count, &item, maker, temper)
                    .await
            }
            Command::ItemRemove {
                user: target,
                count,
                item,
            } => self.item_remove(conversation, user, &target, count, &item).await,
            Command::Help => self.help(conversation).await,
        }
    }

    // ========================================================================
    // Characters
    // ========================================================================

    async fn char_info(
        &self,
        conversation: &Arc<dyn Conversation>,
        target: &UserId,
    ) -> Result<(), GameError> {
        let character = self
            .characters
            .get_character(target)
            .await?
            .ok_or(GameError::CharacterNotFound)?;
        let catalog = self.catalog.read().await;
        conversation
            .post_form(&character_sheet(&self.config, &character, &catalog))
            .await?;
        Ok(())
    }

    /// Start the registration wizard in the background.
    ///
    /// Silent if the user already has a wizard open.
    async fn char_new(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
    ) -> Result<(), GameError> {
        if self.characters.get_character(user).await?.is_some() {
            return Err(GameError::CharacterAlreadyExists);
        }
        let Some(guard) = self.sessions.try_register(user) else {
            debug!(%user, "registration already in progress");
            return Ok(());
        };

        let session = RegisterSession::new(
            self.config.clone(),
            self.characters.clone(),
            conversation.clone(),
            guard,
        );
        let owner = user.clone();
        tokio::spawn(async move {
            match session.run().await {
                Ok(SessionOutcome::Created(_)) => {}
                Ok(outcome) => debug!(%owner, ?outcome, "registration ended"),
                Err(err) => warn!(%owner, error = %err, "registration failed"),
            }
        });
        Ok(())
    }

    async fn char_cancel(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
    ) -> Result<(), GameError> {
        if !self.sessions.cancel(user) {
            let text = format!("{}, you are not creating a character.", mention(user));
            conversation.send(&text).await?;
        }
        Ok(())
    }

    async fn char_delete(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
    ) -> Result<(), GameError> {
        let Some(character) = self.characters.get_character(user).await? else {
            let text = format!(
                "{}, you don't have a character. Type `{}char new` to create one.",
                mention(user),
                self.config.bot.prefix
            );
            conversation.send(&text).await?;
            return Ok(());
        };

        let prompt = format!(
            "{}, are you sure you want to delete {}? This cannot be undone. Type `yes` to confirm.",
            mention(user),
            character.name
        );
        conversation.send(&prompt).await?;

        let confirmed = match self.await_confirmation(conversation).await {
            Ok(confirmed) => confirmed,
            Err(GameError::Timeout) => false,
            Err(err) => return Err(err),
        };
        if !confirmed {
            let text = format!("{}, character deletion cancelled.", mention(user));
            conversation.send(&text).await?;
            return Ok(());
        }

        if self.characters.delete_character(user).await? {
            info!(owner = %user, name = %character.name, "character deleted");
        }
        let text = format!("{}, {} has been deleted.", mention(user), character.name);
        conversation.send(&text).await?;
        Ok(())
    }

    /// Wait for a yes/no reply. Anything but a confirmation word is a no.
    async fn await_confirmation(
        &self,
        conversation: &Arc<dyn Conversation>,
    ) -> Result<bool, GameError> {
        let reply = conversation
            .next_message(self.config.registration.delete_timeout())
            .await?
            .ok_or(GameError::Timeout)?;
        Ok(self.config.registration.is_confirmation(&reply.content))
    }

    // ========================================================================
    // Inventory and equipment
    // ========================================================================

    async fn inventory(
        &self,
        conversation: &Arc<dyn Conversation>,
        target: &UserId,
    ) -> Result<(), GameError> {
        let character = self
            .characters
            .get_character(target)
            .await?
            .ok_or(GameError::CharacterNotFound)?;
        let pages = {
            let catalog = self.catalog.read().await;
            inventory_pages(&self.config, &character, &catalog)
        };
        for page in &pages {
            conversation.post_form(page).await?;
        }
        Ok(())
    }

    async fn equip(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        name: &str,
    ) -> Result<(), GameError> {
        let catalog = self.catalog.read().await;
        let catalog: &ItemCatalog = &catalog;
        let item = catalog.find_by_name(name).ok_or(GameError::ItemNotFound)?;

        let equipped = update_character(
            self.characters.as_ref(),
            user,
            self.config.max_update_retries,
            |character| {
                let item_ref = pick_stack(&character.inventory, item)
                    .ok_or(GameError::ItemNotFoundInInventory)?;
                equip_item(character, catalog, &item_ref)?;
                Ok(item_ref)
            },
        )
        .await?;

        let text = format!(
            "{}, {} equipped.",
            mention(user),
            item_ref_name(catalog, &equipped)
        );
        conversation.send(&text).await?;
        Ok(())
    }

    async fn unequip(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        slot: EquipmentSlot,
    ) -> Result<(), GameError> {
        let catalog = self.catalog.read().await;
        let catalog: &ItemCatalog = &catalog;
        let removed = update_character(
            self.characters.as_ref(),
            user,
            self.config.max_update_retries,
            |character| unequip_item(character, catalog, slot),
        )
        .await?;

        let text = match removed {
            Some(item_ref) => format!(
                "{}, {} unequipped.",
                mention(user),
                item_ref_name(catalog, &item_ref)
            ),
            None => format!(
                "{}, nothing is equipped in {}.",
                mention(user),
                slot.label().to_lowercase()
            ),
        };
        conversation.send(&text).await?;
        Ok(())
    }

    // ========================================================================
    // Items
    // ========================================================================

    async fn item_info(
        &self,
        conversation: &Arc<dyn Conversation>,
        name: &str,
    ) -> Result<(), GameError> {
        let card = {
            let catalog = self.catalog.read().await;
            let item = catalog.find_by_name(name).ok_or(GameError::ItemNotFound)?;
            item_card(&self.config, item)
        };
        conversation.post_form(&card).await?;
        Ok(())
    }

    async fn item_new(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        draft: ItemDraft,
    ) -> Result<(), GameError> {
        let item = {
            // Held across the store write so two creations cannot share an id.
            let mut catalog = self.catalog.write().await;
            let item = catalog.create(draft)?;
            self.items.insert_item(&item).await?;
            catalog.insert(item.clone())?;
            item
        };
        info!(creator = %user, id = %item.id, name = %item.name, "item created");

        let text = format!(
            "{}, {} created with id {}.",
            mention(user),
            item.name,
            item.id
        );
        conversation.send(&text).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn item_add(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        target: &UserId,
        count: u32,
        name: &str,
        maker: Option<String>,
        temper: Option<u32>,
    ) -> Result<(), GameError> {
        if count == 0 {
            return Err(GameError::InvalidInput("count must be positive".to_string()));
        }
        let item = self.find_item(name).await?;

        update_character(
            self.characters.as_ref(),
            target,
            self.config.max_update_retries,
            |character| {
                character
                    .inventory
                    .add_item(&item, count, maker.clone(), temper)
            },
        )
        .await?;

        let text = format!(
            "{}, gave {count} x {} to {}.",
            mention(user),
            item.name,
            mention(target)
        );
        conversation.send(&text).await?;
        Ok(())
    }

    async fn item_remove(
        &self,
        conversation: &Arc<dyn Conversation>,
        user: &UserId,
        target: &UserId,
        count: u32,
        name: &str,
    ) -> Result<(), GameError> {
        if count == 0 {
            return Err(GameError::InvalidInput("count must be positive".to_string()));
        }
        let item = self.find_item(name).await?;

        update_character(
            self.characters.as_ref(),
            target,
            self.config.max_update_retries,
            |character| character.inventory.remove_item(&item, count),
        )
        .await?;

        let text = format!(
            "{}, took {count} x {} from {}.",
            mention(user),
            item.name,
            mention(target)
        );
        conversation.send(&text).await?;
        Ok(())
    }

    async fn find_item(&self, name: &str) -> Result<Item, GameError> {
        self.catalog
            .read()
            .await
            .find_by_name(name)
            .cloned()
            .ok_or(GameError::ItemNotFound)
    }

    async fn help(&self, conversation: &Arc<dyn Conversation>) -> Result<(), GameError> {
        let prefix = &self.config.bot.prefix;
        let text = USAGE
            .iter()
            .map(|line| format!("`{prefix}{line}`"))
            .collect::<Vec<_>>()
            .join("\n");
        conversation.send(&text).await?;
        Ok(())
    }
}

/// The stack `equip <name>` uses: the plain variant if there is one,
/// otherwise the first stack of that item.
fn pick_stack(inventory: &Inventory, item: &Item) -> Option<ItemRef> {
    if let Ok(stack) = inventory.get_item(item, None, None) {
        return Some(stack.item.clone());
    }
    inventory
        .stacks(item.category())
        .iter()
        .find(|stack| stack.item.item_id == item.id)
        .map(|stack| stack.item.clone())
}

/// Text shown to the user for errors they can act on. `None` for
/// infrastructure failures.
fn user_message(err: &GameError, prefix: &str) -> Option<String> {
    let message = match err {
        GameError::CharacterNotFound => "character not found.".to_string(),
        GameError::ItemNotFound => "item not found.".to_string(),
        GameError::ItemNotFoundInInventory => "item not found in the inventory.".to_string(),
        GameError::ItemIsNotEquippable => "this item cannot be equipped.".to_string(),
        GameError::AttributeNotFound(name) => format!("unknown attribute {name}."),
        GameError::InvalidInput(reason) => format!("invalid input: {reason}."),
        GameError::Timeout => "no answer in time.".to_string(),
        GameError::CharacterAlreadyExists => {
            format!("you already have a character. Type `{prefix}char delete` to delete it.")
        }
        GameError::DuplicateItemName(name) => format!("an item named {name} already exists."),
        GameError::Store(_) | GameError::Chat(_) => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatError;
    use crate::persist::{MemoryStore, MockCharacterStore, MockItemStore, StoreError};
    use crate::testing::{assert_last_sent_contains, assert_silent, TestHarness};

    #[tokio::test]
    async fn test_seeds_starter_items_once() {
        let store = Arc::new(MemoryStore::new());
        GameService::new(GameConfig::default(), store.clone(), store.clone())
            .await
            .unwrap();
        GameService::new(GameConfig::default(), store.clone(), store.clone())
            .await
            .unwrap();
        assert_eq!(store.load_items().await.unwrap().len(), STARTER_ITEMS.len());
    }

    #[tokio::test]
    async fn test_no_seed_when_disabled() {
        let config = GameConfig {
            seed_items: false,
            ..GameConfig::default()
        };
        let harness = TestHarness::with_config(config).await;
        let conv = harness.conversation("1");
        harness.run(&conv, "item Sweetroll").await.unwrap();
        assert_last_sent_contains(&conv, "item not found");
    }

    #[tokio::test]
    async fn test_parse_errors_are_answered() {
        let harness = TestHarness::new().await;
        let conv = harness.conversation("1");
        harness.run(&conv, "dance").await.unwrap();
        assert_last_sent_contains(&conv, "unknown command");
        assert_last_sent_contains(&conv, "`!help`");
    }

    #[tokio::test]
    async fn test_admin_commands_are_gated() {
        let config = GameConfig {
            admins: vec![UserId::new("admin")],
            ..GameConfig::default()
        };
        let harness = TestHarness::with_config(config).await;
        harness.register("2", "Lydia").await;

        let player = harness.conversation("2");
        harness.run(&player, "item add 2 1 Sweetroll").await.unwrap();
        assert_last_sent_contains(&player, "not allowed");
        assert!(harness.character("2").await.unwrap().inventory.is_empty());

        let admin = harness.conversation("admin");
        harness.run(&admin, "item add 2 1 Sweetroll").await.unwrap();
        assert_last_sent_contains(&admin, "gave 1 x Sweetroll to @2");
    }

    #[tokio::test]
    async fn test_item_new_then_info() {
        let harness = TestHarness::new().await;
        let conv = harness.conversation("1");
        harness
            .run(
                &conv,
                r#"item new armor "Hide Shield" "Stretched hide on a frame." 15 common shield light leather 8"#,
            )
            .await
            .unwrap();
        assert_last_sent_contains(&conv, "Hide Shield created");

        harness.run(&conv, "item hide shield").await.unwrap();
        let card = conv.last_form().unwrap();
        assert_eq!(card.title, "Hide Shield");
        assert!(card.fields.contains(&("Slot".to_string(), "Shield".to_string())));

        harness
            .run(&conv, r#"item new item "hide SHIELD" "Again." 1 common"#)
            .await
            .unwrap();
        assert_last_sent_contains(&conv, "already exists");
    }

    #[tokio::test]
    async fn test_char_info_missing() {
        let harness = TestHarness::new().await;
        let conv = harness.conversation("1");
        harness.run(&conv, "char").await.unwrap();
        assert_last_sent_contains(&conv, "@1, character not found");
    }

    #[tokio::test]
    async fn test_cancel_without_session() {
        let harness = TestHarness::new().await;
        let conv = harness.conversation("1");
        harness.run(&conv, "char cancel").await.unwrap();
        assert_last_sent_contains(&conv, "not creating a character");
    }

    #[tokio::test]
    async fn test_char_new_with_existing_character() {
        let harness = TestHarness::new().await;
        harness.register("1", "Lydia").await;

        let conv = harness.conversation("1");
        harness.run(&conv, "char new").await.unwrap();
        assert_last_sent_contains(
            &conv,
            "@1, you already have a character. Type `!char delete` to delete it.",
        );
        assert!(harness.service.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_second_char_new_is_silent() {
        let harness = TestHarness::new().await;
        let first = harness.conversation("1");
        harness.run(&first, "char new").await.unwrap();

        let second = harness.conversation("1");
        harness.run(&second, "char new").await.unwrap();
        assert_silent(&second);
        assert_eq!(harness.service.sessions().len(), 1);

        harness.run(&second, "char cancel").await.unwrap();
        harness.service.sessions().wait_closed(&UserId::new("1")).await;
        assert_silent(&second);
    }

    #[tokio::test]
    async fn test_equip_prefers_plain_variant() {
        let harness = TestHarness::new().await;
        harness.register("1", "Lydia").await;
        let conv = harness.conversation("1");
        harness
            .run(&conv, r#"item add 1 1 "Iron Sword" Eorlund 2"#)
            .await
            .unwrap();
        harness.give("1", "Iron Sword", 1).await;

        harness.run(&conv, "equip iron sword").await.unwrap();
        assert_last_sent_contains(&conv, "Iron Sword equipped");
        let character = harness.character("1").await.unwrap();
        let right = character.equipment.right_hand.unwrap();
        assert_eq!(right.maker, None);
        assert_eq!(character.inventory.weapons.len(), 1);

        harness.run(&conv, "equip iron sword").await.unwrap();
        assert_last_sent_contains(&conv, "Iron Sword (+2, by Eorlund) equipped");
    }

    #[tokio::test]
    async fn test_equip_plain_item_is_refused() {
        let harness = TestHarness::new().await;
        harness.register("1", "Lydia").await;
        harness.give("1", "Sweetroll", 1).await;

        let conv = harness.conversation("1");
        harness.run(&conv, "equip sweetroll").await.unwrap();
        assert_last_sent_contains(&conv, "cannot be equipped");
        assert_eq!(harness.character("1").await.unwrap().inventory.items.len(), 1);
    }

    #[tokio::test]
    async fn test_unequip_empty_slot() {
        let harness = TestHarness::new().await;
        harness.register("1", "Lydia").await;
        let conv = harness.conversation("1");
        harness.run(&conv, "unequip helmet").await.unwrap();
        assert_last_sent_contains(&conv, "nothing is equipped in helmet");
    }

    #[tokio::test]
    async fn test_item_remove_missing_stack() {
        let harness = TestHarness::new().await;
        harness.register("1", "Lydia").await;
        let conv = harness.conversation("1");
        harness.run(&conv, "item remove 1 1 Lockpick").await.unwrap();
        assert_last_sent_contains(&conv, "item not found in the inventory");
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let harness = TestHarness::new().await;
        let conv = harness.conversation("1");
        harness.run(&conv, "help").await.unwrap();
        let help = conv.last_sent().unwrap();
        assert_eq!(help.lines().count(), USAGE.len());
        assert!(help.contains("`!char new - create your character`"));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut characters = MockCharacterStore::new();
        characters.expect_get_character().returning(|_| {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        });
        let mut items = MockItemStore::new();
        items.expect_load_items().returning(|| Ok(Vec::new()));
        let config = GameConfig {
            seed_items: false,
            ..GameConfig::default()
        };
        let service = GameService::new(config, Arc::new(characters), Arc::new(items))
            .await
            .unwrap();

        let conv = crate::testing::ScriptedConversation::new("1");
        let err = service.handle_line(conv.clone(), "char").await.unwrap_err();
        assert!(matches!(err, GameError::Store(StoreError::Io(_))));
        assert_silent(&conv);
    }

    #[tokio::test]
    async fn test_chat_failure_propagates() {
        let harness = TestHarness::new().await;
        let mut conv = crate::chat::MockConversation::new();
        conv.expect_user().return_const("1".to_string());
        conv.expect_send()
            .returning(|_| Err(ChatError::Closed));

        let err = harness
            .service
            .handle_line(Arc::new(conv), "char")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Chat(ChatError::Closed)));
    }
}
