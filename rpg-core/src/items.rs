//! Item catalog.
//!
//! Items are global, shared definitions referenced by id from every
//! inventory and equipment slot. Once written they never change: reusing an
//! id would silently rewrite every character that holds it.

use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Catalog identifier, assigned in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Item properties
// ============================================================================

keyed_enum! {
    pub enum Rarity {
        Common => ("common", "Common"),
        Rare => ("rare", "Rare"),
        Epic => ("epic", "Epic"),
        Legendary => ("legendary", "Legendary"),
    }
}

keyed_enum! {
    /// Inventory section an item is stored under.
    pub enum ItemCategory {
        Weapon => ("weapon", "Weapons"),
        Armor => ("armor", "Armor"),
        Item => ("item", "Items"),
    }
}

keyed_enum! {
    pub enum AttackType {
        Melee => ("melee", "Melee"),
        Range => ("range", "Ranged"),
    }
}

keyed_enum! {
    pub enum WeaponType {
        Crossbow => ("crossbow", "Crossbow"),
        Bow => ("bow", "Bow"),
        Greatsword => ("greatsword", "Greatsword"),
        Battleaxe => ("battleaxe", "Battleaxe"),
        Warhammer => ("warhammer", "Warhammer"),
        Sword => ("sword", "Sword"),
        WarAxe => ("war_axe", "War axe"),
        Mace => ("mace", "Mace"),
        Dagger => ("dagger", "Dagger"),
    }
}

keyed_enum! {
    pub enum WeaponMaterial {
        Iron => ("iron", "Iron"),
        Steel => ("steel", "Steel"),
        Wood => ("wood", "Wood"),
        Silver => ("silver", "Silver"),
        Orcish => ("orcish", "Orcish"),
        Glass => ("glass", "Glass"),
        Elven => ("elven", "Elven"),
        Ebony => ("ebony", "Ebony"),
        Dwarven => ("dwarven", "Dwarven"),
        Daedric => ("daedric", "Daedric"),
    }
}

keyed_enum! {
    pub enum ArmorSlot {
        Helmet => ("helmet", "Helmet"),
        Cuirass => ("cuirass", "Cuirass"),
        Boots => ("boots", "Boots"),
        Gauntlets => ("gauntlets", "Gauntlets"),
        Shield => ("shield", "Shield"),
    }
}

keyed_enum! {
    pub enum ArmorKind {
        Heavy => ("heavy", "Heavy armor"),
        Light => ("light", "Light armor"),
        Clothing => ("clothing", "Clothing"),
    }
}

keyed_enum! {
    pub enum ArmorMaterial {
        Iron => ("iron", "Iron"),
        Steel => ("steel", "Steel"),
        Orcish => ("orcish", "Orcish"),
        Glass => ("glass", "Glass"),
        Elven => ("elven", "Elven"),
        Ebony => ("ebony", "Ebony"),
        Dwarven => ("dwarven", "Dwarven"),
        Daedric => ("daedric", "Daedric"),
        Cloth => ("cloth", "Cloth"),
        Leather => ("leather", "Leather"),
    }
}

/// Weapon-specific properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponStats {
    pub attack_type: AttackType,
    /// 1 or 2.
    pub hands: u8,
    pub weapon_type: WeaponType,
    pub material: WeaponMaterial,
    pub damage: u32,
}

impl WeaponStats {
    pub fn is_two_handed(&self) -> bool {
        self.hands >= 2
    }
}

/// Highest armor value a single piece may carry.
pub const MAX_ARMOR: u32 = 10_000;

/// Armor-specific properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorStats {
    pub slot: ArmorSlot,
    pub kind: ArmorKind,
    pub material: ArmorMaterial,
    /// Added to the wearer's armor rating while equipped.
    pub armor: u32,
}

/// The variant part of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ItemKind {
    Plain,
    Weapon(WeaponStats),
    Armor(ArmorStats),
}

// ============================================================================
// Item
// ============================================================================

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub price: u32,
    pub rarity: Rarity,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    pub fn category(&self) -> ItemCategory {
        match self.kind {
            ItemKind::Plain => ItemCategory::Item,
            ItemKind::Weapon(_) => ItemCategory::Weapon,
            ItemKind::Armor(_) => ItemCategory::Armor,
        }
    }

    pub fn weapon(&self) -> Option<&WeaponStats> {
        match &self.kind {
            ItemKind::Weapon(weapon) => Some(weapon),
            _ => None,
        }
    }

    pub fn armor(&self) -> Option<&ArmorStats> {
        match &self.kind {
            ItemKind::Armor(armor) => Some(armor),
            _ => None,
        }
    }

    /// Displayable `(label, value)` pairs for the variant-specific stats.
    pub fn stats(&self) -> Vec<(&'static str, String)> {
        let mut stats = vec![
            ("Price", self.price.to_string()),
            ("Rarity", self.rarity.label().to_string()),
        ];
        match &self.kind {
            ItemKind::Plain => {}
            ItemKind::Weapon(w) => {
                stats.push(("Type", w.weapon_type.label().to_string()));
                stats.push(("Attack", w.attack_type.label().to_string()));
                stats.push(("Hands", w.hands.to_string()));
                stats.push(("Material", w.material.label().to_string()));
                stats.push(("Damage", w.damage.to_string()));
            }
            ItemKind::Armor(a) => {
                stats.push(("Slot", a.slot.label().to_string()));
                stats.push(("Kind", a.kind.label().to_string()));
                stats.push(("Material", a.material.label().to_string()));
                stats.push(("Armor", a.armor.to_string()));
            }
        }
        stats
    }
}

/// Everything needed to create an item except its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub price: u32,
    pub rarity: Rarity,
    pub kind: ItemKind,
}

impl ItemDraft {
    pub fn plain(name: &str, description: &str, price: u32, rarity: Rarity) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            price,
            rarity,
            kind: ItemKind::Plain,
        }
    }

    pub fn weapon(name: &str, description: &str, price: u32, rarity: Rarity, stats: WeaponStats) -> Self {
        Self {
            kind: ItemKind::Weapon(stats),
            ..Self::plain(name, description, price, rarity)
        }
    }

    pub fn armor(name: &str, description: &str, price: u32, rarity: Rarity, stats: ArmorStats) -> Self {
        Self {
            kind: ItemKind::Armor(stats),
            ..Self::plain(name, description, price, rarity)
        }
    }
}

fn melee(hands: u8, weapon_type: WeaponType, material: WeaponMaterial, damage: u32) -> WeaponStats {
    WeaponStats {
        attack_type: AttackType::Melee,
        hands,
        weapon_type,
        material,
        damage,
    }
}

fn worn(slot: ArmorSlot, kind: ArmorKind, material: ArmorMaterial, armor: u32) -> ArmorStats {
    ArmorStats {
        slot,
        kind,
        material,
        armor,
    }
}

// ============================================================================
// Starter items
// ============================================================================

lazy_static::lazy_static! {
    /// Items written to an empty catalog on first start.
    pub static ref STARTER_ITEMS: Vec<ItemDraft> = vec![
        ItemDraft::weapon("Iron Dagger", "A short, plain blade.", 10, Rarity::Common,
            melee(1, WeaponType::Dagger, WeaponMaterial::Iron, 4)),
        ItemDraft::weapon("Iron Sword", "Standard issue for guards and sellswords.", 25, Rarity::Common,
            melee(1, WeaponType::Sword, WeaponMaterial::Iron, 7)),
        ItemDraft::weapon("Steel War Axe", "Heavier than it looks.", 55, Rarity::Common,
            melee(1, WeaponType::WarAxe, WeaponMaterial::Steel, 9)),
        ItemDraft::weapon("Iron Greatsword", "Needs both hands and a strong back.", 50, Rarity::Common,
            melee(2, WeaponType::Greatsword, WeaponMaterial::Iron, 15)),
        ItemDraft::weapon("Hunting Bow", "A simple wooden bow.", 50, Rarity::Common, WeaponStats {
            attack_type: AttackType::Range,
            hands: 2,
            weapon_type: WeaponType::Bow,
            material: WeaponMaterial::Wood,
            damage: 7,
        }),
        ItemDraft::weapon("Ebony Mace", "Black metal, heavy as sin.", 820, Rarity::Epic,
            melee(1, WeaponType::Mace, WeaponMaterial::Ebony, 16)),
        ItemDraft::armor("Iron Helmet", "Dented but sturdy.", 60, Rarity::Common,
            worn(ArmorSlot::Helmet, ArmorKind::Heavy, ArmorMaterial::Iron, 15)),
        ItemDraft::armor("Iron Armor", "Plates riveted to a leather backing.", 125, Rarity::Common,
            worn(ArmorSlot::Cuirass, ArmorKind::Heavy, ArmorMaterial::Iron, 25)),
        ItemDraft::armor("Leather Boots", "Soft soles for quiet steps.", 10, Rarity::Common,
            worn(ArmorSlot::Boots, ArmorKind::Light, ArmorMaterial::Leather, 5)),
        ItemDraft::armor("Leather Bracers", "Keeps the bowstring off your wrist.", 10, Rarity::Common,
            worn(ArmorSlot::Gauntlets, ArmorKind::Light, ArmorMaterial::Leather, 5)),
        ItemDraft::armor("Iron Shield", "Round and heavy.", 60, Rarity::Common,
            worn(ArmorSlot::Shield, ArmorKind::Heavy, ArmorMaterial::Iron, 20)),
        ItemDraft::armor("Roughspun Tunic", "Everyday clothes.", 5, Rarity::Common,
            worn(ArmorSlot::Cuirass, ArmorKind::Clothing, ArmorMaterial::Cloth, 0)),
        ItemDraft::plain("Sweetroll", "Someone will want to steal this.", 2, Rarity::Common),
        ItemDraft::plain("Lockpick", "Fragile.", 3, Rarity::Common),
        ItemDraft::plain("Soul Gem", "Faintly humming.", 150, Rarity::Rare),
    ];
}

// ============================================================================
// Catalog
// ============================================================================

/// In-memory item catalog with a unique, case-insensitive name index.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: BTreeMap<ItemId, Item>,
    /// Lowercase name -> id.
    name_index: HashMap<String, ItemId>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from stored items.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self, GameError> {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert(item)?;
        }
        Ok(catalog)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Look an item up by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&Item> {
        self.name_index
            .get(&name.trim().to_lowercase())
            .and_then(|id| self.items.get(id))
    }

    /// The id the next created item will get.
    pub fn next_id(&self) -> ItemId {
        self.items
            .keys()
            .next_back()
            .map(|id| ItemId(id.0 + 1))
            .unwrap_or(ItemId(0))
    }

    /// Turn a draft into an item with the next free id.
    ///
    /// Does not insert it; callers persist first and then [`insert`](Self::insert).
    pub fn create(&self, draft: ItemDraft) -> Result<Item, GameError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(GameError::InvalidInput("item name is empty".to_string()));
        }
        if self.find_by_name(&name).is_some() {
            return Err(GameError::DuplicateItemName(name));
        }
        if let ItemKind::Weapon(weapon) = &draft.kind {
            if !(1..=2).contains(&weapon.hands) {
                return Err(GameError::InvalidInput(format!(
                    "a weapon takes 1 or 2 hands, not {}",
                    weapon.hands
                )));
            }
        }
        if let ItemKind::Armor(armor) = &draft.kind {
            if armor.armor > MAX_ARMOR {
                return Err(GameError::InvalidInput(format!(
                    "armor must be at most {MAX_ARMOR}, not {}",
                    armor.armor
                )));
            }
        }
        Ok(Item {
            id: self.next_id(),
            name,
            description: draft.description,
            price: draft.price,
            rarity: draft.rarity,
            kind: draft.kind,
        })
    }

    /// Add an item. Names and ids must both be unused.
    pub fn insert(&mut self, item: Item) -> Result<(), GameError> {
        let key = item.name.trim().to_lowercase();
        if self.name_index.contains_key(&key) {
            return Err(GameError::DuplicateItemName(item.name));
        }
        if self.items.contains_key(&item.id) {
            return Err(GameError::InvalidInput(format!(
                "item id {} is already taken",
                item.id
            )));
        }
        self.name_index.insert(key, item.id);
        self.items.insert(item.id, item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }
}
