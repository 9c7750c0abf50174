//! Character aggregate types.
//!
//! Contains the character record and everything it owns exclusively:
//! attributes, the stacked inventory, and the six equipment slots.

use crate::error::GameError;
use crate::items::{Item, ItemCategory, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// ID Types
// ============================================================================

/// External user identity, as handed to us by the chat transport.
///
/// One user owns at most one character, so this doubles as the character key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// Race & Sex
// ============================================================================

keyed_enum! {
    /// Playable races.
    pub enum Race {
        Argonian => ("argonian", "Argonian"),
        Breton => ("breton", "Breton"),
        Dunmer => ("dunmer", "Dunmer"),
        Altmer => ("altmer", "Altmer"),
        Imperial => ("imperial", "Imperial"),
        Khajiit => ("khajiit", "Khajiit"),
        Nord => ("nord", "Nord"),
        Orc => ("orc", "Orc"),
        Redguard => ("redguard", "Redguard"),
        Bosmer => ("bosmer", "Bosmer"),
    }
}

keyed_enum! {
    pub enum Sex {
        Male => ("male", "Male"),
        Female => ("female", "Female"),
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Valid range for resistances, in percent.
pub const RESIST_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid range for skill levels.
pub const SKILL_RANGE: (f64, f64) = (0.0, 100.0);

keyed_enum! {
    /// The three regenerating pools.
    pub enum VitalKind {
        Health => ("health", "Health"),
        Stamina => ("stamina", "Stamina"),
        Magicka => ("magicka", "Magicka"),
    }
}

/// A regenerating pool such as health.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vital {
    pub current: f64,
    pub max: f64,
    /// Temporary offset on top of `max`.
    pub buff: f64,
    /// Percent of `max` restored per second.
    pub regen: f64,
}

impl Vital {
    /// Create a full pool.
    pub fn new(max: f64, buff: f64, regen: f64) -> Self {
        let mut vital = Self {
            current: 0.0,
            max,
            buff,
            regen,
        };
        vital.restore();
        vital
    }

    /// Maximum value including buffs.
    pub fn total(&self) -> f64 {
        (self.max + self.buff).max(0.0)
    }

    /// Add `delta` (negative to drain), clamped to `[0, total]`.
    pub fn modify(&mut self, delta: f64) {
        self.current = (self.current + delta).clamp(0.0, self.total());
    }

    pub fn restore(&mut self) {
        self.current = self.max.clamp(0.0, self.total());
    }

    pub fn regenerate(&mut self, elapsed: Duration) {
        self.modify(self.max * self.regen * elapsed.as_secs_f64() / 100.0);
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.total()
    }
}

/// Character attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub health: Vital,
    pub stamina: Vital,
    pub magicka: Vital,
    /// Resistance to magic, elements, poisons and diseases.
    pub resists: BTreeMap<String, f64>,
    pub skills: BTreeMap<String, f64>,
    /// Sum of the armor rating of every equipped armor piece.
    #[serde(default)]
    pub armor_rating: i32,
    pub unarmed_damage: u32,
}

impl Attributes {
    pub fn vital(&self, kind: VitalKind) -> &Vital {
        match kind {
            VitalKind::Health => &self.health,
            VitalKind::Stamina => &self.stamina,
            VitalKind::Magicka => &self.magicka,
        }
    }

    pub fn vital_mut(&mut self, kind: VitalKind) -> &mut Vital {
        match kind {
            VitalKind::Health => &mut self.health,
            VitalKind::Stamina => &mut self.stamina,
            VitalKind::Magicka => &mut self.magicka,
        }
    }

    /// Modify a named attribute by `delta` and return its new value.
    ///
    /// Vitals are clamped to `[0, max + buff]`, resistances to
    /// [`RESIST_RANGE`] and skills to [`SKILL_RANGE`].
    pub fn modify(&mut self, name: &str, delta: f64) -> Result<f64, GameError> {
        if let Ok(kind) = name.parse::<VitalKind>() {
            let vital = self.vital_mut(kind);
            vital.modify(delta);
            return Ok(vital.current);
        }
        if let Some(value) = self.resists.get_mut(name) {
            *value = (*value + delta).clamp(RESIST_RANGE.0, RESIST_RANGE.1);
            return Ok(*value);
        }
        if let Some(value) = self.skills.get_mut(name) {
            *value = (*value + delta).clamp(SKILL_RANGE.0, SKILL_RANGE.1);
            return Ok(*value);
        }
        Err(GameError::AttributeNotFound(name.to_string()))
    }

    /// Restore health, stamina and magicka to their maximum.
    pub fn restore(&mut self) {
        for kind in VitalKind::all() {
            self.vital_mut(*kind).restore();
        }
    }

    /// Apply `elapsed` worth of regeneration to every vital.
    pub fn regenerate(&mut self, elapsed: Duration) {
        for kind in VitalKind::all() {
            self.vital_mut(*kind).regenerate(elapsed);
        }
    }

    pub fn is_fully_restored(&self) -> bool {
        VitalKind::all().iter().all(|kind| self.vital(*kind).is_full())
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Identity of a concrete item instance: the catalog item plus who made it
/// and how well it was tempered.
///
/// Equal items from different makers or tempering are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_id: ItemId,
    #[serde(default)]
    pub maker: Option<String>,
    #[serde(default)]
    pub temper: Option<u32>,
}

impl ItemRef {
    pub fn new(item_id: ItemId, maker: Option<String>, temper: Option<u32>) -> Self {
        Self {
            item_id,
            maker,
            temper,
        }
    }

    /// The default variant: no maker, no tempering.
    pub fn plain(item_id: ItemId) -> Self {
        Self::new(item_id, None, None)
    }
}

/// An inventory entry: some quantity of one item instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRecord {
    #[serde(flatten)]
    pub item: ItemRef,
    pub count: u32,
}

/// Character inventory, one ordered list of stacks per item category.
///
/// Every stored record has a positive count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub weapons: Vec<StackRecord>,
    #[serde(default)]
    pub armor: Vec<StackRecord>,
    #[serde(default)]
    pub items: Vec<StackRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stacks(&self, category: ItemCategory) -> &[StackRecord] {
        match category {
            ItemCategory::Weapon => &self.weapons,
            ItemCategory::Armor => &self.armor,
            ItemCategory::Item => &self.items,
        }
    }

    fn stacks_mut(&mut self, category: ItemCategory) -> &mut Vec<StackRecord> {
        match category {
            ItemCategory::Weapon => &mut self.weapons,
            ItemCategory::Armor => &mut self.armor,
            ItemCategory::Item => &mut self.items,
        }
    }

    /// Find the stack holding exactly this item instance.
    pub fn find(&self, category: ItemCategory, item: &ItemRef) -> Option<&StackRecord> {
        self.stacks(category).iter().find(|stack| &stack.item == item)
    }

    /// Get the stack of `item` made by `maker` with `temper`.
    pub fn get_item(
        &self,
        item: &Item,
        maker: Option<&str>,
        temper: Option<u32>,
    ) -> Result<&StackRecord, GameError> {
        let item_ref = ItemRef::new(item.id, maker.map(str::to_string), temper);
        self.find(item.category(), &item_ref)
            .ok_or(GameError::ItemNotFoundInInventory)
    }

    /// Number of units of this item instance.
    pub fn count(&self, category: ItemCategory, item: &ItemRef) -> u32 {
        self.find(category, item).map(|stack| stack.count).unwrap_or(0)
    }

    /// Add `count` units of `item`, stacking onto an identical instance.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidInput`] if the stack would hold more than
    /// `u32::MAX` units. The inventory is left unchanged.
    pub fn add_item(
        &mut self,
        item: &Item,
        count: u32,
        maker: Option<String>,
        temper: Option<u32>,
    ) -> Result<(), GameError> {
        self.add_stack(item.category(), ItemRef::new(item.id, maker, temper), count)
    }

    pub(crate) fn add_stack(
        &mut self,
        category: ItemCategory,
        item: ItemRef,
        count: u32,
    ) -> Result<(), GameError> {
        let stacks = self.stacks_mut(category);
        match stacks.iter_mut().find(|stack| stack.item == item) {
            Some(stack) => {
                stack.count = stack.count.checked_add(count).ok_or_else(|| {
                    GameError::InvalidInput(format!("a stack holds at most {} units", u32::MAX))
                })?;
            }
            None => stacks.push(StackRecord { item, count }),
        }
        stacks.retain(|stack| stack.count > 0);
        Ok(())
    }

    /// Remove `count` units from the default (no maker, no temper) stack of
    /// `item`. The stack disappears once it reaches zero.
    pub fn remove_item(&mut self, item: &Item, count: u32) -> Result<(), GameError> {
        self.remove_stack(item.category(), &ItemRef::plain(item.id), count)
    }

    /// Remove `count` units of an exact item instance.
    pub fn remove_stack(
        &mut self,
        category: ItemCategory,
        item: &ItemRef,
        count: u32,
    ) -> Result<(), GameError> {
        let stacks = self.stacks_mut(category);
        let stack = stacks
            .iter_mut()
            .find(|stack| &stack.item == item)
            .ok_or(GameError::ItemNotFoundInInventory)?;
        stack.count = stack.count.saturating_sub(count);
        stacks.retain(|stack| stack.count > 0);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        ItemCategory::all()
            .iter()
            .all(|category| self.stacks(*category).is_empty())
    }
}

// ============================================================================
// Equipment
// ============================================================================

keyed_enum! {
    /// The six equipment slots.
    pub enum EquipmentSlot {
        /// Any weapon. Two-handed weapons occupy only this slot.
        RightHand => ("right_hand", "Right hand"),
        /// A second one-handed weapon or a shield.
        LeftHand => ("left_hand", "Left hand"),
        Helmet => ("helmet", "Helmet"),
        Cuirass => ("cuirass", "Cuirass"),
        Gauntlets => ("gauntlets", "Gauntlets"),
        Boots => ("boots", "Boots"),
    }
}

/// What the character is wearing and wielding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub right_hand: Option<ItemRef>,
    pub left_hand: Option<ItemRef>,
    pub helmet: Option<ItemRef>,
    pub cuirass: Option<ItemRef>,
    pub gauntlets: Option<ItemRef>,
    pub boots: Option<ItemRef>,
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: EquipmentSlot) -> Option<&ItemRef> {
        match slot {
            EquipmentSlot::RightHand => self.right_hand.as_ref(),
            EquipmentSlot::LeftHand => self.left_hand.as_ref(),
            EquipmentSlot::Helmet => self.helmet.as_ref(),
            EquipmentSlot::Cuirass => self.cuirass.as_ref(),
            EquipmentSlot::Gauntlets => self.gauntlets.as_ref(),
            EquipmentSlot::Boots => self.boots.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: EquipmentSlot) -> &mut Option<ItemRef> {
        match slot {
            EquipmentSlot::RightHand => &mut self.right_hand,
            EquipmentSlot::LeftHand => &mut self.left_hand,
            EquipmentSlot::Helmet => &mut self.helmet,
            EquipmentSlot::Cuirass => &mut self.cuirass,
            EquipmentSlot::Gauntlets => &mut self.gauntlets,
            EquipmentSlot::Boots => &mut self.boots,
        }
    }

    /// Occupied slots in display order.
    pub fn iter(&self) -> impl Iterator<Item = (EquipmentSlot, &ItemRef)> {
        EquipmentSlot::all()
            .iter()
            .filter_map(move |slot| self.get(*slot).map(|item| (*slot, item)))
    }
}

// ============================================================================
// Character
// ============================================================================

/// Shortest accepted character name, in characters.
pub const NAME_MIN_LEN: usize = 3;
/// Longest accepted character name, in characters.
pub const NAME_MAX_LEN: usize = 25;
/// Shortest accepted description, in characters.
pub const DESCRIPTION_MIN_LEN: usize = 50;
/// Longest accepted description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 2000;

/// A player character. One per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub owner: UserId,
    pub name: String,
    pub race: Race,
    pub sex: Sex,
    pub description: String,
    pub level: u32,
    pub experience: u64,
    pub experience_multiplier: f64,
    #[serde(default)]
    pub avatar: Option<String>,
    pub attributes: Attributes,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub equipment: Equipment,
    /// Incremented by the store on every successful save.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ItemKind, Rarity};

    fn potion(id: u32) -> Item {
        Item {
            id: ItemId(id),
            name: format!("Potion {id}"),
            description: "Restores health.".to_string(),
            price: 10,
            rarity: Rarity::Common,
            kind: ItemKind::Plain,
        }
    }

    fn attributes() -> Attributes {
        Attributes {
            health: Vital::new(100.0, 0.0, 1.0),
            stamina: Vital::new(100.0, 20.0, 5.0),
            magicka: Vital::new(50.0, 0.0, 3.0),
            resists: BTreeMap::from([("fire".to_string(), 80.0)]),
            skills: BTreeMap::from([("archery".to_string(), 95.0)]),
            armor_rating: 0,
            unarmed_damage: 4,
        }
    }

    #[test]
    fn test_vital_clamps_to_total() {
        let mut vital = Vital::new(100.0, 25.0, 1.0);
        assert_eq!(vital.current, 100.0);

        vital.modify(500.0);
        assert_eq!(vital.current, 125.0);

        vital.modify(-1000.0);
        assert_eq!(vital.current, 0.0);
    }

    #[test]
    fn test_vital_regenerates_percent_of_max() {
        let mut vital = Vital::new(200.0, 0.0, 0.5);
        vital.modify(-100.0);
        vital.regenerate(Duration::from_secs(5));
        // 200 * 0.5 * 5 / 100 = 5
        assert_eq!(vital.current, 105.0);
    }

    #[test]
    fn test_attribute_modify_clamps_resists_and_skills() {
        let mut attrs = attributes();
        assert_eq!(attrs.modify("fire", 50.0).unwrap(), 90.0);
        assert_eq!(attrs.modify("fire", -500.0).unwrap(), -90.0);
        assert_eq!(attrs.modify("archery", 10.0).unwrap(), 100.0);
        assert_eq!(attrs.modify("archery", -200.0).unwrap(), 0.0);
        assert_eq!(attrs.modify("health", -30.0).unwrap(), 70.0);
    }

    #[test]
    fn test_attribute_modify_unknown() {
        let mut attrs = attributes();
        let err = attrs.modify("luck", 1.0).unwrap_err();
        assert!(matches!(err, GameError::AttributeNotFound(name) if name == "luck"));
    }

    #[test]
    fn test_restore_sets_current_to_max() {
        let mut attrs = attributes();
        attrs.stamina.modify(60.0);
        attrs.health.modify(-60.0);
        attrs.restore();
        assert_eq!(attrs.health.current, 100.0);
        assert_eq!(attrs.stamina.current, 100.0);
    }

    #[test]
    fn test_add_item_stacks_by_maker_and_temper() {
        let mut inv = Inventory::new();
        let item = potion(1);

        inv.add_item(&item, 2, None, None).unwrap();
        inv.add_item(&item, 3, None, None).unwrap();
        inv.add_item(&item, 1, Some("Eorlund".to_string()), None).unwrap();
        inv.add_item(&item, 1, Some("Eorlund".to_string()), Some(2)).unwrap();

        assert_eq!(inv.items.len(), 3);
        assert_eq!(inv.count(ItemCategory::Item, &ItemRef::plain(item.id)), 5);
        assert_eq!(
            inv.get_item(&item, Some("Eorlund"), None).unwrap().count,
            1
        );
    }

    #[test]
    fn test_stack_overflow_is_rejected() {
        let mut inv = Inventory::new();
        let item = potion(1);
        inv.add_item(&item, u32::MAX - 1, None, None).unwrap();

        let err = inv.add_item(&item, 2, None, None).unwrap_err();
        assert!(matches!(err, GameError::InvalidInput(_)));
        assert_eq!(inv.count(ItemCategory::Item, &ItemRef::plain(item.id)), u32::MAX - 1);

        inv.add_item(&item, 1, None, None).unwrap();
        assert_eq!(inv.count(ItemCategory::Item, &ItemRef::plain(item.id)), u32::MAX);
    }

    #[test]
    fn test_add_zero_leaves_no_record() {
        let mut inv = Inventory::new();
        inv.add_item(&potion(1), 0, None, None).unwrap();
        assert!(inv.is_empty());
    }

    #[test]
    fn test_remove_item_prunes_empty_stack() {
        let mut inv = Inventory::new();
        let item = potion(1);
        inv.add_item(&item, 2, None, None).unwrap();

        inv.remove_item(&item, 1).unwrap();
        assert_eq!(inv.count(ItemCategory::Item, &ItemRef::plain(item.id)), 1);

        inv.remove_item(&item, 5).unwrap();
        assert!(inv.items.is_empty());
        assert!(inv.is_empty());
    }

    #[test]
    fn test_remove_item_only_touches_default_variant() {
        let mut inv = Inventory::new();
        let item = potion(1);
        inv.add_item(&item, 1, Some("Eorlund".to_string()), None).unwrap();

        let err = inv.remove_item(&item, 1).unwrap_err();
        assert!(matches!(err, GameError::ItemNotFoundInInventory));
        assert_eq!(inv.items.len(), 1);
    }

    #[test]
    fn test_quantity_is_conserved() {
        let mut inv = Inventory::new();
        let item = potion(7);
        let mut expected: i64 = 0;
        for (add, remove) in [(3u32, 1u32), (5, 2), (1, 6), (4, 0), (2, 2)] {
            inv.add_item(&item, add, None, None).unwrap();
            expected += add as i64;
            if inv.remove_item(&item, remove).is_ok() {
                expected = (expected - remove as i64).max(0);
            }
            let count = inv.count(ItemCategory::Item, &ItemRef::plain(item.id)) as i64;
            assert_eq!(count, expected);
            assert!(inv.items.iter().all(|s| s.count > 0));
        }
    }

    #[test]
    fn test_equipment_iter_in_slot_order() {
        let mut equipment = Equipment::new();
        equipment.boots = Some(ItemRef::plain(ItemId(3)));
        equipment.right_hand = Some(ItemRef::plain(ItemId(1)));

        let slots: Vec<_> = equipment.iter().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![EquipmentSlot::RightHand, EquipmentSlot::Boots]);
    }

    #[test]
    fn test_race_parses_key_and_label() {
        assert_eq!("argonian".parse::<Race>().unwrap(), Race::Argonian);
        assert_eq!("  KHAJIIT ".parse::<Race>().unwrap(), Race::Khajiit);
        assert!("elf".parse::<Race>().is_err());
    }
}
