//! Equip and unequip rules.
//!
//! Every lookup that can fail is resolved before the character is touched,
//! so an error never leaves a half-applied equip behind. Saving the
//! character afterwards is the caller's job.

use crate::error::GameError;
use crate::items::{ArmorSlot, ArmorStats, Item, ItemCatalog, WeaponStats};
use crate::world::{Character, EquipmentSlot, ItemRef};
use tracing::debug;

impl ArmorSlot {
    /// Equipment slot a piece of armor goes into. Shields are held in the
    /// left hand.
    pub fn equipment_slot(&self) -> EquipmentSlot {
        match self {
            ArmorSlot::Helmet => EquipmentSlot::Helmet,
            ArmorSlot::Cuirass => EquipmentSlot::Cuirass,
            ArmorSlot::Boots => EquipmentSlot::Boots,
            ArmorSlot::Gauntlets => EquipmentSlot::Gauntlets,
            ArmorSlot::Shield => EquipmentSlot::LeftHand,
        }
    }
}

/// An occupied slot with its catalog entry already resolved.
struct Slotted<'a> {
    slot: EquipmentSlot,
    item: &'a Item,
}

fn slotted<'a>(
    character: &Character,
    catalog: &'a ItemCatalog,
    slot: EquipmentSlot,
) -> Result<Option<Slotted<'a>>, GameError> {
    match character.equipment.get(slot) {
        None => Ok(None),
        Some(item_ref) => {
            let item = catalog.get(item_ref.item_id).ok_or(GameError::ItemNotFound)?;
            Ok(Some(Slotted { slot, item }))
        }
    }
}

/// Move a resolved slot back into the inventory.
fn stow(character: &mut Character, slotted: Slotted<'_>) -> Result<(), GameError> {
    let Some(item_ref) = character.equipment.slot_mut(slotted.slot).take() else {
        return Ok(());
    };
    character
        .inventory
        .add_stack(slotted.item.category(), item_ref, 1)
}

/// Sum of the armor of every equipped piece, capped at `i32::MAX`.
///
/// Items missing from the catalog count as zero.
fn worn_armor(character: &Character, catalog: &ItemCatalog) -> i32 {
    let total: u64 = character
        .equipment
        .iter()
        .filter_map(|(_, item_ref)| catalog.get(item_ref.item_id))
        .filter_map(Item::armor)
        .map(|armor| u64::from(armor.armor))
        .sum();
    i32::try_from(total).unwrap_or(i32::MAX)
}

/// Equip one unit of the inventory stack `item_ref`.
///
/// # Errors
///
/// - [`GameError::ItemNotFound`] if the item (or something currently
///   equipped) is missing from the catalog.
/// - [`GameError::ItemNotFoundInInventory`] if the stack is no longer in the
///   inventory.
/// - [`GameError::ItemIsNotEquippable`] for anything but weapons and armor.
pub fn equip_item(
    character: &mut Character,
    catalog: &ItemCatalog,
    item_ref: &ItemRef,
) -> Result<(), GameError> {
    let item = catalog
        .get(item_ref.item_id)
        .ok_or(GameError::ItemNotFound)?;
    let category = item.category();
    if character.inventory.count(category, item_ref) == 0 {
        return Err(GameError::ItemNotFoundInInventory);
    }

    if let Some(weapon) = item.weapon() {
        equip_weapon(character, catalog, item_ref, weapon)?;
    } else if let Some(armor) = item.armor() {
        equip_armor(character, catalog, item_ref, armor)?;
    } else {
        return Err(GameError::ItemIsNotEquippable);
    }

    character.attributes.armor_rating = worn_armor(character, catalog);
    debug!(owner = %character.owner, item = %item.name, "equipped");
    character.inventory.remove_stack(category, item_ref, 1)
}

fn equip_weapon(
    character: &mut Character,
    catalog: &ItemCatalog,
    item_ref: &ItemRef,
    weapon: &WeaponStats,
) -> Result<(), GameError> {
    let right = slotted(character, catalog, EquipmentSlot::RightHand)?;
    let left = slotted(character, catalog, EquipmentSlot::LeftHand)?;

    if weapon.is_two_handed() {
        // Both hands end up free for the new weapon.
        if let Some(left) = left {
            stow(character, left)?;
        }
        if let Some(right) = right {
            stow(character, right)?;
        }
    } else if let Some(right) = right {
        if let Some(left) = left {
            stow(character, left)?;
        }
        let one_handed = right
            .item
            .weapon()
            .map(|w| !w.is_two_handed())
            .unwrap_or(false);
        if one_handed {
            // The old main-hand weapon moves to the off hand, not the bag.
            character.equipment.left_hand = character.equipment.right_hand.take();
        } else {
            stow(character, right)?;
        }
    }

    character.equipment.right_hand = Some(item_ref.clone());
    Ok(())
}

fn equip_armor(
    character: &mut Character,
    catalog: &ItemCatalog,
    item_ref: &ItemRef,
    armor: &ArmorStats,
) -> Result<(), GameError> {
    let slot = armor.slot.equipment_slot();
    let current = slotted(character, catalog, slot)?;
    let two_handed_right = if armor.slot == ArmorSlot::Shield {
        slotted(character, catalog, EquipmentSlot::RightHand)?
            .filter(|right| right.item.weapon().is_some_and(WeaponStats::is_two_handed))
    } else {
        None
    };

    if let Some(right) = two_handed_right {
        stow(character, right)?;
    }
    if let Some(current) = current {
        stow(character, current)?;
    }

    *character.equipment.slot_mut(slot) = Some(item_ref.clone());
    Ok(())
}

/// Return whatever is in `slot` to the inventory.
///
/// Returns the removed item, or `None` if the slot was already empty.
pub fn unequip_item(
    character: &mut Character,
    catalog: &ItemCatalog,
    slot: EquipmentSlot,
) -> Result<Option<ItemRef>, GameError> {
    let Some(occupied) = slotted(character, catalog, slot)? else {
        return Ok(None);
    };
    let item_ref = character.equipment.get(slot).cloned();
    stow(character, occupied)?;
    character.attributes.armor_rating = worn_armor(character, catalog);
    debug!(owner = %character.owner, slot = slot.key(), "unequipped");
    Ok(item_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{
        ArmorKind, ArmorMaterial, AttackType, ItemCategory, ItemDraft, ItemId, ItemKind, Rarity,
        WeaponMaterial, WeaponType,
    };
    use crate::testing::sample_character;

    struct Fixture {
        catalog: ItemCatalog,
        character: Character,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: ItemCatalog::new(),
                character: sample_character("owner-1"),
            }
        }

        fn add(&mut self, name: &str, kind: ItemKind) -> Item {
            let item = self
                .catalog
                .create(ItemDraft {
                    name: name.to_string(),
                    description: String::new(),
                    price: 1,
                    rarity: Rarity::Common,
                    kind,
                })
                .unwrap();
            self.catalog.insert(item.clone()).unwrap();
            self.character.inventory.add_item(&item, 1, None, None).unwrap();
            item
        }

        fn weapon(&mut self, name: &str, hands: u8) -> Item {
            self.add(
                name,
                ItemKind::Weapon(WeaponStats {
                    attack_type: AttackType::Melee,
                    hands,
                    weapon_type: if hands == 2 {
                        WeaponType::Greatsword
                    } else {
                        WeaponType::Sword
                    },
                    material: WeaponMaterial::Steel,
                    damage: 8,
                }),
            )
        }

        fn armor(&mut self, name: &str, slot: ArmorSlot, rating: u32) -> Item {
            self.add(
                name,
                ItemKind::Armor(ArmorStats {
                    slot,
                    kind: ArmorKind::Heavy,
                    material: ArmorMaterial::Steel,
                    armor: rating,
                }),
            )
        }

        fn equip(&mut self, item: &Item) -> Result<(), GameError> {
            equip_item(&mut self.character, &self.catalog, &ItemRef::plain(item.id))
        }

        fn slot(&self, slot: EquipmentSlot) -> Option<ItemId> {
            self.character.equipment.get(slot).map(|r| r.item_id)
        }

        fn held(&self, item: &Item) -> u32 {
            self.character
                .inventory
                .count(item.category(), &ItemRef::plain(item.id))
        }
    }

    #[test]
    fn test_equip_weapon_into_empty_hands() {
        let mut fx = Fixture::new();
        let sword = fx.weapon("Steel Sword", 1);

        fx.equip(&sword).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(sword.id));
        assert_eq!(fx.held(&sword), 0);
        assert!(fx.character.inventory.weapons.is_empty());
    }

    #[test]
    fn test_one_handed_over_one_handed_moves_old_to_left() {
        let mut fx = Fixture::new();
        let a = fx.weapon("Sword A", 1);
        let b = fx.weapon("Sword B", 1);

        fx.equip(&a).unwrap();
        fx.equip(&b).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(b.id));
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), Some(a.id));
        assert_eq!(fx.held(&a), 0, "A must not return to the inventory");
    }

    #[test]
    fn test_one_handed_clears_off_hand_first() {
        let mut fx = Fixture::new();
        let a = fx.weapon("Sword A", 1);
        let b = fx.weapon("Sword B", 1);
        let c = fx.weapon("Sword C", 1);

        fx.equip(&a).unwrap();
        fx.equip(&b).unwrap();
        fx.equip(&c).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(c.id));
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), Some(b.id));
        assert_eq!(fx.held(&a), 1);
    }

    #[test]
    fn test_two_handed_clears_both_hands() {
        let mut fx = Fixture::new();
        let a = fx.weapon("Sword A", 1);
        let b = fx.weapon("Sword B", 1);
        let great = fx.weapon("Greatsword", 2);

        fx.equip(&a).unwrap();
        fx.equip(&b).unwrap();
        fx.equip(&great).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(great.id));
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), None);
        assert_eq!(fx.held(&a), 1);
        assert_eq!(fx.held(&b), 1);
    }

    #[test]
    fn test_one_handed_over_two_handed_returns_it() {
        let mut fx = Fixture::new();
        let great = fx.weapon("Greatsword", 2);
        let dagger = fx.weapon("Dagger", 1);

        fx.equip(&great).unwrap();
        fx.equip(&dagger).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(dagger.id));
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), None);
        assert_eq!(fx.held(&great), 1);
    }

    #[test]
    fn test_two_handed_clears_shield_even_with_empty_right_hand() {
        let mut fx = Fixture::new();
        let shield = fx.armor("Steel Shield", ArmorSlot::Shield, 20);
        let great = fx.weapon("Greatsword", 2);

        fx.equip(&shield).unwrap();
        assert_eq!(fx.character.attributes.armor_rating, 20);

        fx.equip(&great).unwrap();
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), None);
        assert_eq!(fx.held(&shield), 1);
        assert_eq!(fx.character.attributes.armor_rating, 0);
    }

    #[test]
    fn test_shield_evicts_two_handed_weapon() {
        let mut fx = Fixture::new();
        let great = fx.weapon("Greatsword", 2);
        let shield = fx.armor("Steel Shield", ArmorSlot::Shield, 20);

        fx.equip(&great).unwrap();
        fx.equip(&shield).unwrap();

        assert_eq!(fx.slot(EquipmentSlot::RightHand), None);
        assert_eq!(fx.slot(EquipmentSlot::LeftHand), Some(shield.id));
        assert_eq!(fx.held(&great), 1);
    }

    #[test]
    fn test_armor_replaces_same_slot_and_tracks_rating() {
        let mut fx = Fixture::new();
        let sword = fx.weapon("Sword", 1);
        let iron = fx.armor("Iron Helmet", ArmorSlot::Helmet, 15);
        let steel = fx.armor("Steel Helmet", ArmorSlot::Helmet, 17);
        let boots = fx.armor("Steel Boots", ArmorSlot::Boots, 12);

        fx.equip(&sword).unwrap();
        fx.equip(&iron).unwrap();
        fx.equip(&boots).unwrap();
        assert_eq!(fx.character.attributes.armor_rating, 27);

        fx.equip(&steel).unwrap();
        assert_eq!(fx.slot(EquipmentSlot::Helmet), Some(steel.id));
        assert_eq!(fx.held(&iron), 1);
        assert_eq!(fx.character.attributes.armor_rating, 29);
        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(sword.id));
    }

    #[test]
    fn test_equip_then_unequip_round_trip() {
        let mut fx = Fixture::new();
        let cuirass = fx.armor("Steel Cuirass", ArmorSlot::Cuirass, 31);
        let crafted = ItemRef::new(cuirass.id, Some("Eorlund".to_string()), Some(3));
        fx.character
            .inventory
            .add_stack(ItemCategory::Armor, crafted.clone(), 2)
            .unwrap();

        let before_inventory = fx.character.inventory.clone();
        let before_rating = fx.character.attributes.armor_rating;

        equip_item(&mut fx.character, &fx.catalog, &crafted).unwrap();
        assert_eq!(fx.character.equipment.cuirass.as_ref(), Some(&crafted));
        assert_eq!(fx.character.inventory.count(ItemCategory::Armor, &crafted), 1);

        let removed = unequip_item(&mut fx.character, &fx.catalog, EquipmentSlot::Cuirass).unwrap();
        assert_eq!(removed, Some(crafted));
        assert_eq!(fx.character.inventory, before_inventory);
        assert_eq!(fx.character.attributes.armor_rating, before_rating);
    }

    #[test]
    fn test_huge_stored_armor_does_not_overflow_rating() {
        let mut fx = Fixture::new();
        // Stored items skip the checks `create` makes.
        for (id, slot) in [(100, ArmorSlot::Helmet), (101, ArmorSlot::Boots)] {
            let item = Item {
                id: ItemId(id),
                name: format!("Legacy {slot}"),
                description: String::new(),
                price: 1,
                rarity: Rarity::Legendary,
                kind: ItemKind::Armor(ArmorStats {
                    slot,
                    kind: ArmorKind::Heavy,
                    material: ArmorMaterial::Steel,
                    armor: 2_000_000_000,
                }),
            };
            fx.catalog.insert(item.clone()).unwrap();
            fx.character.inventory.add_item(&item, 1, None, None).unwrap();
            fx.equip(&item).unwrap();
        }
        assert_eq!(fx.character.attributes.armor_rating, i32::MAX);

        unequip_item(&mut fx.character, &fx.catalog, EquipmentSlot::Boots).unwrap();
        assert_eq!(fx.character.attributes.armor_rating, 2_000_000_000);
        unequip_item(&mut fx.character, &fx.catalog, EquipmentSlot::Helmet).unwrap();
        assert_eq!(fx.character.attributes.armor_rating, 0);
    }

    #[test]
    fn test_unequip_empty_slot_is_noop() {
        let mut fx = Fixture::new();
        let before = fx.character.clone();
        let removed = unequip_item(&mut fx.character, &fx.catalog, EquipmentSlot::Boots).unwrap();
        assert!(removed.is_none());
        assert_eq!(fx.character, before);
    }

    #[test]
    fn test_plain_item_is_not_equippable() {
        let mut fx = Fixture::new();
        let bread = fx.add("Bread", ItemKind::Plain);
        let before = fx.character.clone();

        let err = fx.equip(&bread).unwrap_err();
        assert!(matches!(err, GameError::ItemIsNotEquippable));
        assert_eq!(fx.character, before);
    }

    #[test]
    fn test_equip_requires_stack_in_inventory() {
        let mut fx = Fixture::new();
        let sword = fx.weapon("Sword", 1);
        fx.equip(&sword).unwrap();

        let err = fx.equip(&sword).unwrap_err();
        assert!(matches!(err, GameError::ItemNotFoundInInventory));
        assert_eq!(fx.slot(EquipmentSlot::RightHand), Some(sword.id));
    }
}
