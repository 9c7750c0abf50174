//! Chat rendering of characters, inventories and items.

use crate::chat::Form;
use crate::config::GameConfig;
use crate::items::{Item, ItemCatalog, ItemCategory};
use crate::world::{Character, EquipmentSlot, ItemRef, StackRecord, VitalKind};

const SHEET_COLOR: u32 = 0x8B5A2B;

/// Display name of an item instance, e.g. `Iron Sword (+2, by Eorlund)`.
pub fn item_ref_name(catalog: &ItemCatalog, item_ref: &ItemRef) -> String {
    let mut name = catalog
        .get(item_ref.item_id)
        .map(|item| item.name.clone())
        .unwrap_or_else(|| format!("Unknown item {}", item_ref.item_id));
    let mut extras = Vec::new();
    if let Some(temper) = item_ref.temper {
        extras.push(format!("+{temper}"));
    }
    if let Some(maker) = &item_ref.maker {
        extras.push(format!("by {maker}"));
    }
    if !extras.is_empty() {
        name.push_str(&format!(" ({})", extras.join(", ")));
    }
    name
}

/// The `char` sheet.
pub fn character_sheet(config: &GameConfig, character: &Character, catalog: &ItemCatalog) -> Form {
    let attrs = &character.attributes;
    let mut form = Form::new(&character.name)
        .with_description(&character.description)
        .with_footer(&config.bot.name)
        .with_color(SHEET_COLOR)
        .field("Race", config.race_name(character.race))
        .field("Sex", config.sex_name(character.sex))
        .field("Level", character.level.to_string())
        .field("Experience", character.experience.to_string());
    if let Some(avatar) = &character.avatar {
        form = form.with_thumbnail(avatar);
    }

    for kind in VitalKind::all() {
        let vital = attrs.vital(*kind);
        form.push_field(
            kind.label(),
            format!("{:.0}/{:.0}", vital.current.floor(), vital.total()),
        );
    }
    form.push_field("Armor rating", attrs.armor_rating.to_string());

    for slot in EquipmentSlot::all() {
        let worn = character
            .equipment
            .get(*slot)
            .map(|item_ref| item_ref_name(catalog, item_ref))
            .unwrap_or_else(|| "empty".to_string());
        form.push_field(slot.label(), worn);
    }
    form
}

/// One page per non-empty inventory category, items sorted by name.
///
/// An empty inventory renders as a single page saying so.
pub fn inventory_pages(config: &GameConfig, character: &Character, catalog: &ItemCatalog) -> Vec<Form> {
    let title = format!("{}: inventory", character.name);
    let mut pages = Vec::new();

    for category in ItemCategory::all() {
        let mut stacks: Vec<(String, &StackRecord)> = character
            .inventory
            .stacks(*category)
            .iter()
            .map(|stack| (item_ref_name(catalog, &stack.item), stack))
            .collect();
        if stacks.is_empty() {
            continue;
        }
        stacks.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

        let mut page = Form::new(&title)
            .with_description(category.label())
            .with_footer(&config.bot.name);
        for (name, stack) in stacks {
            let stats = catalog
                .get(stack.item.item_id)
                .map(summary)
                .unwrap_or_default();
            page.push_field(format!("{name} ({})", stack.count), stats);
        }
        pages.push(page);
    }

    if pages.is_empty() {
        pages.push(
            Form::new(title)
                .with_description("Inventory is empty.")
                .with_footer(&config.bot.name),
        );
    }
    pages
}

/// The `item` card.
pub fn item_card(config: &GameConfig, item: &Item) -> Form {
    let mut form = Form::new(&item.name)
        .with_description(&item.description)
        .with_footer(format!("Item #{}", item.id))
        .with_color(config.rarity_color(item.rarity))
        .field("Category", item.category().label());
    for (label, value) in item.stats() {
        let value = if label == "Rarity" {
            config.rarity_name(item.rarity)
        } else {
            value
        };
        form.push_field(label, value);
    }
    form
}

/// One-line stats summary for inventory listings.
fn summary(item: &Item) -> String {
    item.stats()
        .into_iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(" | ")
}
