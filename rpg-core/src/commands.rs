//! Command-line parsing.
//!
//! Turns one chat line (without the bot prefix) into a typed [`Command`].
//! Arguments are separated by whitespace; double quotes group words into a
//! single argument.

use crate::error::GameError;
use crate::items::{
    ArmorKind, ArmorMaterial, ArmorSlot, ArmorStats, AttackType, ItemCategory, ItemDraft, ItemKind,
    Rarity, WeaponMaterial, WeaponStats, WeaponType,
};
use crate::world::{EquipmentSlot, UserId};
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid {name}: {value:?}")]
    InvalidArgument { name: &'static str, value: String },

    #[error("unexpected argument: {0:?}")]
    UnexpectedArgument(String),

    #[error("unclosed quote")]
    UnclosedQuote,
}

impl From<ParseError> for GameError {
    fn from(err: ParseError) -> Self {
        GameError::InvalidInput(err.to_string())
    }
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `char [user]`
    CharInfo { user: Option<UserId> },
    /// `char new`
    CharNew,
    /// `char cancel`
    CharCancel,
    /// `char delete` (alias `char del`)
    CharDelete,
    /// `inventory [user]` (alias `inv`)
    Inventory { user: Option<UserId> },
    /// `equip <item>`
    Equip { item: String },
    /// `unequip <slot>`
    Unequip { slot: EquipmentSlot },
    /// `item <name>`
    ItemInfo { name: String },
    /// `item new <type> <name> <description> <price> <rarity> [extra...]`
    ItemNew(ItemDraft),
    /// `item add <user> <count> <item> [maker] [temper]`
    ItemAdd {
        user: UserId,
        count: u32,
        item: String,
        maker: Option<String>,
        temper: Option<u32>,
    },
    /// `item remove <user> <count> <item>`
    ItemRemove {
        user: UserId,
        count: u32,
        item: String,
    },
    /// `help`
    Help,
}

impl Command {
    /// Whether only game admins may run this command.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Command::ItemNew(_) | Command::ItemAdd { .. } | Command::ItemRemove { .. }
        )
    }

    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let tokens = tokenize(line)?;
        let mut args = Args::new(tokens);
        let head = args.next().ok_or(ParseError::Empty)?;

        let command = match head.to_lowercase().as_str() {
            "char" => match args.peek().map(|s| s.to_lowercase()).as_deref() {
                Some("new") => {
                    args.next();
                    Command::CharNew
                }
                Some("cancel") => {
                    args.next();
                    Command::CharCancel
                }
                Some("delete") | Some("del") => {
                    args.next();
                    Command::CharDelete
                }
                _ => Command::CharInfo {
                    user: args.next().map(|s| parse_user(&s)),
                },
            },
            "inventory" | "inv" => Command::Inventory {
                user: args.next().map(|s| parse_user(&s)),
            },
            "equip" => Command::Equip {
                item: args.rest("item")?,
            },
            "unequip" => Command::Unequip {
                slot: args.parsed("slot")?,
            },
            "item" => match args.peek().map(|s| s.to_lowercase()).as_deref() {
                Some("new") => {
                    args.next();
                    Command::ItemNew(parse_item_new(&mut args)?)
                }
                Some("add") => {
                    args.next();
                    Command::ItemAdd {
                        user: parse_user(&args.required("user")?),
                        count: args.parsed("count")?,
                        item: args.required("item")?,
                        maker: args.next(),
                        temper: args.optional("temper")?,
                    }
                }
                Some("remove") => {
                    args.next();
                    Command::ItemRemove {
                        user: parse_user(&args.required("user")?),
                        count: args.parsed("count")?,
                        item: args.required("item")?,
                    }
                }
                _ => Command::ItemInfo {
                    name: args.rest("name")?,
                },
            },
            "help" => Command::Help,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        args.finish()?;
        Ok(command)
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Usage lines for `help`, without the prefix.
pub const USAGE: &[&str] = &[
    "char [user] - show a character",
    "char new - create your character",
    "char cancel - stop creating your character",
    "char delete - delete your character",
    "inventory [user] - show an inventory",
    "equip <item> - equip an item from your inventory",
    "unequip <slot> - put an equipped item back into your inventory",
    "item <name> - show an item",
    "item new <type> <name> <description> <price> <rarity> [extra...] - create an item",
    "item add <user> <count> <item> [maker] [temper] - give items to a character",
    "item remove <user> <count> <item> - take items from a character",
];

fn parse_item_new(args: &mut Args) -> Result<ItemDraft, ParseError> {
    let category: ItemCategory = args.parsed("item type")?;
    let name = args.required("name")?;
    let description = args.required("description")?;
    let price = args.parsed("price")?;
    let rarity: Rarity = args.parsed("rarity")?;

    let kind = match category {
        ItemCategory::Item => ItemKind::Plain,
        ItemCategory::Weapon => ItemKind::Weapon(WeaponStats {
            attack_type: args.parsed::<AttackType>("attack type")?,
            hands: args.parsed("hands")?,
            weapon_type: args.parsed::<WeaponType>("weapon type")?,
            material: args.parsed::<WeaponMaterial>("material")?,
            damage: args.parsed("damage")?,
        }),
        ItemCategory::Armor => ItemKind::Armor(ArmorStats {
            slot: args.parsed::<ArmorSlot>("slot")?,
            kind: args.parsed::<ArmorKind>("armor kind")?,
            material: args.parsed::<ArmorMaterial>("material")?,
            armor: args.parsed("armor")?,
        }),
    };

    Ok(ItemDraft {
        name,
        description,
        price,
        rarity,
        kind,
    })
}

/// Accept a bare id or a chat mention such as `<@123>`, `<@!123>` or `@123`.
fn parse_user(token: &str) -> UserId {
    let id = token
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.trim_start_matches('!'))
        .or_else(|| token.strip_prefix('@'))
        .unwrap_or(token);
    UserId::new(id)
}

/// Split a line into arguments, honoring double quotes.
fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(ParseError::UnclosedQuote);
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Cursor over the arguments of one command.
struct Args {
    tokens: std::vec::IntoIter<String>,
    peeked: Option<String>,
}

impl Args {
    fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
        }
    }

    fn next(&mut self) -> Option<String> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek(&mut self) -> Option<&String> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    fn required(&mut self, name: &'static str) -> Result<String, ParseError> {
        self.next().ok_or(ParseError::MissingArgument(name))
    }

    /// Everything left, joined by single spaces.
    fn rest(&mut self, name: &'static str) -> Result<String, ParseError> {
        let mut words = vec![self.required(name)?];
        words.extend(std::iter::from_fn(|| self.next()));
        Ok(words.join(" "))
    }

    fn parsed<T: FromStr>(&mut self, name: &'static str) -> Result<T, ParseError> {
        let value = self.required(name)?;
        value
            .parse()
            .map_err(|_| ParseError::InvalidArgument { name, value })
    }

    fn optional<T: FromStr>(&mut self, name: &'static str) -> Result<Option<T>, ParseError> {
        match self.next() {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ParseError::InvalidArgument { name, value }),
            None => Ok(None),
        }
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.next() {
            Some(extra) => Err(ParseError::UnexpectedArgument(extra)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"item new item "Sweet roll" "Tasty, sticky." 2 common"#).unwrap(),
            vec!["item", "new", "item", "Sweet roll", "Tasty, sticky.", "2", "common"]
        );
        assert_eq!(tokenize(r#"equip """#).unwrap(), vec!["equip", ""]);
        assert_eq!(tokenize("  char   new ").unwrap(), vec!["char", "new"]);
        assert_eq!(tokenize(r#"equip "Iron"#), Err(ParseError::UnclosedQuote));
    }

    #[test]
    fn test_char_subcommands() {
        assert_eq!(Command::parse("char").unwrap(), Command::CharInfo { user: None });
        assert_eq!(Command::parse("CHAR NEW").unwrap(), Command::CharNew);
        assert_eq!(Command::parse("char cancel").unwrap(), Command::CharCancel);
        assert_eq!(Command::parse("char del").unwrap(), Command::CharDelete);
        assert_eq!(
            Command::parse("char <@!1234>").unwrap(),
            Command::CharInfo {
                user: Some(UserId::new("1234"))
            }
        );
    }

    #[test]
    fn test_inventory_alias() {
        assert_eq!(
            Command::parse("inv @77").unwrap(),
            Command::Inventory {
                user: Some(UserId::new("77"))
            }
        );
    }

    #[test]
    fn test_item_new_weapon() {
        let command = Command::parse(
            r#"item new weapon "Steel Sword" "A good blade." 45 rare melee 1 sword steel 8"#,
        )
        .unwrap();
        let Command::ItemNew(draft) = command else {
            panic!("expected item new, got {command:?}");
        };
        assert_eq!(draft.name, "Steel Sword");
        assert_eq!(draft.rarity, Rarity::Rare);
        assert_eq!(
            draft.kind,
            ItemKind::Weapon(WeaponStats {
                attack_type: AttackType::Melee,
                hands: 1,
                weapon_type: WeaponType::Sword,
                material: WeaponMaterial::Steel,
                damage: 8,
            })
        );
    }

    #[test]
    fn test_item_new_armor_missing_extra() {
        let err = Command::parse(r#"item new armor "Hide Boots" "Soft." 10 common boots light leather"#)
            .unwrap_err();
        assert_eq!(err, ParseError::MissingArgument("armor"));
    }

    #[test]
    fn test_item_new_plain_rejects_extra() {
        let err = Command::parse(r#"item new item Bread "Fresh." 1 common melee"#).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedArgument("melee".to_string()));
    }

    #[test]
    fn test_item_add_optional_args() {
        assert_eq!(
            Command::parse(r#"item add 42 3 "Iron Sword" Eorlund 2"#).unwrap(),
            Command::ItemAdd {
                user: UserId::new("42"),
                count: 3,
                item: "Iron Sword".to_string(),
                maker: Some("Eorlund".to_string()),
                temper: Some(2),
            }
        );
        assert_eq!(
            Command::parse("item remove 42 1 Sweetroll").unwrap(),
            Command::ItemRemove {
                user: UserId::new("42"),
                count: 1,
                item: "Sweetroll".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_numbers() {
        assert_eq!(
            Command::parse("item add 42 -1 Sweetroll").unwrap_err(),
            ParseError::InvalidArgument {
                name: "count",
                value: "-1".to_string()
            }
        );
    }

    #[test]
    fn test_unquoted_names_take_the_rest() {
        assert_eq!(
            Command::parse("equip Iron  Sword").unwrap(),
            Command::Equip {
                item: "Iron Sword".to_string()
            }
        );
        assert_eq!(
            Command::parse("item soul gem").unwrap(),
            Command::ItemInfo {
                name: "soul gem".to_string()
            }
        );
        assert_eq!(
            Command::parse("equip").unwrap_err(),
            ParseError::MissingArgument("item")
        );
    }

    #[test]
    fn test_unequip_slot() {
        assert_eq!(
            Command::parse("unequip right_hand").unwrap(),
            Command::Unequip {
                slot: EquipmentSlot::RightHand
            }
        );
        assert_eq!(
            Command::parse(r#"unequip "left hand""#).unwrap(),
            Command::Unequip {
                slot: EquipmentSlot::LeftHand
            }
        );
        assert!(Command::parse("unequip tail").is_err());
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(Command::parse("   ").unwrap_err(), ParseError::Empty);
        assert_eq!(
            Command::parse("dance").unwrap_err(),
            ParseError::UnknownCommand("dance".to_string())
        );
        assert!(Command::is_admin(&Command::parse("item remove 1 1 x").unwrap()));
        assert!(!Command::CharNew.is_admin());
    }
}
