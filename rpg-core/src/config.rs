//! Game configuration.
//!
//! Everything here has a built-in default, so a config file only needs the
//! keys it wants to change.

use crate::items::Rarity;
use crate::races::RaceTemplate;
use crate::world::{Race, Sex, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Errors from loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Bot identity shown on forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub name: String,
    /// Prefix that marks a chat line as a command.
    pub prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Tamriel".to_string(),
            prefix: "!".to_string(),
        }
    }
}

/// Registration and deletion dialogue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Typing this (any case) cancels registration.
    pub cancel_keyword: String,
    /// Name, race and sex prompts.
    pub short_timeout_secs: u64,
    pub description_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    /// Replies accepted as "yes" when confirming deletion.
    pub confirm_words: Vec<String>,
    /// Labels of the two sex choice buttons, male first.
    pub sex_choices: [String; 2],
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            cancel_keyword: "cancel".to_string(),
            short_timeout_secs: 60,
            description_timeout_secs: 600,
            delete_timeout_secs: 30,
            confirm_words: ["yes", "y", "да", "д"].iter().map(|w| w.to_string()).collect(),
            sex_choices: ["👨".to_string(), "👩".to_string()],
        }
    }
}

impl RegistrationConfig {
    pub fn short_timeout(&self) -> Duration {
        Duration::from_secs(self.short_timeout_secs)
    }

    pub fn description_timeout(&self) -> Duration {
        Duration::from_secs(self.description_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn is_cancel(&self, reply: &str) -> bool {
        reply.trim().to_lowercase() == self.cancel_keyword.to_lowercase()
    }

    pub fn is_confirmation(&self, reply: &str) -> bool {
        let reply = reply.trim().to_lowercase();
        self.confirm_words.iter().any(|w| w.to_lowercase() == reply)
    }
}

/// One entry of the race table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Display name, also accepted as wizard input.
    pub name: String,
    #[serde(flatten)]
    pub template: RaceTemplate,
}

/// How a rarity is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityConfig {
    pub name: String,
    /// RGB color for item cards.
    pub color: u32,
}

/// Top-level game configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub bot: BotConfig,
    pub registration: RegistrationConfig,
    pub races: BTreeMap<Race, RaceConfig>,
    pub sexes: BTreeMap<Sex, String>,
    pub rarities: BTreeMap<Rarity, RarityConfig>,
    /// Seconds between regeneration ticks.
    pub regen_interval_secs: u64,
    /// How often a character update is retried after a version conflict.
    pub max_update_retries: u32,
    /// Write the starter items into an empty catalog on start.
    pub seed_items: bool,
    /// Users allowed to create, give and take items. Empty means everyone.
    pub admins: Vec<UserId>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let races = Race::all()
            .iter()
            .map(|race| {
                (
                    *race,
                    RaceConfig {
                        name: race.label().to_string(),
                        template: race.template(),
                    },
                )
            })
            .collect();
        let sexes = Sex::all()
            .iter()
            .map(|sex| (*sex, sex.label().to_string()))
            .collect();
        let rarities = Rarity::all()
            .iter()
            .map(|rarity| {
                let color = match rarity {
                    Rarity::Common => 0x9B9B9B,
                    Rarity::Rare => 0x4A90E2,
                    Rarity::Epic => 0x9013FE,
                    Rarity::Legendary => 0xF5A623,
                };
                (
                    *rarity,
                    RarityConfig {
                        name: rarity.label().to_string(),
                        color,
                    },
                )
            })
            .collect();

        Self {
            bot: BotConfig::default(),
            registration: RegistrationConfig::default(),
            races,
            sexes,
            rarities,
            regen_interval_secs: 5,
            max_update_retries: 5,
            seed_items: true,
            admins: Vec::new(),
        }
    }
}

impl GameConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the game cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.races.is_empty() {
            return Err(ConfigError::Invalid("at least one race is required".to_string()));
        }
        if self.registration.cancel_keyword.trim().is_empty() {
            return Err(ConfigError::Invalid("cancel_keyword is empty".to_string()));
        }
        if self.registration.sex_choices[0] == self.registration.sex_choices[1] {
            return Err(ConfigError::Invalid("sex choices must differ".to_string()));
        }
        if self.regen_interval_secs == 0 {
            return Err(ConfigError::Invalid("regen_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.is_empty() || self.admins.contains(user)
    }

    pub fn regen_interval(&self) -> Duration {
        Duration::from_secs(self.regen_interval_secs)
    }

    /// Resolve wizard input to a race: a configured display name or a race
    /// key, ignoring case.
    pub fn find_race(&self, input: &str) -> Option<Race> {
        let needle = input.trim().to_lowercase();
        self.races
            .iter()
            .find(|(race, entry)| entry.name.to_lowercase() == needle || race.key() == needle)
            .map(|(race, _)| *race)
    }

    /// Display names of every configured race, in table order.
    pub fn race_names(&self) -> Vec<&str> {
        self.races.values().map(|entry| entry.name.as_str()).collect()
    }

    pub fn race_name(&self, race: Race) -> String {
        self.races
            .get(&race)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| race.label().to_string())
    }

    /// The configured template, falling back to the built-in one.
    pub fn race_template(&self, race: Race) -> RaceTemplate {
        self.races
            .get(&race)
            .map(|entry| entry.template.clone())
            .unwrap_or_else(|| race.template())
    }

    pub fn sex_name(&self, sex: Sex) -> String {
        self.sexes
            .get(&sex)
            .cloned()
            .unwrap_or_else(|| sex.label().to_string())
    }

    pub fn rarity_name(&self, rarity: Rarity) -> String {
        self.rarities
            .get(&rarity)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| rarity.label().to_string())
    }

    pub fn rarity_color(&self, rarity: Rarity) -> u32 {
        self.rarities.get(&rarity).map(|entry| entry.color).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_find_race_by_name_or_key() {
        let mut config = GameConfig::default();
        if let Some(entry) = config.races.get_mut(&Race::Dunmer) {
            entry.name = "Данмер".to_string();
        }

        assert_eq!(config.find_race("данмер"), Some(Race::Dunmer));
        assert_eq!(config.find_race("DUNMER"), Some(Race::Dunmer));
        assert_eq!(config.find_race(" argonian "), Some(Race::Argonian));
        assert_eq!(config.find_race("dwemer"), None);
    }

    #[test]
    fn test_keywords() {
        let reg = RegistrationConfig::default();
        assert!(reg.is_cancel("CANCEL"));
        assert!(!reg.is_cancel("cancelled"));
        assert!(reg.is_confirmation("Y"));
        assert!(reg.is_confirmation("да"));
        assert!(!reg.is_confirmation("no"));
    }

    #[test]
    fn test_admins() {
        let mut config = GameConfig::default();
        assert!(config.is_admin(&UserId::new("1")));

        config.admins.push(UserId::new("2"));
        assert!(!config.is_admin(&UserId::new("1")));
        assert!(config.is_admin(&UserId::new("2")));
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "bot": {{ "prefix": "?" }},
                "registration": {{ "short_timeout_secs": 10 }},
                "races": {{
                    "argonian": {{
                        "name": "Аргонианин",
                        "health": {{ "max": 120, "regen": 1.0 }},
                        "stamina": {{ "max": 100, "regen": 1.0 }},
                        "magicka": {{ "max": 80, "regen": 1.0 }},
                        "unarmed_damage": 5
                    }}
                }}
            }}"#
        )
        .unwrap();

        let config = GameConfig::load(file.path()).await.unwrap();
        assert_eq!(config.bot.prefix, "?");
        assert_eq!(config.bot.name, BotConfig::default().name);
        assert_eq!(config.registration.short_timeout(), Duration::from_secs(10));
        assert_eq!(config.registration.delete_timeout(), Duration::from_secs(30));
        assert_eq!(config.races.len(), 1);
        assert_eq!(config.find_race("аргонианин"), Some(Race::Argonian));
        assert_eq!(config.race_template(Race::Argonian).health.max, 120.0);
        // Races missing from the table still have a built-in template.
        assert_eq!(config.race_template(Race::Nord), Race::Nord.template());
    }

    #[tokio::test]
    async fn test_load_rejects_empty_cancel_keyword() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "registration": {{ "cancel_keyword": " " }} }}"#).unwrap();

        let err = GameConfig::load(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
