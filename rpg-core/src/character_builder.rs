//! Character builder.
//!
//! Turns the answers collected by the registration wizard into a complete
//! character: attributes copied from the race template with every vital
//! full, an empty inventory and nothing equipped.

use crate::races::RaceTemplate;
use crate::world::{
    Character, Equipment, Inventory, Race, Sex, UserId, DESCRIPTION_MAX_LEN, DESCRIPTION_MIN_LEN,
    NAME_MAX_LEN, NAME_MIN_LEN,
};
use chrono::Utc;

/// Builder for new characters.
#[derive(Debug, Clone, Default)]
pub struct CharacterBuilder {
    owner: Option<UserId>,
    name: Option<String>,
    race: Option<Race>,
    sex: Option<Sex>,
    description: Option<String>,
    avatar: Option<String>,
    /// Overrides the race's built-in template.
    template: Option<RaceTemplate>,
}

/// Error from character building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    MissingOwner,
    MissingName,
    MissingRace,
    MissingSex,
    MissingDescription,
    NameLength(usize),
    DescriptionLength(usize),
}

impl std::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::MissingOwner => write!(f, "Character owner is required"),
            BuilderError::MissingName => write!(f, "Character name is required"),
            BuilderError::MissingRace => write!(f, "Race selection is required"),
            BuilderError::MissingSex => write!(f, "Sex selection is required"),
            BuilderError::MissingDescription => write!(f, "Character description is required"),
            BuilderError::NameLength(len) => write!(
                f,
                "Name must be {NAME_MIN_LEN} to {NAME_MAX_LEN} characters, got {len}"
            ),
            BuilderError::DescriptionLength(len) => write!(
                f,
                "Description must be {DESCRIPTION_MIN_LEN} to {DESCRIPTION_MAX_LEN} characters, got {len}"
            ),
        }
    }
}

impl std::error::Error for BuilderError {}

impl CharacterBuilder {
    /// Create a new character builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn race(mut self, race: Race) -> Self {
        self.race = Some(race);
        self
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar = Some(url.into());
        self
    }

    /// Use this template instead of the race's built-in one.
    pub fn template(mut self, template: RaceTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Build the character.
    pub fn build(self) -> Result<Character, BuilderError> {
        let owner = self.owner.ok_or(BuilderError::MissingOwner)?;
        let name = self.name.ok_or(BuilderError::MissingName)?;
        let race = self.race.ok_or(BuilderError::MissingRace)?;
        let sex = self.sex.ok_or(BuilderError::MissingSex)?;
        let description = self.description.ok_or(BuilderError::MissingDescription)?;

        let name = name.trim().to_string();
        let name_len = name.chars().count();
        if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&name_len) {
            return Err(BuilderError::NameLength(name_len));
        }
        let description_len = description.chars().count();
        if !(DESCRIPTION_MIN_LEN..=DESCRIPTION_MAX_LEN).contains(&description_len) {
            return Err(BuilderError::DescriptionLength(description_len));
        }

        let template = self.template.unwrap_or_else(|| race.template());
        let mut attributes = template.attributes();
        attributes.restore();

        Ok(Character {
            owner,
            name,
            race,
            sex,
            description,
            level: 1,
            experience: 0,
            experience_multiplier: 1.0,
            avatar: self.avatar,
            attributes,
            inventory: Inventory::new(),
            equipment: Equipment::new(),
            version: 0,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::races::VitalTemplate;

    const DESCRIPTION: &str =
        "A quiet lizard from Black Marsh who came north looking for work on the docks.";

    fn builder() -> CharacterBuilder {
        CharacterBuilder::new()
            .owner(UserId::new("42"))
            .name("Deeja")
            .race(Race::Argonian)
            .sex(Sex::Female)
            .description(DESCRIPTION)
    }

    #[test]
    fn test_build_argonian() {
        let character = builder().build().unwrap();

        assert_eq!(character.owner, UserId::new("42"));
        assert_eq!(character.level, 1);
        assert_eq!(character.experience, 0);
        assert_eq!(character.experience_multiplier, 1.0);
        assert_eq!(character.attributes.health.max, 100.0);
        assert_eq!(character.attributes.health.current, 100.0);
        assert_eq!(character.attributes.resists["poison"], 50.0);
        assert!(character.inventory.is_empty());
        assert_eq!(character.equipment.iter().count(), 0);
        assert_eq!(character.attributes.armor_rating, 0);
    }

    #[test]
    fn test_template_override() {
        let mut template = Race::Argonian.template();
        template.magicka = VitalTemplate::new(250.0, 2.0);

        let character = builder().template(template).build().unwrap();
        assert_eq!(character.attributes.magicka.current, 250.0);
    }

    #[test]
    fn test_missing_name_error() {
        let result = CharacterBuilder::new()
            .owner(UserId::new("42"))
            .race(Race::Nord)
            .sex(Sex::Male)
            .description(DESCRIPTION)
            .build();

        assert_eq!(result.unwrap_err(), BuilderError::MissingName);
    }

    #[test]
    fn test_name_is_trimmed_and_checked() {
        let character = builder().name("  Deeja  ").build().unwrap();
        assert_eq!(character.name, "Deeja");

        let result = builder().name("Ab").build();
        assert_eq!(result.unwrap_err(), BuilderError::NameLength(2));
    }

    #[test]
    fn test_short_description_error() {
        let result = builder().description("Too short.").build();
        assert!(matches!(result, Err(BuilderError::DescriptionLength(10))));
    }
}
