//! Race templates for character creation.
//!
//! Base vitals, resistances, skills and unarmed damage for each playable
//! race. A new character starts with a copy of its race template.

use crate::world::{Attributes, Race, Vital};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Starting values for one vital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalTemplate {
    pub max: f64,
    #[serde(default)]
    pub buff: f64,
    /// Percent of `max` restored per second.
    pub regen: f64,
}

impl VitalTemplate {
    pub const fn new(max: f64, regen: f64) -> Self {
        Self {
            max,
            buff: 0.0,
            regen,
        }
    }

    fn vital(&self) -> Vital {
        Vital::new(self.max, self.buff, self.regen)
    }
}

/// Race-specific starting attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceTemplate {
    pub health: VitalTemplate,
    pub stamina: VitalTemplate,
    pub magicka: VitalTemplate,
    #[serde(default)]
    pub resists: BTreeMap<String, f64>,
    #[serde(default)]
    pub skills: BTreeMap<String, f64>,
    pub unarmed_damage: u32,
}

impl RaceTemplate {
    /// Fresh attributes with every vital at its maximum.
    pub fn attributes(&self) -> Attributes {
        Attributes {
            health: self.health.vital(),
            stamina: self.stamina.vital(),
            magicka: self.magicka.vital(),
            resists: self.resists.clone(),
            skills: self.skills.clone(),
            armor_rating: 0,
            unarmed_damage: self.unarmed_damage,
        }
    }
}

/// Resistances every race has, at zero unless the race says otherwise.
pub const RESISTS: &[&str] = &["magic", "fire", "frost", "shock", "poison", "disease"];

/// Skills every race has.
pub const SKILLS: &[&str] = &[
    "alchemy",
    "alteration",
    "archery",
    "block",
    "conjuration",
    "destruction",
    "enchanting",
    "heavy_armor",
    "illusion",
    "light_armor",
    "lockpicking",
    "one_handed",
    "pickpocket",
    "restoration",
    "smithing",
    "sneak",
    "speech",
    "two_handed",
];

const BASE_SKILL: f64 = 15.0;
const MAJOR_BONUS: f64 = 10.0;
const MINOR_BONUS: f64 = 5.0;

const HEALTH: VitalTemplate = VitalTemplate::new(100.0, 0.7);
const STAMINA: VitalTemplate = VitalTemplate::new(100.0, 1.6);
const MAGICKA: VitalTemplate = VitalTemplate::new(100.0, 3.0);

fn resists(overrides: &[(&str, f64)]) -> BTreeMap<String, f64> {
    let mut map: BTreeMap<String, f64> = RESISTS.iter().map(|r| (r.to_string(), 0.0)).collect();
    for (name, value) in overrides {
        map.insert(name.to_string(), *value);
    }
    map
}

fn skills(major: &str, minor: &[&str]) -> BTreeMap<String, f64> {
    let mut map: BTreeMap<String, f64> = SKILLS.iter().map(|s| (s.to_string(), BASE_SKILL)).collect();
    if let Some(value) = map.get_mut(major) {
        *value += MAJOR_BONUS;
    }
    for name in minor {
        if let Some(value) = map.get_mut(*name) {
            *value += MINOR_BONUS;
        }
    }
    map
}

impl Race {
    /// Built-in starting attributes for this race.
    pub fn template(&self) -> RaceTemplate {
        match self {
            Race::Argonian => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[("disease", 50.0), ("poison", 50.0)]),
                skills: skills(
                    "lockpicking",
                    &["alteration", "light_armor", "pickpocket", "restoration", "sneak"],
                ),
                unarmed_damage: 4,
            },
            Race::Breton => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: VitalTemplate::new(150.0, 3.0),
                resists: resists(&[("magic", 25.0)]),
                skills: skills(
                    "conjuration",
                    &["alchemy", "alteration", "illusion", "restoration", "speech"],
                ),
                unarmed_damage: 4,
            },
            Race::Dunmer => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[("fire", 50.0)]),
                skills: skills(
                    "destruction",
                    &["alchemy", "alteration", "illusion", "light_armor", "sneak"],
                ),
                unarmed_damage: 4,
            },
            Race::Altmer => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: VitalTemplate::new(150.0, 3.0),
                resists: resists(&[]),
                skills: skills(
                    "illusion",
                    &["alteration", "conjuration", "destruction", "enchanting", "restoration"],
                ),
                unarmed_damage: 4,
            },
            Race::Imperial => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[]),
                skills: skills(
                    "restoration",
                    &["block", "destruction", "enchanting", "heavy_armor", "one_handed"],
                ),
                unarmed_damage: 4,
            },
            Race::Khajiit => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[]),
                skills: skills(
                    "sneak",
                    &["alchemy", "archery", "lockpicking", "one_handed", "pickpocket"],
                ),
                unarmed_damage: 19,
            },
            Race::Nord => RaceTemplate {
                health: HEALTH,
                stamina: VitalTemplate::new(110.0, 1.6),
                magicka: MAGICKA,
                resists: resists(&[("frost", 50.0)]),
                skills: skills(
                    "two_handed",
                    &["block", "light_armor", "one_handed", "smithing", "speech"],
                ),
                unarmed_damage: 4,
            },
            Race::Orc => RaceTemplate {
                health: VitalTemplate::new(110.0, 0.7),
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[]),
                skills: skills(
                    "heavy_armor",
                    &["block", "enchanting", "one_handed", "smithing", "two_handed"],
                ),
                unarmed_damage: 4,
            },
            Race::Redguard => RaceTemplate {
                health: HEALTH,
                stamina: VitalTemplate::new(110.0, 1.6),
                magicka: MAGICKA,
                resists: resists(&[("poison", 50.0)]),
                skills: skills(
                    "one_handed",
                    &["alteration", "archery", "block", "destruction", "smithing"],
                ),
                unarmed_damage: 4,
            },
            Race::Bosmer => RaceTemplate {
                health: HEALTH,
                stamina: STAMINA,
                magicka: MAGICKA,
                resists: resists(&[("disease", 50.0), ("poison", 50.0)]),
                skills: skills(
                    "archery",
                    &["alchemy", "light_armor", "lockpicking", "pickpocket", "sneak"],
                ),
                unarmed_damage: 4,
            },
        }
    }
}
