//! Registration wizard.
//!
//! A pure state machine: `Name -> Race -> Sex -> Description -> done`, with
//! cancellation reachable from every step. It does no I/O; the registration
//! session feeds it replies and renders what it returns.

use crate::config::GameConfig;
use crate::world::{
    Race, Sex, UserId, DESCRIPTION_MAX_LEN, DESCRIPTION_MIN_LEN, NAME_MAX_LEN, NAME_MIN_LEN,
};
use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

lazy_static::lazy_static! {
    static ref NAME_RE: Regex =
        Regex::new(r"^[a-zA-Zа-яА-ЯёЁ][a-zA-Zа-яА-ЯёЁ '\-]*$").expect("valid name regex");
    static ref DESCRIPTION_RE: Regex =
        Regex::new(r#"^[a-zA-Zа-яА-ЯёЁ\d\s!.,%*'";:()\[\]<>\-«»—?]+$"#).expect("valid description regex");
}

/// Most spaces a name may contain.
pub const NAME_MAX_SPACES: usize = 2;

/// Why an answer was not accepted. The wizard stays on the same step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAnswer {
    #[error("The name must be {NAME_MIN_LEN} to {NAME_MAX_LEN} characters long.")]
    NameLength,

    #[error("The name may only contain Latin or Cyrillic letters, spaces, apostrophes and hyphens, and must start with a letter.")]
    NameCharacters,

    #[error("The name may contain at most {NAME_MAX_SPACES} spaces.")]
    NameSpaces,

    #[error("Unknown race.")]
    UnknownRace,

    #[error("Pick one of the two options.")]
    UnknownSex,

    #[error("The description must be {DESCRIPTION_MIN_LEN} to {DESCRIPTION_MAX_LEN} characters long.")]
    DescriptionLength,

    #[error("The description contains characters that are not allowed.")]
    DescriptionCharacters,
}

/// Check a character name. Returns the trimmed name.
pub fn validate_name(input: &str) -> Result<String, InvalidAnswer> {
    let name = input.trim();
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(InvalidAnswer::NameLength);
    }
    if !NAME_RE.is_match(name) {
        return Err(InvalidAnswer::NameCharacters);
    }
    if name.matches(' ').count() > NAME_MAX_SPACES {
        return Err(InvalidAnswer::NameSpaces);
    }
    Ok(name.to_string())
}

/// Check a character description.
pub fn validate_description(input: &str) -> Result<String, InvalidAnswer> {
    let len = input.chars().count();
    if !(DESCRIPTION_MIN_LEN..=DESCRIPTION_MAX_LEN).contains(&len) {
        return Err(InvalidAnswer::DescriptionLength);
    }
    if !DESCRIPTION_RE.is_match(input) {
        return Err(InvalidAnswer::DescriptionCharacters);
    }
    Ok(input.to_string())
}

// ============================================================================
// Steps
// ============================================================================

/// Registration steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    Name,
    Race,
    Sex,
    Description,
}

impl RegistrationStep {
    pub fn next(&self) -> Option<RegistrationStep> {
        match self {
            RegistrationStep::Name => Some(RegistrationStep::Race),
            RegistrationStep::Race => Some(RegistrationStep::Sex),
            RegistrationStep::Sex => Some(RegistrationStep::Description),
            RegistrationStep::Description => None,
        }
    }

    /// Whether this step is answered with a two-option choice.
    pub fn is_choice(&self) -> bool {
        matches!(self, RegistrationStep::Sex)
    }

    /// How long to wait for an answer.
    pub fn timeout(&self, config: &GameConfig) -> Duration {
        match self {
            RegistrationStep::Description => config.registration.description_timeout(),
            _ => config.registration.short_timeout(),
        }
    }

    /// Label of the form field this step fills in.
    pub fn field(&self) -> &'static str {
        match self {
            RegistrationStep::Name => "Name",
            RegistrationStep::Race => "Race",
            RegistrationStep::Sex => "Sex",
            RegistrationStep::Description => "Description",
        }
    }

    /// Prompt shown as the form description.
    pub fn prompt(&self, config: &GameConfig) -> String {
        match self {
            RegistrationStep::Name => format!(
                "**Choose your character's name**\n\n\
                 The name must be **{NAME_MIN_LEN} to {NAME_MAX_LEN} characters** long \
                 and use **Latin** or **Cyrillic** letters."
            ),
            RegistrationStep::Race => format!(
                "**Choose your character's race**\n\n**Options:** {}.",
                config.race_names().join(", ")
            ),
            RegistrationStep::Sex => "**Choose your character's sex**".to_string(),
            RegistrationStep::Description => format!(
                "**Describe your character**\n\n\
                 The description must be **{DESCRIPTION_MIN_LEN} to {DESCRIPTION_MAX_LEN} characters** long."
            ),
        }
    }
}

// ============================================================================
// Wizard
// ============================================================================

/// One event fed to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
    Text(String),
    Choice(Sex),
    Timeout,
    /// The user asked to cancel from outside the dialogue.
    Cancel,
}

/// Why registration ended without a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Keyword,
    Timeout,
    Forced,
}

/// Result of feeding one input to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The answer was recorded. `next` is `None` once every step is done.
    Accepted {
        field: &'static str,
        value: String,
        next: Option<RegistrationStep>,
    },
    Rejected(InvalidAnswer),
    Cancelled(CancelReason),
}

/// Everything the wizard collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterIntent {
    pub owner: UserId,
    pub name: String,
    pub race: Race,
    pub sex: Sex,
    pub description: String,
}

/// Registration state for one user.
#[derive(Debug, Clone)]
pub struct RegistrationWizard {
    owner: UserId,
    /// `None` once finished or cancelled.
    step: Option<RegistrationStep>,
    name: Option<String>,
    race: Option<Race>,
    sex: Option<Sex>,
    description: Option<String>,
}

impl RegistrationWizard {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            step: Some(RegistrationStep::Name),
            name: None,
            race: None,
            sex: None,
            description: None,
        }
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// The step waiting for an answer, if any.
    pub fn step(&self) -> Option<RegistrationStep> {
        self.step
    }

    /// Feed one input. Inputs after the wizard ended are cancellations.
    pub fn apply(&mut self, config: &GameConfig, input: WizardInput) -> Transition {
        let Some(step) = self.step else {
            return Transition::Cancelled(CancelReason::Forced);
        };

        let answer = match input {
            WizardInput::Timeout => return self.cancel(CancelReason::Timeout),
            WizardInput::Cancel => return self.cancel(CancelReason::Forced),
            WizardInput::Text(text) if config.registration.is_cancel(&text) => {
                return self.cancel(CancelReason::Keyword)
            }
            answer => answer,
        };

        let value = match self.record(config, step, answer) {
            Ok(value) => value,
            Err(invalid) => {
                debug!(owner = %self.owner, ?step, %invalid, "answer rejected");
                return Transition::Rejected(invalid);
            }
        };

        self.step = step.next();
        debug!(owner = %self.owner, ?step, next = ?self.step, "answer accepted");
        Transition::Accepted {
            field: step.field(),
            value,
            next: self.step,
        }
    }

    /// Validate and store an answer. Returns the value to display.
    fn record(
        &mut self,
        config: &GameConfig,
        step: RegistrationStep,
        answer: WizardInput,
    ) -> Result<String, InvalidAnswer> {
        match (step, answer) {
            (RegistrationStep::Name, WizardInput::Text(text)) => {
                let name = validate_name(&text)?;
                self.name = Some(name.clone());
                Ok(name)
            }
            (RegistrationStep::Race, WizardInput::Text(text)) => {
                let race = config.find_race(&text).ok_or(InvalidAnswer::UnknownRace)?;
                self.race = Some(race);
                Ok(config.race_name(race))
            }
            (RegistrationStep::Sex, WizardInput::Choice(sex)) => {
                self.sex = Some(sex);
                Ok(config.sex_name(sex))
            }
            (RegistrationStep::Sex, WizardInput::Text(text)) => {
                let sex = parse_sex(config, &text).ok_or(InvalidAnswer::UnknownSex)?;
                self.sex = Some(sex);
                Ok(config.sex_name(sex))
            }
            (RegistrationStep::Description, WizardInput::Text(text)) => {
                let description = validate_description(&text)?;
                self.description = Some(description.clone());
                Ok(description)
            }
            (RegistrationStep::Name, _) => Err(InvalidAnswer::NameCharacters),
            (RegistrationStep::Race, _) => Err(InvalidAnswer::UnknownRace),
            (RegistrationStep::Description, _) => Err(InvalidAnswer::DescriptionCharacters),
            (RegistrationStep::Sex, _) => Err(InvalidAnswer::UnknownSex),
        }
    }

    fn cancel(&mut self, reason: CancelReason) -> Transition {
        debug!(owner = %self.owner, step = ?self.step, ?reason, "registration cancelled");
        self.step = None;
        Transition::Cancelled(reason)
    }

    pub fn is_complete(&self) -> bool {
        self.step.is_none()
            && self.name.is_some()
            && self.race.is_some()
            && self.sex.is_some()
            && self.description.is_some()
    }

    /// The collected answers, once every step is done.
    pub fn finish(self) -> Option<CharacterIntent> {
        if !self.is_complete() {
            return None;
        }
        Some(CharacterIntent {
            owner: self.owner,
            name: self.name?,
            race: self.race?,
            sex: self.sex?,
            description: self.description?,
        })
    }
}

/// Match typed sex input: a choice label, the configured name or the key.
fn parse_sex(config: &GameConfig, input: &str) -> Option<Sex> {
    let needle = input.trim().to_lowercase();
    let by_choice = config
        .registration
        .sex_choices
        .iter()
        .position(|choice| choice.to_lowercase() == needle)
        .and_then(|index| Sex::all().get(index).copied());
    by_choice.or_else(|| {
        Sex::all()
            .iter()
            .copied()
            .find(|sex| config.sex_name(*sex).to_lowercase() == needle || sex.key() == needle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str =
        "Born in Windhelm, raised on stories of the old wars; hates the cold, loves mead.";

    fn text(s: &str) -> WizardInput {
        WizardInput::Text(s.to_string())
    }

    #[test]
    fn test_name_length_bounds() {
        assert_eq!(validate_name("Ab"), Err(InvalidAnswer::NameLength));
        assert_eq!(validate_name("Abc"), Ok("Abc".to_string()));
        assert_eq!(validate_name(&"a".repeat(25)).map(|n| n.len()), Ok(25));
        assert_eq!(validate_name(&"a".repeat(26)), Err(InvalidAnswer::NameLength));
    }

    #[test]
    fn test_name_spaces() {
        assert!(validate_name("Jon of the North").is_err());
        assert_eq!(
            validate_name("Jon of the North"),
            Err(InvalidAnswer::NameSpaces)
        );
        assert_eq!(validate_name("Jon the Bold"), Ok("Jon the Bold".to_string()));
    }

    #[test]
    fn test_name_characters() {
        assert_eq!(validate_name("Ри'Саад"), Ok("Ри'Саад".to_string()));
        assert_eq!(validate_name("Anne-Marie"), Ok("Anne-Marie".to_string()));
        assert_eq!(validate_name("-Anne"), Err(InvalidAnswer::NameCharacters));
        assert_eq!(validate_name("R2D2"), Err(InvalidAnswer::NameCharacters));
        assert_eq!(validate_name("  Lydia  "), Ok("Lydia".to_string()));
    }

    #[test]
    fn test_description_bounds() {
        assert_eq!(
            validate_description(&"a".repeat(49)),
            Err(InvalidAnswer::DescriptionLength)
        );
        assert!(validate_description(&"a".repeat(50)).is_ok());
        assert!(validate_description(&"a".repeat(2000)).is_ok());
        assert_eq!(
            validate_description(&"a".repeat(2001)),
            Err(InvalidAnswer::DescriptionLength)
        );
        assert!(validate_description(DESCRIPTION).is_ok());
        assert_eq!(
            validate_description(&format!("{DESCRIPTION} #hashtag")),
            Err(InvalidAnswer::DescriptionCharacters)
        );
    }

    #[test]
    fn test_full_run() {
        let config = GameConfig::default();
        let mut wizard = RegistrationWizard::new(UserId::new("7"));

        assert!(matches!(
            wizard.apply(&config, text("Ulfric")),
            Transition::Accepted { next: Some(RegistrationStep::Race), .. }
        ));
        assert_eq!(
            wizard.apply(&config, text("nord")),
            Transition::Accepted {
                field: "Race",
                value: "Nord".to_string(),
                next: Some(RegistrationStep::Sex),
            }
        );
        assert!(matches!(
            wizard.apply(&config, WizardInput::Choice(Sex::Male)),
            Transition::Accepted { next: Some(RegistrationStep::Description), .. }
        ));
        assert!(matches!(
            wizard.apply(&config, text(DESCRIPTION)),
            Transition::Accepted { next: None, .. }
        ));

        assert!(wizard.is_complete());
        let intent = wizard.finish().unwrap();
        assert_eq!(intent.name, "Ulfric");
        assert_eq!(intent.race, Race::Nord);
        assert_eq!(intent.sex, Sex::Male);
    }

    #[test]
    fn test_invalid_answer_stays_on_step() {
        let config = GameConfig::default();
        let mut wizard = RegistrationWizard::new(UserId::new("7"));

        assert_eq!(
            wizard.apply(&config, text("Al")),
            Transition::Rejected(InvalidAnswer::NameLength)
        );
        assert_eq!(wizard.step(), Some(RegistrationStep::Name));

        wizard.apply(&config, text("Aela"));
        assert_eq!(
            wizard.apply(&config, text("Dwemer")),
            Transition::Rejected(InvalidAnswer::UnknownRace)
        );
        assert_eq!(wizard.step(), Some(RegistrationStep::Race));
    }

    #[test]
    fn test_cancel_from_every_step() {
        let config = GameConfig::default();
        let answers = [text("Aela"), text("nord"), WizardInput::Choice(Sex::Female)];

        for depth in 0..=answers.len() {
            let mut wizard = RegistrationWizard::new(UserId::new("7"));
            for answer in answers.iter().take(depth) {
                wizard.apply(&config, answer.clone());
            }
            assert_eq!(
                wizard.apply(&config, text("Cancel")),
                Transition::Cancelled(CancelReason::Keyword)
            );
            assert_eq!(wizard.step(), None);
            assert!(!wizard.is_complete());
            assert!(wizard.finish().is_none());
        }
    }

    #[test]
    fn test_timeout_and_forced_cancel() {
        let config = GameConfig::default();

        let mut wizard = RegistrationWizard::new(UserId::new("7"));
        assert_eq!(
            wizard.apply(&config, WizardInput::Timeout),
            Transition::Cancelled(CancelReason::Timeout)
        );

        let mut wizard = RegistrationWizard::new(UserId::new("7"));
        wizard.apply(&config, text("Aela"));
        assert_eq!(
            wizard.apply(&config, WizardInput::Cancel),
            Transition::Cancelled(CancelReason::Forced)
        );
    }

    #[test]
    fn test_sex_typed_answer() {
        let config = GameConfig::default();
        assert_eq!(parse_sex(&config, "female"), Some(Sex::Female));
        assert_eq!(parse_sex(&config, "👨"), Some(Sex::Male));
        assert_eq!(parse_sex(&config, "other"), None);
    }

    #[test]
    fn test_description_timeout_is_longer() {
        let config = GameConfig::default();
        assert_eq!(RegistrationStep::Name.timeout(&config), Duration::from_secs(60));
        assert_eq!(
            RegistrationStep::Description.timeout(&config),
            Duration::from_secs(600)
        );
    }
}
