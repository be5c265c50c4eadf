use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::FieldError;

/// Timer length used when a questionnaire has a timer but no duration.
pub const DEFAULT_TIMER_MINUTES: i32 = 15;

pub const MIN_NAME_CHARS: usize = 3;
pub const MIN_PROMPT_CHARS: usize = 20;

const DEFAULT_GREETING: &str = "Hello! I'm your guide for this assessment. Shall we begin?";

/// A complete questionnaire definition as stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Questionnaire {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Opening prompt; `{user_name}` is substituted at start
    pub initial_prompt: String,
    pub persona_name: Option<String>,
    /// System instruction for the interviewing persona
    pub persona_prompt: String,
    pub secondary_persona_name: Option<String>,
    /// System instruction for the optional observer persona
    pub secondary_persona_prompt: Option<String>,
    /// Prompt for the final scoring pass
    pub analysis_prompt: String,
    pub welcome_message: Option<String>,
    pub has_timer: bool,
    /// Minutes; only set when `has_timer` is true
    pub timer_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Questionnaire {
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings::new(self.has_timer, self.timer_duration)
    }

    /// First message shown to the user: welcome message, else initial prompt,
    /// else a stock greeting. `{user_name}` is replaced in either source.
    pub fn opening_message(&self, username: Option<&str>) -> String {
        let template = [self.welcome_message.as_deref(), Some(self.initial_prompt.as_str())]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty());

        match template {
            Some(text) => text.replace("{user_name}", username.unwrap_or("there")),
            None => DEFAULT_GREETING.to_string(),
        }
    }
}

/// Row shape for `GET /admin/questionnaires`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionnaireSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimerSettings {
    pub has_timer: bool,
    /// Minutes
    pub timer_duration: i32,
}

impl TimerSettings {
    pub fn new(has_timer: bool, timer_duration: Option<i32>) -> Self {
        Self {
            has_timer,
            timer_duration: timer_duration.unwrap_or(DEFAULT_TIMER_MINUTES),
        }
    }
}

/// Create/update body for questionnaires.
///
/// `timer_duration` is kept loose so numeric strings from form posts are
/// accepted; [`QuestionnaireInput::validate`] coerces it.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct QuestionnaireInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub initial_prompt: String,
    #[serde(default)]
    pub persona_name: Option<String>,
    pub persona_prompt: String,
    #[serde(default)]
    pub secondary_persona_name: Option<String>,
    #[serde(default)]
    pub secondary_persona_prompt: Option<String>,
    pub analysis_prompt: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub has_timer: bool,
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub timer_duration: Option<serde_json::Value>,
}

/// Questionnaire input that passed validation, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidQuestionnaire {
    pub name: String,
    pub description: Option<String>,
    pub initial_prompt: String,
    pub persona_name: Option<String>,
    pub persona_prompt: String,
    pub secondary_persona_name: Option<String>,
    pub secondary_persona_prompt: Option<String>,
    pub analysis_prompt: String,
    pub welcome_message: Option<String>,
    pub has_timer: bool,
    pub timer_duration: Option<i32>,
}

impl QuestionnaireInput {
    /// Check every field and collect all failures. On success the timer
    /// duration is normalized: it survives only when `has_timer` is set.
    pub fn validate(self) -> Result<ValidQuestionnaire, Vec<FieldError>> {
        let mut errors = Vec::new();

        require_min_chars(&mut errors, "name", &self.name, MIN_NAME_CHARS);
        require_min_chars(&mut errors, "initial_prompt", &self.initial_prompt, MIN_PROMPT_CHARS);
        require_min_chars(&mut errors, "persona_prompt", &self.persona_prompt, MIN_PROMPT_CHARS);
        require_min_chars(&mut errors, "analysis_prompt", &self.analysis_prompt, MIN_PROMPT_CHARS);

        let timer_duration = match coerce_minutes(self.timer_duration.as_ref()) {
            Ok(minutes) => minutes,
            Err(message) => {
                errors.push(FieldError::new("timer_duration", message));
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidQuestionnaire {
            name: self.name,
            description: self.description,
            initial_prompt: self.initial_prompt,
            persona_name: self.persona_name,
            persona_prompt: self.persona_prompt,
            secondary_persona_name: self.secondary_persona_name,
            secondary_persona_prompt: self.secondary_persona_prompt,
            analysis_prompt: self.analysis_prompt,
            welcome_message: self.welcome_message,
            has_timer: self.has_timer,
            timer_duration: if self.has_timer { timer_duration } else { None },
        })
    }
}

fn require_min_chars(errors: &mut Vec<FieldError>, field: &str, value: &str, min: usize) {
    if value.chars().count() < min {
        errors.push(FieldError::new(
            field,
            format!("{field} must be at least {min} characters"),
        ));
    }
}

/// Accept a JSON number or numeric string; null, absent, and blank mean "no duration".
fn coerce_minutes(value: Option<&serde_json::Value>) -> Result<Option<i32>, String> {
    let number = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    let Some(number) = number else {
        return Err("timer_duration must be a number".to_string());
    };
    if number.fract() != 0.0 || number < 0.0 || number > f64::from(i32::MAX) {
        return Err("timer_duration must be a non-negative whole number of minutes".to_string());
    }
    Ok(Some(number as i32))
}
