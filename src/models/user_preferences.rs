use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::{AppError, AppResult};

pub const DEFAULT_COOKING_TIME: i32 = 30;
const MAX_COOKING_TIME: i32 = 24 * 60;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SkillLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            other => Err(AppError::InvalidPreference(format!(
                "cooking_skill_level must be beginner, intermediate or advanced (got '{}')",
                other
            ))),
        }
    }
}

/// A user's stated cooking preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    pub dietary_needs: Vec<String>,
    pub cuisine_preferences: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub cooking_skill_level: SkillLevel,
    /// Minutes
    pub preferred_cooking_time: i32,
}

impl Default for UserPreference {
    fn default() -> Self {
        Self {
            dietary_needs: Vec::new(),
            cuisine_preferences: Vec::new(),
            disliked_ingredients: Vec::new(),
            cooking_skill_level: SkillLevel::default(),
            preferred_cooking_time: DEFAULT_COOKING_TIME,
        }
    }
}

/// Partial preference write; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub dietary_needs: Option<Vec<String>>,
    pub cuisine_preferences: Option<Vec<String>>,
    pub disliked_ingredients: Option<Vec<String>>,
    pub cooking_skill_level: Option<String>,
    pub preferred_cooking_time: Option<i32>,
}

impl UserPreference {
    /// Applies a partial update, rejecting the whole update on any invalid field
    pub fn apply(&self, update: PreferenceUpdate) -> AppResult<Self> {
        let cooking_skill_level = match update.cooking_skill_level {
            Some(level) => level.parse()?,
            None => self.cooking_skill_level,
        };

        let preferred_cooking_time = match update.preferred_cooking_time {
            Some(minutes) if !(1..=MAX_COOKING_TIME).contains(&minutes) => {
                return Err(AppError::InvalidPreference(format!(
                    "preferred_cooking_time must be between 1 and {} minutes",
                    MAX_COOKING_TIME
                )));
            }
            Some(minutes) => minutes,
            None => self.preferred_cooking_time,
        };

        Ok(Self {
            dietary_needs: update
                .dietary_needs
                .map(normalize_list)
                .unwrap_or_else(|| self.dietary_needs.clone()),
            cuisine_preferences: update
                .cuisine_preferences
                .map(normalize_list)
                .unwrap_or_else(|| self.cuisine_preferences.clone()),
            disliked_ingredients: update
                .disliked_ingredients
                .map(normalize_list)
                .unwrap_or_else(|| self.disliked_ingredients.clone()),
            cooking_skill_level,
            preferred_cooking_time,
        })
    }
}

/// Trims entries, drops blanks and case-insensitive duplicates, keeps first-seen order
fn normalize_list(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .collect()
}
