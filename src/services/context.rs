use crate::models::UserPreference;

pub const DEFAULT_MAX_RECENT: usize = 5;

/// Renders the user's preferences and recent views as a bullet list for prompts
///
/// Returns an empty string when there is nothing to say about the user.
pub fn build_context(
    preferences: Option<&UserPreference>,
    recent_titles: &[String],
    max_recent: usize,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(prefs) = preferences {
        if !prefs.dietary_needs.is_empty() {
            lines.push(format!(
                "- Dietary Requirements: {}",
                prefs.dietary_needs.join(", ")
            ));
        }
        if !prefs.cuisine_preferences.is_empty() {
            lines.push(format!(
                "- Preferred Cuisines: {}",
                prefs.cuisine_preferences.join(", ")
            ));
        }
        if !prefs.disliked_ingredients.is_empty() {
            lines.push(format!(
                "- Ingredients to Avoid: {}",
                prefs.disliked_ingredients.join(", ")
            ));
        }
        lines.push(format!("- Cooking Skill Level: {}", prefs.cooking_skill_level));
        lines.push(format!(
            "- Preferred Cooking Time: {} minutes",
            prefs.preferred_cooking_time
        ));
    }

    let recent: Vec<&str> = recent_titles
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(max_recent)
        .collect();
    if !recent.is_empty() {
        lines.push(format!("- Recently Viewed Recipes: {}", recent.join(", ")));
    }

    if lines.is_empty() {
        return String::new();
    }

    format!("User Profile:\n{}\n", lines.join("\n"))
}
