use crate::models::RecipeRecord;

/// Flattens a recipe into the text the similarity index vectorises
///
/// Segments are description, ingredient names, category and tags, in that order.
/// Empty segments are skipped so no double spaces appear.
pub fn extract_features(recipe: &RecipeRecord) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(3 + recipe.ingredients.len() + recipe.tags.len());

    segments.push(recipe.description.trim());
    segments.extend(recipe.ingredients.iter().map(|i| i.trim()));
    segments.push(recipe.category.as_deref().unwrap_or_default().trim());
    segments.extend(recipe.tags.iter().map(|t| t.trim()));

    segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recipe() -> RecipeRecord {
        RecipeRecord {
            id: 1,
            title: "Jollof Rice".to_string(),
            description: "Smoky party rice".to_string(),
            category: Some("West African".to_string()),
            tags: vec!["rice".to_string(), "spicy".to_string()],
            ingredients: vec!["tomato".to_string(), "scotch bonnet".to_string()],
            preparation_time: 20,
            cooking_time: 45,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_segments_in_fixed_order() {
        assert_eq!(
            extract_features(&recipe()),
            "Smoky party rice tomato scotch bonnet West African rice spicy"
        );
    }

    #[test]
    fn test_missing_optional_fields_are_skipped() {
        let mut recipe = recipe();
        recipe.category = None;
        recipe.ingredients.clear();
        recipe.description = String::new();
        assert_eq!(extract_features(&recipe), "rice spicy");
    }

    #[test]
    fn test_empty_recipe_yields_empty_string() {
        let mut recipe = recipe();
        recipe.category = None;
        recipe.ingredients.clear();
        recipe.tags.clear();
        recipe.description = "   ".to_string();
        assert_eq!(extract_features(&recipe), "");
    }

    #[test]
    fn test_deterministic() {
        let recipe = recipe();
        assert_eq!(extract_features(&recipe), extract_features(&recipe));
    }
}
