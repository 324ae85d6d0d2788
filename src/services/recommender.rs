/// Hybrid recommendation pipeline
///
/// Each request walks `Start -> ContextBuilt -> LlmAttempted -> {Resolved | FallbackAttempted} -> Done`.
/// The LLM is consulted first; whenever it fails or yields no usable recipe the
/// request falls back to content similarity or unseen recipes. Only AI-resolved
/// items are persisted, and only after the full response has been parsed.
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;

use crate::{
    db::{load_corpus, Store},
    error::{AppError, AppResult},
    models::{
        clamp_score, AiRecommendation, CandidateRecipe, IngredientMatch, IngredientSearchRecord,
        IngredientSearchResult, InteractionType, PreferenceUpdate, RecipeRecord, Recommendation,
        RecommendationOutcome, RecommendationSource, RecommendedRecipe, UserPreference,
    },
    services::{
        context::{build_context, DEFAULT_MAX_RECENT},
        llm::{ingredients::keyword_search, IngredientMatchClient, LlmOutcome, RecommendationClient},
        similarity::{top_rated, SimilarityIndex, SimilarityModel},
    },
};

/// Largest page of recommendations served per request
pub const MAX_RECOMMENDATIONS: usize = 20;
/// Largest `max_results` accepted for an ingredient search
pub const MAX_INGREDIENT_RESULTS: usize = 50;
/// Ingredient search results are capped at this many
pub const INGREDIENT_RESULT_CAP: usize = 20;
pub const RECOMMENDATION_HISTORY_LIMIT: usize = 20;
pub const SEARCH_HISTORY_LIMIT: usize = 10;

const FALLBACK_SCORE: f64 = 0.5;
const UNSEEN_REASON: &str = "Popular recipe recommendation";
const PROFILE_REASON: &str = "Similar to recipes you rated highly";
const TOP_RATED_REASON: &str = "Highly rated by the community";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Start,
    ContextBuilt,
    LlmAttempted,
    Resolved,
    FallbackAttempted,
    Done,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Start => "start",
            PipelineState::ContextBuilt => "context_built",
            PipelineState::LlmAttempted => "llm_attempted",
            PipelineState::Resolved => "resolved",
            PipelineState::FallbackAttempted => "fallback_attempted",
            PipelineState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

fn transition(user_id: i64, state: PipelineState) {
    tracing::debug!(user_id, state = %state, "Recommendation pipeline transition");
}

pub struct HybridRecommender {
    store: Arc<dyn Store>,
    similarity: SimilarityIndex,
    recommendation_client: RecommendationClient,
    ingredient_client: IngredientMatchClient,
    candidate_limit: usize,
}

impl HybridRecommender {
    pub fn new(
        store: Arc<dyn Store>,
        recommendation_client: RecommendationClient,
        ingredient_client: IngredientMatchClient,
        candidate_limit: usize,
    ) -> Self {
        Self {
            store,
            similarity: SimilarityIndex::new(),
            recommendation_client,
            ingredient_client,
            candidate_limit,
        }
    }

    /// AI recommendations for a user, or a heuristic list when the AI path yields nothing
    ///
    /// LLM failures never surface here; storage failures do.
    pub async fn recommend(&self, user_id: i64, limit: usize) -> AppResult<RecommendationOutcome> {
        let limit = limit.min(MAX_RECOMMENDATIONS);
        transition(user_id, PipelineState::Start);

        let preferences = self.store.get_preferences(user_id).await?;
        let recent_titles: Vec<String> = self
            .store
            .list_recent_views(user_id, DEFAULT_MAX_RECENT)
            .await?
            .into_iter()
            .map(|view| view.title)
            .collect();
        let user_context = build_context(preferences.as_ref(), &recent_titles, DEFAULT_MAX_RECENT);

        let corpus = load_corpus(self.store.as_ref()).await?;
        let candidates: Vec<CandidateRecipe> = corpus
            .iter()
            .take(self.candidate_limit)
            .map(CandidateRecipe::from)
            .collect();
        transition(user_id, PipelineState::ContextBuilt);

        let suggestions = if candidates.is_empty() || limit == 0 {
            Vec::new()
        } else {
            self.ask_llm(user_id, &user_context, &candidates, limit).await
        };
        transition(user_id, PipelineState::LlmAttempted);

        let resolved = resolve(&corpus, suggestions, limit);
        let outcome = if resolved.is_empty() {
            transition(user_id, PipelineState::FallbackAttempted);
            self.fallback(user_id, &corpus, limit).await?
        } else {
            self.persist(user_id, &resolved).await;
            transition(user_id, PipelineState::Resolved);
            RecommendationOutcome {
                recipes: resolved,
                source: RecommendationSource::Ai,
            }
        };

        transition(user_id, PipelineState::Done);
        tracing::info!(
            user_id,
            count = outcome.recipes.len(),
            source = ?outcome.source,
            ai_powered = outcome.ai_powered(),
            "Recommendations ready"
        );
        Ok(outcome)
    }

    async fn ask_llm(
        &self,
        user_id: i64,
        user_context: &str,
        candidates: &[CandidateRecipe],
        limit: usize,
    ) -> Vec<AiRecommendation> {
        match self
            .recommendation_client
            .get_recommendations(user_context, candidates, limit)
            .await
        {
            Ok(LlmOutcome::Parsed(items)) => items,
            Ok(LlmOutcome::Unparseable) => {
                tracing::warn!(user_id, "AI response unusable, falling back");
                Vec::new()
            }
            Err(e) if e.is_upstream() => {
                tracing::warn!(user_id, error = %e, "AI recommendations unavailable, falling back");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "AI recommendations failed, falling back");
                Vec::new()
            }
        }
    }

    async fn persist(&self, user_id: i64, resolved: &[RecommendedRecipe]) {
        for item in resolved {
            if let Err(e) = self
                .store
                .upsert(user_id, item.recipe.id, item.confidence_score, &item.reason)
                .await
            {
                tracing::error!(
                    user_id,
                    recipe_id = item.recipe.id,
                    error = %e,
                    "Failed to store recommendation"
                );
            }
        }
    }

    /// Similarity to liked recipes when the user has any, otherwise unseen recipes newest first
    async fn fallback(
        &self,
        user_id: i64,
        corpus: &[RecipeRecord],
        limit: usize,
    ) -> AppResult<RecommendationOutcome> {
        let ratings = self.store.user_ratings(user_id).await?;
        let interacted = self.store.interacted_recipe_ids(user_id).await?;

        let liked: Vec<i64> = ratings
            .iter()
            .filter(|r| r.is_qualifying())
            .map(|r| r.recipe_id)
            .collect();

        if !liked.is_empty() && !corpus.is_empty() {
            let model = self.similarity.model_for(corpus).await?;
            let mut exclude: HashSet<i64> = ratings.iter().map(|r| r.recipe_id).collect();
            exclude.extend(interacted.iter().copied());

            let ids = model.recommend_for_profile(&liked, &exclude, limit);
            if !ids.is_empty() {
                return Ok(RecommendationOutcome {
                    recipes: profile_items(&model, corpus, &liked, &ids),
                    source: RecommendationSource::ContentBased,
                });
            }
        }

        let recipes = corpus
            .iter()
            .filter(|r| !interacted.contains(&r.id))
            .take(limit)
            .map(|recipe| RecommendedRecipe {
                recipe: recipe.clone(),
                confidence_score: FALLBACK_SCORE,
                reason: UNSEEN_REASON.to_string(),
            })
            .collect();

        Ok(RecommendationOutcome {
            recipes,
            source: RecommendationSource::Unseen,
        })
    }

    /// Content-based recommendations without consulting the LLM
    ///
    /// Users with liked recipes get the profile ranking, everyone else the top-rated list.
    pub async fn recommend_content_based(
        &self,
        user_id: i64,
        limit: usize,
    ) -> AppResult<RecommendationOutcome> {
        let limit = limit.min(MAX_RECOMMENDATIONS);
        let corpus = load_corpus(self.store.as_ref()).await?;
        if corpus.is_empty() {
            return Ok(RecommendationOutcome {
                recipes: Vec::new(),
                source: RecommendationSource::TopRated,
            });
        }

        let ratings = self.store.user_ratings(user_id).await?;
        let mut exclude: HashSet<i64> = ratings.iter().map(|r| r.recipe_id).collect();
        exclude.extend(self.store.interacted_recipe_ids(user_id).await?);

        let liked: Vec<i64> = ratings
            .iter()
            .filter(|r| r.is_qualifying())
            .map(|r| r.recipe_id)
            .collect();

        if !liked.is_empty() {
            let model = self.similarity.model_for(&corpus).await?;
            let ids = model.recommend_for_profile(&liked, &exclude, limit);
            if !ids.is_empty() {
                return Ok(RecommendationOutcome {
                    recipes: profile_items(&model, &corpus, &liked, &ids),
                    source: RecommendationSource::ContentBased,
                });
            }
        }

        let means = self.store.mean_ratings().await?;
        let ids = top_rated(&corpus, &means, &exclude, limit);
        let by_id = index_corpus(&corpus);
        let recipes = ids
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|recipe| RecommendedRecipe {
                recipe: (*recipe).clone(),
                confidence_score: clamp_score(means.get(&recipe.id).copied().unwrap_or(0.0) / 5.0),
                reason: TOP_RATED_REASON.to_string(),
            })
            .collect();

        Ok(RecommendationOutcome {
            recipes,
            source: RecommendationSource::TopRated,
        })
    }

    /// The `k` recipes most similar to `recipe_id`
    pub async fn similar_recipes(&self, recipe_id: i64, k: usize) -> AppResult<Vec<RecipeRecord>> {
        let k = k.min(MAX_RECOMMENDATIONS);
        let corpus = load_corpus(self.store.as_ref()).await?;
        let model = self.similarity.model_for(&corpus).await?;
        let ids = model.recommend_similar(recipe_id, k)?;

        let by_id = index_corpus(&corpus);
        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|r| (*r).clone()))
            .collect())
    }

    /// Recipes that can be cooked from `ingredients`
    ///
    /// Falls back to keyword matching when the AI search fails or its answer cannot be parsed.
    /// An empty AI answer is kept as is.
    pub async fn search_by_ingredients(
        &self,
        user_id: Option<i64>,
        ingredients: &[String],
        max_results: usize,
    ) -> AppResult<IngredientSearchResult> {
        let ingredients = normalize_ingredients(ingredients);
        if ingredients.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one ingredient is required".to_string(),
            ));
        }
        if !(1..=MAX_INGREDIENT_RESULTS).contains(&max_results) {
            return Err(AppError::InvalidInput(format!(
                "max_results must be between 1 and {}",
                MAX_INGREDIENT_RESULTS
            )));
        }
        let max_results = max_results.min(INGREDIENT_RESULT_CAP);

        let corpus = load_corpus(self.store.as_ref()).await?;

        let result = match self
            .ingredient_client
            .find_recipes(&ingredients, &corpus, max_results)
            .await
        {
            Ok(mut result) => {
                result.recipes = resolve_matches(&corpus, result.recipes, max_results);
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI ingredient search unavailable, using keyword search");
                keyword_search(&ingredients, &corpus, max_results)
            }
        };

        let record = IngredientSearchRecord {
            user_id,
            ingredients: ingredients.clone(),
            results_count: result.recipes.len(),
            searched_at: Utc::now(),
        };
        if let Err(e) = self.store.record_search(record).await {
            tracing::error!(error = %e, "Failed to record ingredient search");
        }

        tracing::info!(
            ingredients = ingredients.len(),
            results = result.recipes.len(),
            ai_powered = result.ai_powered,
            "Ingredient search complete"
        );
        Ok(result)
    }

    pub async fn recommendation_history(&self, user_id: i64) -> AppResult<Vec<Recommendation>> {
        self.store
            .history(user_id, RECOMMENDATION_HISTORY_LIMIT)
            .await
    }

    pub async fn search_history(&self, user_id: i64) -> AppResult<Vec<IngredientSearchRecord>> {
        self.store
            .search_history(user_id, SEARCH_HISTORY_LIMIT)
            .await
    }

    /// Stored preferences, or defaults for users who never saved any
    pub async fn preferences(&self, user_id: i64) -> AppResult<UserPreference> {
        Ok(self
            .store
            .get_preferences(user_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        update: PreferenceUpdate,
    ) -> AppResult<UserPreference> {
        let updated = self.preferences(user_id).await?.apply(update)?;
        self.store.save_preferences(user_id, &updated).await?;
        tracing::info!(user_id, "Preferences updated");
        Ok(updated)
    }

    pub async fn track_view(&self, user_id: i64, recipe_id: i64) -> AppResult<()> {
        if self.store.get_recipe(recipe_id).await?.is_none() {
            return Err(AppError::RecipeNotFound(recipe_id));
        }
        self.store
            .record_interaction(user_id, recipe_id, InteractionType::View)
            .await?;
        tracing::debug!(user_id, recipe_id, "Recipe view recorded");
        Ok(())
    }
}

fn index_corpus(corpus: &[RecipeRecord]) -> HashMap<i64, &RecipeRecord> {
    corpus.iter().map(|r| (r.id, r)).collect()
}

/// Maps LLM picks onto catalog recipes
///
/// Unknown ids are dropped, repeats keep their first occurrence, scores are clamped.
fn resolve(
    corpus: &[RecipeRecord],
    suggestions: Vec<AiRecommendation>,
    limit: usize,
) -> Vec<RecommendedRecipe> {
    let by_id = index_corpus(corpus);
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for suggestion in suggestions {
        if resolved.len() == limit {
            break;
        }
        let Some(recipe) = by_id.get(&suggestion.recipe_id) else {
            tracing::warn!(
                error = %AppError::UnknownRecipeReference(suggestion.recipe_id),
                "Dropping AI recommendation"
            );
            continue;
        };
        if !seen.insert(suggestion.recipe_id) {
            continue;
        }
        resolved.push(RecommendedRecipe {
            recipe: (*recipe).clone(),
            confidence_score: clamp_score(suggestion.confidence_score),
            reason: suggestion.reason,
        });
    }

    resolved
}

fn resolve_matches(
    corpus: &[RecipeRecord],
    matches: Vec<IngredientMatch>,
    max_results: usize,
) -> Vec<IngredientMatch> {
    let known: HashSet<i64> = corpus.iter().map(|r| r.id).collect();
    let mut seen = HashSet::new();

    matches
        .into_iter()
        .filter(|m| {
            let keep = known.contains(&m.recipe_id);
            if !keep {
                tracing::warn!(
                    error = %AppError::UnknownRecipeReference(m.recipe_id),
                    "Dropping AI ingredient match"
                );
            }
            keep
        })
        .filter(|m| seen.insert(m.recipe_id))
        .take(max_results)
        .map(|mut m| {
            m.match_score = clamp_score(m.match_score);
            m
        })
        .collect()
}

fn profile_items(
    model: &SimilarityModel,
    corpus: &[RecipeRecord],
    liked: &[i64],
    ids: &[i64],
) -> Vec<RecommendedRecipe> {
    let by_id = index_corpus(corpus);
    ids.iter()
        .filter_map(|id| by_id.get(id))
        .map(|recipe| {
            let scores: Vec<f64> = liked
                .iter()
                .filter_map(|l| model.score(*l, recipe.id))
                .collect();
            let mean = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            RecommendedRecipe {
                recipe: (*recipe).clone(),
                confidence_score: clamp_score(mean),
                reason: PROFILE_REASON.to_string(),
            }
        })
        .collect()
}

/// Trimmed, non-empty, case-insensitively unique, first-seen order
fn normalize_ingredients(ingredients: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ingredients
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty() && seen.insert(i.to_lowercase()))
        .collect()
}
