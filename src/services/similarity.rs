/// Content-based similarity over recipe text
///
/// Recipes are flattened by [`extract_features`], vectorised with TF-IDF (English
/// stop words removed, smoothed IDF, L2-normalised rows) and compared pairwise with
/// cosine similarity. The model is a disposable cache rebuilt whenever the corpus
/// checksum changes.
use std::collections::{hash_map::DefaultHasher, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::RecipeRecord,
    services::features::extract_features,
};

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "am", "among",
    "an", "and", "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
    "done", "down", "during", "each", "either", "else", "enough", "etc", "even", "ever",
    "every", "few", "for", "from", "further", "get", "had", "has", "have", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "if",
    "in", "into", "is", "it", "its", "itself", "just", "least", "less", "made", "many", "may",
    "me", "might", "more", "most", "much", "must", "my", "myself", "neither", "no", "nor",
    "not", "now", "of", "off", "often", "on", "once", "one", "only", "or", "other", "our",
    "ours", "ourselves", "out", "over", "own", "per", "perhaps", "please", "quite", "rather",
    "really", "same", "she", "should", "since", "so", "some", "still", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "though", "through", "thus", "to", "too", "under", "until", "up", "upon", "us",
    "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "where",
    "whether", "which", "while", "who", "whoever", "whole", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercases, splits on non-alphanumerics, keeps tokens of two or more characters
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Sparse row: (term index, weight), sorted by term index
type SparseVector = Vec<(usize, f64)>;

/// TF-IDF vocabulary and inverse document frequencies fitted on a corpus
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let n_docs = documents.len() as f64;
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for doc in documents {
            let unique: HashSet<String> = tokenize(doc.as_ref()).into_iter().collect();
            let mut terms: Vec<String> = unique.into_iter().collect();
            terms.sort();
            for term in terms {
                let next = vocabulary.len();
                let idx = *vocabulary.entry(term).or_insert(next);
                if idx == doc_freq.len() {
                    doc_freq.push(0);
                }
                doc_freq[idx] += 1;
            }
        }

        // smoothed: ln((1 + n) / (1 + df)) + 1
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Unit-length TF-IDF vector; all-zero documents yield an empty vector
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        vector.sort_by_key(|(idx, _)| *idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }
}

fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Descending score, ascending recipe id on ties
fn rank(mut scored: Vec<(i64, f64)>, k: usize) -> Vec<i64> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Pairwise cosine similarities over a recipe corpus
///
/// The matrix is square and symmetric with a diagonal of exactly 1.0.
#[derive(Debug, Clone)]
pub struct SimilarityModel {
    ids: Vec<i64>,
    positions: HashMap<i64, usize>,
    matrix: Vec<Vec<f64>>,
}

impl SimilarityModel {
    pub fn build(corpus: &[RecipeRecord]) -> AppResult<Self> {
        if corpus.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        let documents: Vec<String> = corpus.iter().map(extract_features).collect();
        let vectorizer = TfIdfVectorizer::fit(&documents);
        let vectors: Vec<SparseVector> =
            documents.iter().map(|d| vectorizer.transform(d)).collect();

        let n = corpus.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let score = sparse_dot(&vectors[i], &vectors[j]).clamp(0.0, 1.0);
                matrix[i][j] = score;
                matrix[j][i] = score;
            }
        }

        let ids: Vec<i64> = corpus.iter().map(|r| r.id).collect();
        let mut positions = HashMap::with_capacity(n);
        for (pos, id) in ids.iter().enumerate() {
            positions.entry(*id).or_insert(pos);
        }

        tracing::debug!(
            recipes = n,
            vocabulary = vectorizer.vocabulary_size(),
            "Similarity model built"
        );

        Ok(Self {
            ids,
            positions,
            matrix,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn score(&self, a: i64, b: i64) -> Option<f64> {
        let i = *self.positions.get(&a)?;
        let j = *self.positions.get(&b)?;
        Some(self.matrix[i][j])
    }

    /// The `k` recipes most similar to `recipe_id`, never including it
    pub fn recommend_similar(&self, recipe_id: i64, k: usize) -> AppResult<Vec<i64>> {
        let row = *self
            .positions
            .get(&recipe_id)
            .ok_or(AppError::RecipeNotFound(recipe_id))?;

        let scored = self
            .ids
            .iter()
            .enumerate()
            .filter(|(_, &id)| id != recipe_id)
            .map(|(pos, &id)| (id, self.matrix[row][pos]))
            .collect();

        Ok(rank(scored, k))
    }

    /// Ranks the corpus by mean similarity to the rated recipes
    ///
    /// Rated ids missing from the model are ignored; if none remain the result is empty.
    pub fn recommend_for_profile(
        &self,
        rated_recipe_ids: &[i64],
        exclude_ids: &HashSet<i64>,
        k: usize,
    ) -> Vec<i64> {
        let rows: Vec<usize> = rated_recipe_ids
            .iter()
            .filter_map(|id| self.positions.get(id).copied())
            .collect();
        if rows.is_empty() {
            return Vec::new();
        }

        let scored = self
            .ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !exclude_ids.contains(*id))
            .map(|(pos, &id)| {
                let total: f64 = rows.iter().map(|&row| self.matrix[row][pos]).sum();
                (id, total / rows.len() as f64)
            })
            .collect();

        rank(scored, k)
    }
}

/// "Top-rated overall" ordering: mean rating descending, newest first on ties
///
/// Recipes without ratings count as 0.
pub fn top_rated(
    corpus: &[RecipeRecord],
    mean_ratings: &HashMap<i64, f64>,
    exclude_ids: &HashSet<i64>,
    k: usize,
) -> Vec<i64> {
    let mut candidates: Vec<(&RecipeRecord, f64)> = corpus
        .iter()
        .filter(|r| !exclude_ids.contains(&r.id))
        .map(|r| (r, mean_ratings.get(&r.id).copied().unwrap_or(0.0)))
        .collect();

    candidates.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(b.0.created_at.cmp(&a.0.created_at))
            .then(a.0.id.cmp(&b.0.id))
    });
    candidates.into_iter().take(k).map(|(r, _)| r.id).collect()
}

/// Hash over everything the feature extractor reads
pub fn corpus_checksum(corpus: &[RecipeRecord]) -> u64 {
    let mut hasher = DefaultHasher::new();
    corpus.len().hash(&mut hasher);
    for recipe in corpus {
        recipe.id.hash(&mut hasher);
        extract_features(recipe).hash(&mut hasher);
    }
    hasher.finish()
}

/// Keeps the most recently built model and rebuilds it when the corpus changes
#[derive(Default)]
pub struct SimilarityIndex {
    cached: RwLock<Option<(u64, Arc<SimilarityModel>)>>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn model_for(&self, corpus: &[RecipeRecord]) -> AppResult<Arc<SimilarityModel>> {
        let checksum = corpus_checksum(corpus);

        if let Some((cached_checksum, model)) = self.cached.read().await.as_ref() {
            if *cached_checksum == checksum {
                return Ok(model.clone());
            }
        }

        let owned = corpus.to_vec();
        let model = tokio::task::spawn_blocking(move || SimilarityModel::build(&owned))
            .await
            .map_err(|e| AppError::Internal(format!("Similarity build task failed: {}", e)))??;
        let model = Arc::new(model);

        tracing::info!(recipes = model.ids.len(), checksum, "Similarity model rebuilt");
        *self.cached.write().await = Some((checksum, model.clone()));

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn recipe(id: i64, description: &str, category: &str, tags: &[&str]) -> RecipeRecord {
        RecipeRecord {
            id,
            title: format!("Recipe {}", id),
            description: description.to_string(),
            category: Some(category.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ingredients: vec![],
            preparation_time: 10,
            cooking_time: 30,
            created_at: Utc::now() - Duration::days(id),
        }
    }

    fn corpus() -> Vec<RecipeRecord> {
        vec![
            recipe(1, "tomato rice stew", "west african", &["rice", "spicy"]),
            recipe(2, "grilled beef skewers", "street food", &["grill", "spicy"]),
            recipe(3, "bitterleaf peanut stew", "west african", &["stew"]),
            recipe(4, "tomato rice with chicken", "west african", &["rice"]),
            recipe(5, "", "", &[]),
        ]
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("The smoky rice, with a Pepper-stew"),
            vec!["smoky", "rice", "pepper", "stew"]
        );
    }

    #[test]
    fn test_build_empty_corpus_fails() {
        assert!(matches!(
            SimilarityModel::build(&[]),
            Err(AppError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_matrix_diagonal_and_symmetry() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        let n = model.len();
        for i in 0..n {
            assert_eq!(model.matrix[i][i], 1.0);
            for j in 0..n {
                assert_eq!(model.matrix[i][j], model.matrix[j][i]);
                assert!((0.0..=1.0).contains(&model.matrix[i][j]));
            }
        }
    }

    #[test]
    fn test_recommend_similar_excludes_seed_and_respects_k() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        for recipe in corpus() {
            for k in 0..7 {
                let similar = model.recommend_similar(recipe.id, k).unwrap();
                assert!(!similar.contains(&recipe.id));
                assert!(similar.len() <= k);
                assert!(similar.len() <= model.len() - 1);
            }
        }
    }

    #[test]
    fn test_recommend_similar_orders_by_shared_text() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        let similar = model.recommend_similar(1, 2).unwrap();
        assert_eq!(similar[0], 4);
    }

    #[test]
    fn test_recommend_similar_ties_break_by_id() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        // recipe 5 has no text; every other recipe scores 0 against it
        let similar = model.recommend_similar(5, 4).unwrap();
        assert_eq!(similar, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_recommend_similar_unknown_recipe() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        assert!(matches!(
            model.recommend_similar(99, 3),
            Err(AppError::RecipeNotFound(99))
        ));
    }

    #[test]
    fn test_recommend_for_profile_excludes_ids() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        let exclude = HashSet::from([1, 2]);
        let ranked = model.recommend_for_profile(&[1], &exclude, 10);
        assert_eq!(ranked[0], 4);
        assert!(!ranked.contains(&1));
        assert!(!ranked.contains(&2));
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_recommend_for_profile_unknown_rated_ids() {
        let model = SimilarityModel::build(&corpus()).unwrap();
        assert!(model
            .recommend_for_profile(&[42], &HashSet::new(), 5)
            .is_empty());
    }

    #[test]
    fn test_top_rated_orders_by_mean_then_newest() {
        let corpus = corpus();
        let means = HashMap::from([(3, 4.5), (2, 4.5), (1, 3.0)]);
        let ranked = top_rated(&corpus, &means, &HashSet::from([4]), 10);
        // 2 is newer than 3; unrated 5 last
        assert_eq!(ranked, vec![2, 3, 1, 5]);
    }

    #[test]
    fn test_checksum_changes_with_corpus() {
        let mut corpus = corpus();
        let before = corpus_checksum(&corpus);
        assert_eq!(before, corpus_checksum(&corpus));
        corpus[0].tags.push("party".to_string());
        assert_ne!(before, corpus_checksum(&corpus));
    }

    #[tokio::test]
    async fn test_index_reuses_model_for_same_corpus() {
        let index = SimilarityIndex::new();
        let corpus = corpus();
        let first = index.model_for(&corpus).await.unwrap();
        let second = index.model_for(&corpus).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let smaller = &corpus[..3];
        let third = index.model_for(smaller).await.unwrap();
        assert_eq!(third.len(), 3);
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
