use std::sync::Arc;

use crate::{
    config::Config,
    db::{Cache, Store},
    services::{
        llm::{ChatTransport, IngredientMatchClient, RecommendationClient},
        HybridRecommender,
    },
};

/// Shared application state
pub struct AppState {
    pub recommender: HybridRecommender,
}

impl AppState {
    pub fn new(recommender: HybridRecommender) -> Self {
        Self { recommender }
    }

    /// Wires the recommender from its storage, transport and optional cache
    pub fn build(
        config: &Config,
        store: Arc<dyn Store>,
        transport: Arc<dyn ChatTransport>,
        cache: Option<Cache>,
    ) -> Arc<Self> {
        let timeout = config.llm_timeout();
        let recommender = HybridRecommender::new(
            store,
            RecommendationClient::new(transport.clone(), timeout),
            IngredientMatchClient::new(transport, timeout, cache),
            config.candidate_limit,
        );
        Arc::new(Self::new(recommender))
    }
}
