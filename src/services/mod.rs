pub mod context;
pub mod features;
pub mod llm;
pub mod recommender;
pub mod similarity;

pub use recommender::HybridRecommender;
