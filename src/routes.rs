use std::sync::Arc;

use crate::services::{pipeline::RecommendationPipeline, places_service::Geocoder};

pub mod health;
pub mod recommendation;

/// Shared by every handler through `web::Data`.
pub struct AppState {
    pub pipeline: RecommendationPipeline,
    pub geocoder: Arc<dyn Geocoder>,
    /// Name of the reference-text backend, reported by `/health`.
    pub retrieval_backend: String,
}
