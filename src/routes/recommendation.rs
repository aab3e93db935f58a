use actix_web::{web, HttpResponse, Responder};
use log::{error, warn};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::request::{Coordinates, RequestContext, RequestDocument};
use crate::routes::AppState;
use crate::services::{artifact_store::ArtifactError, pipeline::PipelineError};

/// Request document plus the fields only the web layer cares about.
#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub session_id: Option<String>,
    /// Geocoded when `coordinates` is absent.
    pub origin_address: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub companion: String,
    #[serde(default)]
    pub category_selection: String,
    pub max_travel_distance: Option<String>,
    #[serde(default)]
    pub time_slot: String,
    pub coordinates: Option<Coordinates>,
}

fn pipeline_error_response(err: PipelineError) -> HttpResponse {
    let message = err.to_string();
    match err {
        PipelineError::Keyword(_) | PipelineError::Synthesis(_) => {
            error!("Recommendation round failed: {}", message);
            HttpResponse::BadGateway().json(json!({ "error": message }))
        }
        PipelineError::UnknownSession(_) => HttpResponse::NotFound().json(json!({ "error": message })),
        PipelineError::Artifact(ArtifactError::InvalidSession(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
        PipelineError::Artifact(_) => {
            error!("Artifact store failure: {}", message);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to store recommendation data" }))
        }
    }
}

async fn resolve_origin(state: &AppState, input: &RecommendationRequest) -> Result<Coordinates, HttpResponse> {
    if let Some(coordinates) = input.coordinates {
        return Ok(coordinates);
    }

    let Some(address) = input.origin_address.as_deref().filter(|a| !a.trim().is_empty()) else {
        return Err(HttpResponse::BadRequest()
            .json(json!({ "error": "Either coordinates or origin_address is required" })));
    };

    match state.geocoder.geocode(address).await {
        Ok(Some(coordinates)) => Ok(coordinates),
        Ok(None) => {
            warn!("No geocoding result for '{}'", address);
            Err(HttpResponse::BadRequest().json(json!({ "error": "Origin address not found" })))
        }
        Err(e) => {
            error!("Geocoding failed for '{}': {}", address, e);
            Err(HttpResponse::BadGateway().json(json!({ "error": "Failed to geocode origin address" })))
        }
    }
}

/*
    POST /api/recommendations
*/
pub async fn create(state: web::Data<AppState>, input: web::Json<RecommendationRequest>) -> impl Responder {
    let input = input.into_inner();

    let origin = match resolve_origin(&state, &input).await {
        Ok(origin) => origin,
        Err(response) => return response,
    };

    let session_id = input
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = RequestContext::from_document(&RequestDocument {
        prompt: input.prompt,
        companion: input.companion,
        category_selection: input.category_selection,
        max_travel_distance: input.max_travel_distance,
        time_slot: input.time_slot,
        coordinates: origin,
    });

    match state.pipeline.run_round(&session_id, &ctx).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(err) => pipeline_error_response(err),
    }
}

/*
    POST /api/recommendations/{session_id}/regenerate
*/
pub async fn regenerate(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    match state.pipeline.regenerate(&session_id).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(err) => pipeline_error_response(err),
    }
}

/*
    DELETE /api/recommendations/{session_id}/memory
*/
pub async fn clear_memory(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let cleared = state.pipeline.clear_memory(&session_id);
    HttpResponse::Ok().json(json!({ "session_id": session_id, "cleared": cleared }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/recommendations")
            .route("", web::post().to(create))
            .route("/{session_id}/regenerate", web::post().to(regenerate))
            .route("/{session_id}/memory", web::delete().to(clear_memory)),
    );
}
