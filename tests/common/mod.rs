#![allow(dead_code)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use trip_picks_api::{
    config::PipelineConfig,
    models::{
        conversation::ConversationTurn,
        place::{Geometry, RawPlace},
        request::Coordinates,
    },
    routes::{self, AppState},
    services::{
        artifact_store::ArtifactStore,
        chat_service::{ChatCompletion, ChatError, GenerationConfig},
        pipeline::RecommendationPipeline,
        places_service::{Geocoder, PlaceSearch, PlacesError, SearchOutcome},
        retrieval_service::{ContextRetriever, RetrievalError},
    },
};

pub const KEYWORD_MODEL: &str = "keyword-model";
pub const RECOMMENDATION_MODEL: &str = "recommendation-model";

pub fn tainan_origin() -> Coordinates {
    Coordinates::new(22.9973, 120.2125)
}

pub fn raw_place(id: &str, name: &str, lat: f64, lng: f64) -> RawPlace {
    RawPlace {
        place_id: id.to_string(),
        name: name.to_string(),
        vicinity: Some(format!("{}地址", name)),
        rating: Some(4.3),
        types: vec!["cafe".to_string()],
        geometry: Some(Geometry {
            location: Coordinates::new(lat, lng),
        }),
    }
}

/// Nearby search backed by a keyword → places table. Unknown keywords find
/// nothing; keywords listed in `failing` error out.
#[derive(Default)]
pub struct StubSearch {
    pub results: HashMap<String, Vec<RawPlace>>,
    pub failing: Vec<String>,
    pub calls: Mutex<Vec<(String, u32)>>,
}

impl StubSearch {
    pub fn with(mut self, keyword: &str, places: Vec<RawPlace>) -> Self {
        self.results.insert(keyword.to_string(), places);
        self
    }

    pub fn failing_on(mut self, keyword: &str) -> Self {
        self.failing.push(keyword.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaceSearch for StubSearch {
    async fn search(
        &self,
        _origin: Coordinates,
        keyword: &str,
        radius_meters: u32,
    ) -> Result<SearchOutcome, PlacesError> {
        self.calls
            .lock()
            .unwrap()
            .push((keyword.to_string(), radius_meters));

        if self.failing.iter().any(|k| k == keyword) {
            return Err(PlacesError::ApiStatus {
                status: "OVER_QUERY_LIMIT".to_string(),
                message: None,
            });
        }
        match self.results.get(keyword) {
            Some(places) if !places.is_empty() => Ok(SearchOutcome::Found {
                places: places.clone(),
                html_attributions: vec![],
            }),
            _ => Ok(SearchOutcome::NoResults),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub history_len: usize,
    pub user_prompt: String,
}

/// Answers keyword calls with `keyword_reply` and recommendation calls with
/// the next entry of `recommendation_replies` (the last one repeats).
pub struct ScriptedChat {
    pub keyword_reply: Option<String>,
    pub recommendation_replies: Vec<String>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedChat {
    pub fn new(keyword_reply: &str, recommendation_replies: Vec<String>) -> Self {
        Self {
            keyword_reply: Some(keyword_reply.to_string()),
            recommendation_replies,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn recommendation_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.model == RECOMMENDATION_MODEL)
            .collect()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(
        &self,
        _system_prompt: &str,
        history: &[ConversationTurn],
        user_prompt: &str,
        generation: &GenerationConfig,
    ) -> Result<String, ChatError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(RecordedCall {
            model: generation.model.clone(),
            history_len: history.len(),
            user_prompt: user_prompt.to_string(),
        });

        let unavailable = ChatError::Status {
            code: 503,
            body: "model unavailable".to_string(),
        };
        if generation.model == KEYWORD_MODEL {
            return self.keyword_reply.clone().ok_or(unavailable);
        }

        let round = calls
            .iter()
            .filter(|c| c.model == RECOMMENDATION_MODEL)
            .count();
        self.recommendation_replies
            .get(round - 1)
            .or(self.recommendation_replies.last())
            .cloned()
            .ok_or(unavailable)
    }
}

pub struct StubRetriever {
    pub chunks: Vec<String>,
}

#[async_trait]
impl ContextRetriever for StubRetriever {
    async fn retrieve_top_k(&self, _query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

pub struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, PlacesError> {
        if address.contains("台南") {
            Ok(Some(tainan_origin()))
        } else {
            Ok(None)
        }
    }
}

pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.keyword_generation = GenerationConfig::keyword(KEYWORD_MODEL);
    config.recommendation_generation = GenerationConfig::recommendation(RECOMMENDATION_MODEL, 512);
    config.search_cooldown = Duration::ZERO;
    config.memory_max_exchanges = 2;
    config
}

pub fn build_pipeline(
    dir: &TempDir,
    chat: Arc<ScriptedChat>,
    search: Arc<StubSearch>,
) -> RecommendationPipeline {
    build_pipeline_with_config(dir, chat, search, test_config())
}

pub fn build_pipeline_with_config(
    dir: &TempDir,
    chat: Arc<ScriptedChat>,
    search: Arc<StubSearch>,
    config: PipelineConfig,
) -> RecommendationPipeline {
    RecommendationPipeline::new(
        chat,
        search,
        Arc::new(StubRetriever {
            chunks: vec!["窄門咖啡位於老屋二樓".to_string()],
        }),
        ArtifactStore::new(dir.path()),
        config,
    )
}

pub struct TestApp {
    pub state: web::Data<AppState>,
    pub chat: Arc<ScriptedChat>,
    pub search: Arc<StubSearch>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new(chat: ScriptedChat, search: StubSearch) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let chat = Arc::new(chat);
        let search = Arc::new(search);
        let pipeline = build_pipeline(&dir, chat.clone(), search.clone());

        Self {
            state: web::Data::new(AppState {
                pipeline,
                geocoder: Arc::new(StubGeocoder),
                retrieval_backend: "stub".to_string(),
            }),
            chat,
            search,
            dir,
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(self.state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .route("/health", web::get().to(routes::health::health_check))
            .service(web::scope("/api").configure(routes::recommendation::configure))
    }
}
