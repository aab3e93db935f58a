use std::{io, sync::Arc};

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use trip_picks_api::{
    config::AppConfig,
    routes::{self, AppState},
    services::{
        artifact_store::ArtifactStore,
        chat_service::GatewayChatClient,
        pipeline::RecommendationPipeline,
        places_service::GooglePlacesService,
        retrieval_service::{ContextRetriever, NoopRetriever, VertexRetriever},
    },
};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let places = Arc::new(
        GooglePlacesService::new(&config.google_maps_api_key, config.http_timeout)
            .map_err(|e| startup_error("Failed to build Places client", e))?,
    );
    let chat = Arc::new(
        GatewayChatClient::new(&config.llm_base_url, &config.llm_api_key, config.http_timeout)
            .map_err(|e| startup_error("Failed to build LLM client", e))?,
    );

    let (retriever, retrieval_backend): (Arc<dyn ContextRetriever>, String) = match &config.vertex {
        Some(vertex) => {
            let retriever = VertexRetriever::new(vertex.clone(), config.http_timeout)
                .map_err(|e| startup_error("Failed to build Vertex AI Search client", e))?;
            let retriever: Arc<dyn ContextRetriever> = Arc::new(retriever);
            (retriever, format!("vertex_search:{}", vertex.data_store_id))
        }
        None => {
            warn!("No Vertex AI Search data store configured; prompts carry no reference text");
            let retriever: Arc<dyn ContextRetriever> = Arc::new(NoopRetriever);
            (retriever, "none".to_string())
        }
    };

    let pipeline = RecommendationPipeline::new(
        chat,
        places.clone(),
        retriever,
        ArtifactStore::new(config.artifact_dir.clone()),
        config.pipeline.clone(),
    );
    let state = web::Data::new(AppState {
        pipeline,
        geocoder: places,
        retrieval_backend,
    });

    info!("Starting HTTP server on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(state.clone())
            .route("/health", web::get().to(routes::health::health_check))
            .service(web::scope("/api").configure(routes::recommendation::configure))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
