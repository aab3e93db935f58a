//! Environment-driven configuration.
//!
//! In debug builds `main` loads a `.env` file first, so every setting below can
//! live there during development.

use std::{env, fmt, path::PathBuf, time::Duration};

use crate::services::{
    chat_service::GenerationConfig, option_parser::ParseMode, place_resolver::ResolverKind,
};

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const LLM_BASE_URL: &str = "https://api-gateway.netdb.csie.ncku.edu.tw";
const KEYWORD_MODEL: &str = "gemma3:4b";
const RECOMMENDATION_MODEL: &str = "gpt-oss:120b";
const RECOMMENDATION_MAX_TOKENS: u32 = 1024;
const SEARCH_COOLDOWN_MS: u64 = 1000;
const RETRIEVAL_TOP_K: usize = 4;
const MEMORY_MAX_EXCHANGES: usize = 10;
const MEMORY_MAX_SESSIONS: usize = 1000;
const MEMORY_IDLE_TTL_SECS: u64 = 60 * 60;
const HTTP_TIMEOUT_SECS: u64 = 30;
const ARTIFACT_DIR: &str = "json";

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} environment variable not set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub location: String,
    pub data_store_id: String,
    pub serving_config: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub keyword_generation: GenerationConfig,
    pub recommendation_generation: GenerationConfig,
    pub search_cooldown: Duration,
    pub retrieval_top_k: usize,
    pub memory_max_exchanges: usize,
    pub memory_max_sessions: usize,
    pub memory_idle_ttl: Duration,
    pub parse_mode: ParseMode,
    pub resolver: ResolverKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keyword_generation: GenerationConfig::keyword(KEYWORD_MODEL),
            recommendation_generation: GenerationConfig::recommendation(
                RECOMMENDATION_MODEL,
                RECOMMENDATION_MAX_TOKENS,
            ),
            search_cooldown: Duration::from_millis(SEARCH_COOLDOWN_MS),
            retrieval_top_k: RETRIEVAL_TOP_K,
            memory_max_exchanges: MEMORY_MAX_EXCHANGES,
            memory_max_sessions: MEMORY_MAX_SESSIONS,
            memory_idle_ttl: Duration::from_secs(MEMORY_IDLE_TTL_SECS),
            parse_mode: ParseMode::Lenient,
            resolver: ResolverKind::Substring,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let recommendation_max_tokens = env_parse(
            "RECOMMENDATION_MAX_TOKENS",
            defaults.recommendation_generation.max_tokens,
        );
        let keyword_model = env::var("KEYWORD_MODEL").unwrap_or_else(|_| KEYWORD_MODEL.to_string());
        let recommendation_model =
            env::var("RECOMMENDATION_MODEL").unwrap_or_else(|_| RECOMMENDATION_MODEL.to_string());

        let parse_mode = match env::var("PARSE_MODE") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PARSE_MODE",
                value,
            })?,
            Err(_) => defaults.parse_mode,
        };
        let resolver = match env::var("PLACE_RESOLVER") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PLACE_RESOLVER",
                value,
            })?,
            Err(_) => defaults.resolver,
        };

        let retrieval_top_k = env_positive("RETRIEVAL_TOP_K", defaults.retrieval_top_k)?;
        let memory_max_sessions = env_positive("MEMORY_MAX_SESSIONS", defaults.memory_max_sessions)?;

        Ok(Self {
            keyword_generation: GenerationConfig::keyword(&keyword_model),
            recommendation_generation: GenerationConfig::recommendation(
                &recommendation_model,
                recommendation_max_tokens,
            ),
            search_cooldown: Duration::from_millis(env_parse(
                "SEARCH_COOLDOWN_MS",
                SEARCH_COOLDOWN_MS,
            )),
            retrieval_top_k,
            memory_max_exchanges: env_parse("MEMORY_MAX_EXCHANGES", defaults.memory_max_exchanges),
            memory_max_sessions,
            memory_idle_ttl: Duration::from_secs(env_parse(
                "MEMORY_IDLE_TTL_SECS",
                MEMORY_IDLE_TTL_SECS,
            )),
            parse_mode,
            resolver,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub google_maps_api_key: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub http_timeout: Duration,
    pub artifact_dir: PathBuf,
    pub vertex: Option<VertexConfig>,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY")
            .map_err(|_| ConfigError::Missing("GOOGLE_MAPS_API_KEY"))?;
        let llm_api_key =
            env::var("LLM_API_KEY").map_err(|_| ConfigError::Missing("LLM_API_KEY"))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| HOST.to_string()),
            port: env_parse("PORT", PORT),
            google_maps_api_key,
            llm_api_key,
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or_else(|_| LLM_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)),
            artifact_dir: env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(ARTIFACT_DIR)),
            vertex: vertex_from_env(),
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

/// Retrieval is optional: without a project and data store the service runs
/// with an empty reference context.
fn vertex_from_env() -> Option<VertexConfig> {
    let project_id = env::var("GOOGLE_CLOUD_PROJECT_ID").ok()?;
    let data_store_id = env::var("VERTEX_SEARCH_DATA_STORE_ID").ok()?;

    Some(VertexConfig {
        project_id,
        location: env::var("VERTEX_SEARCH_LOCATION").unwrap_or_else(|_| "global".to_string()),
        data_store_id,
        serving_config: env::var("VERTEX_SEARCH_SERVING_CONFIG")
            .unwrap_or_else(|_| "default_config".to_string()),
    })
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Like `env_parse`, but an explicit zero is a configuration error.
fn env_positive(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(0) => Err(ConfigError::Invalid { key, value }),
            Ok(n) => Ok(n),
            Err(_) => Ok(default),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "GOOGLE_MAPS_API_KEY",
            "LLM_API_KEY",
            "PORT",
            "SEARCH_COOLDOWN_MS",
            "PARSE_MODE",
            "PLACE_RESOLVER",
            "GOOGLE_CLOUD_PROJECT_ID",
            "VERTEX_SEARCH_DATA_STORE_ID",
            "RECOMMENDATION_MAX_TOKENS",
            "RETRIEVAL_TOP_K",
            "MEMORY_MAX_SESSIONS",
            "MEMORY_IDLE_TTL_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_missing_keys_are_reported() {
        clear_env();
        match AppConfig::from_env() {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "GOOGLE_MAPS_API_KEY"),
            other => panic!("expected missing key error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_defaults_and_overrides() {
        clear_env();
        env::set_var("GOOGLE_MAPS_API_KEY", "maps-key");
        env::set_var("LLM_API_KEY", "llm-key");
        env::set_var("PORT", "not-a-port");
        env::set_var("SEARCH_COOLDOWN_MS", "250");
        env::set_var("PLACE_RESOLVER", "layered");
        env::set_var("RECOMMENDATION_MAX_TOKENS", "2048");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, PORT);
        assert_eq!(config.pipeline.search_cooldown, Duration::from_millis(250));
        assert_eq!(config.pipeline.resolver, ResolverKind::Layered);
        assert_eq!(config.pipeline.parse_mode, ParseMode::Lenient);
        assert_eq!(config.pipeline.recommendation_generation.max_tokens, 2048);
        assert_eq!(config.pipeline.retrieval_top_k, 4);
        assert_eq!(config.pipeline.memory_max_sessions, 1000);
        assert_eq!(config.pipeline.memory_idle_ttl, Duration::from_secs(3600));
        assert!(config.vertex.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_parse_mode_is_rejected() {
        clear_env();
        env::set_var("GOOGLE_MAPS_API_KEY", "maps-key");
        env::set_var("LLM_API_KEY", "llm-key");
        env::set_var("PARSE_MODE", "sloppy");

        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::Invalid { key: "PARSE_MODE", .. })
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_retrieval_top_k_is_rejected() {
        clear_env();
        env::set_var("GOOGLE_MAPS_API_KEY", "maps-key");
        env::set_var("LLM_API_KEY", "llm-key");
        env::set_var("RETRIEVAL_TOP_K", "0");

        match AppConfig::from_env() {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "RETRIEVAL_TOP_K");
                assert_eq!(value, "0");
            }
            other => panic!("expected invalid value error, got {:?}", other),
        }

        env::set_var("RETRIEVAL_TOP_K", "8");
        env::set_var("MEMORY_MAX_SESSIONS", "0");
        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::Invalid { key: "MEMORY_MAX_SESSIONS", .. })
        ));

        env::set_var("MEMORY_MAX_SESSIONS", "20");
        env::set_var("MEMORY_IDLE_TTL_SECS", "90");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.pipeline.retrieval_top_k, 8);
        assert_eq!(config.pipeline.memory_max_sessions, 20);
        assert_eq!(config.pipeline.memory_idle_ttl, Duration::from_secs(90));
        clear_env();
    }
}
