pub mod artifact_store;
pub mod chat_service;
pub mod distance_service;
pub mod keyword_service;
pub mod memory_store;
pub mod option_parser;
pub mod pipeline;
pub mod place_aggregator;
pub mod place_resolver;
pub mod places_service;
pub mod prompt_builder;
pub mod recommendation_service;
pub mod reply_grammar;
pub mod retrieval_service;
