//! One recommendation round, end to end.
//!
//! derive keywords → aggregate nearby places → retrieve reference text →
//! synthesize with the session's memory → parse and enrich the reply.
//!
//! The interchange documents go through the [`ArtifactStore`] only once the
//! whole round has succeeded, so a failed round leaves the session's previous
//! documents and memory as they were.

use log::{error, info, warn};
use serde::Serialize;
use std::{fmt, sync::Arc};

use crate::config::PipelineConfig;
use crate::models::{
    option::RecommendedOption,
    place::CandidatePlaceDocument,
    request::RequestContext,
};
use crate::services::{
    artifact_store::{ArtifactError, ArtifactStore, ReplyRecord},
    chat_service::ChatCompletion,
    keyword_service::{derive_keywords, KeywordError},
    memory_store::SessionMemoryStore,
    option_parser::OptionParser,
    place_aggregator::{AggregationResult, PlaceAggregator},
    places_service::PlaceSearch,
    recommendation_service::{synthesize, SynthesisError},
    reply_grammar::ReplyGrammar,
    retrieval_service::{retrieve_context, ContextRetriever},
};

#[derive(Debug)]
pub enum PipelineError {
    Keyword(KeywordError),
    Synthesis(SynthesisError),
    Artifact(ArtifactError),
    /// Regenerate was asked for a session that never ran a round.
    UnknownSession(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Keyword(err) => write!(f, "{}", err),
            PipelineError::Synthesis(err) => write!(f, "{}", err),
            PipelineError::Artifact(err) => write!(f, "{}", err),
            PipelineError::UnknownSession(id) => write!(f, "No stored request for session {}", id),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<KeywordError> for PipelineError {
    fn from(err: KeywordError) -> Self {
        PipelineError::Keyword(err)
    }
}

impl From<SynthesisError> for PipelineError {
    fn from(err: SynthesisError) -> Self {
        PipelineError::Synthesis(err)
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        PipelineError::Artifact(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub session_id: String,
    pub keywords: Vec<String>,
    pub candidate_count: usize,
    pub options: Vec<RecommendedOption>,
    /// Reply segments that carried no place name.
    pub unparseable_segments: usize,
}

pub struct RecommendationPipeline {
    chat: Arc<dyn ChatCompletion>,
    search: Arc<dyn PlaceSearch>,
    retriever: Arc<dyn ContextRetriever>,
    memory: SessionMemoryStore,
    artifacts: ArtifactStore,
    parser: OptionParser,
    config: PipelineConfig,
}

impl RecommendationPipeline {
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        search: Arc<dyn PlaceSearch>,
        retriever: Arc<dyn ContextRetriever>,
        artifacts: ArtifactStore,
        config: PipelineConfig,
    ) -> Self {
        let parser = OptionParser::new(ReplyGrammar::v1(), config.parse_mode, config.resolver.build());
        Self {
            chat,
            search,
            retriever,
            memory: SessionMemoryStore::with_limits(
                config.memory_max_exchanges,
                config.memory_max_sessions,
                config.memory_idle_ttl,
            ),
            artifacts,
            parser,
            config,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn memory(&self) -> &SessionMemoryStore {
        &self.memory
    }

    /// Run a full round for `session_id` and persist every artifact.
    pub async fn run_round(
        &self,
        session_id: &str,
        ctx: &RequestContext,
    ) -> Result<RoundOutcome, PipelineError> {
        self.artifacts.session_dir(session_id)?;
        info!(
            "Starting round for session {} ({} within {} m)",
            session_id, ctx.category, ctx.radius_meters
        );

        let keyword_generation = &self.config.keyword_generation;
        let (keywords, keyword_reply) =
            derive_keywords(self.chat.as_ref(), keyword_generation, &ctx.need, &ctx.category).await?;

        let AggregationResult {
            candidates,
            html_attributions,
            failed_keywords,
        } = PlaceAggregator::new(self.search.as_ref(), self.config.search_cooldown)
            .aggregate(ctx.origin, &keywords, ctx.radius_meters)
            .await;
        if !failed_keywords.is_empty() {
            warn!("Searches failed for {:?}", failed_keywords);
        }
        if candidates.is_empty() {
            warn!("No candidate places for session {}", session_id);
        }

        let retrieved =
            retrieve_context(self.retriever.as_ref(), &ctx.need, self.config.retrieval_top_k).await;

        let recommendation_generation = &self.config.recommendation_generation;
        let output = synthesize(
            self.chat.as_ref(),
            recommendation_generation,
            self.parser.grammar(),
            ctx,
            &candidates,
            &retrieved,
            self.memory.checkout(session_id),
        )
        .await?;

        let report = self.parser.parse_reply_report(&output.reply, &candidates, ctx);

        // options.json goes first and comes back last, so it never sits next
        // to documents from a different round.
        self.artifacts.remove_options(session_id)?;
        self.artifacts.write_request(session_id, &ctx.to_document())?;
        self.artifacts.write_keyword_reply(
            session_id,
            &ReplyRecord::new(&keyword_generation.model, &keyword_reply),
        )?;
        self.artifacts.write_candidates(
            session_id,
            &CandidatePlaceDocument::from_set(&candidates, html_attributions),
        )?;
        self.artifacts.write_recommendation_reply(
            session_id,
            &ReplyRecord::new(&recommendation_generation.model, &output.reply),
        )?;
        self.artifacts.write_options(session_id, &report.options)?;

        for evicted in self.memory.store(session_id, output.memory) {
            info!("Evicted idle session {}", evicted);
            if let Err(e) = self.artifacts.remove_session(&evicted) {
                warn!("Failed to remove documents of evicted session {}: {}", evicted, e);
            }
        }

        info!(
            "Round for session {} produced {} options from {} candidates",
            session_id,
            report.options.len(),
            candidates.len()
        );

        Ok(RoundOutcome {
            session_id: session_id.to_string(),
            keywords,
            candidate_count: candidates.len(),
            options: report.options,
            unparseable_segments: report.unparseable.len(),
        })
    }

    /// Re-run a round from the session's stored request document.
    ///
    /// The session memory still holds the earlier picks, so the model is asked
    /// for new places.
    pub async fn regenerate(&self, session_id: &str) -> Result<RoundOutcome, PipelineError> {
        let doc = match self.artifacts.read_request(session_id) {
            Ok(doc) => doc,
            Err(ArtifactError::NotFound(_)) => {
                return Err(PipelineError::UnknownSession(session_id.to_string()))
            }
            Err(e) => {
                error!("Failed to load request for session {}: {}", session_id, e);
                return Err(e.into());
            }
        };

        self.run_round(session_id, &RequestContext::from_document(&doc))
            .await
    }

    /// Returns whether the session had any memory.
    pub fn clear_memory(&self, session_id: &str) -> bool {
        let cleared = self.memory.clear(session_id);
        if cleared {
            info!("Cleared conversation memory for session {}", session_id);
        }
        cleared
    }
}
