//! JSON documents shared with the web layer, one directory per session.
//!
//! ```text
//! {ARTIFACT_DIR}/{session_id}/request.json
//!                             data.json
//!                             options.json
//!                             tag_llm_reply.json
//!                             rag_llm_reply.json
//! ```

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::models::{
    option::RecommendedOption,
    place::CandidatePlaceDocument,
    request::RequestDocument,
};

const REQUEST_FILE: &str = "request.json";
const CANDIDATES_FILE: &str = "data.json";
const OPTIONS_FILE: &str = "options.json";
const KEYWORD_REPLY_FILE: &str = "tag_llm_reply.json";
const RECOMMENDATION_REPLY_FILE: &str = "rag_llm_reply.json";

#[derive(Debug)]
pub enum ArtifactError {
    Io(io::Error),
    Json(serde_json::Error),
    InvalidSession(String),
    NotFound(PathBuf),
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::Io(err) => write!(f, "Artifact I/O error: {}", err),
            ArtifactError::Json(err) => write!(f, "Artifact JSON error: {}", err),
            ArtifactError::InvalidSession(id) => write!(f, "Invalid session id: {}", id),
            ArtifactError::NotFound(path) => write!(f, "Artifact not found: {}", path.display()),
        }
    }
}

impl std::error::Error for ArtifactError {}

impl From<io::Error> for ArtifactError {
    fn from(err: io::Error) -> Self {
        ArtifactError::Io(err)
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        ArtifactError::Json(err)
    }
}

/// Raw model reply kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub model: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ReplyRecord {
    pub fn new(model: &str, content: &str) -> Self {
        Self {
            model: model.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, ArtifactError> {
        if !valid_session_id(session_id) {
            return Err(ArtifactError::InvalidSession(session_id.to_string()));
        }
        Ok(self.root.join(session_id))
    }

    fn write<T: Serialize>(&self, session_id: &str, file: &str, value: &T) -> Result<(), ArtifactError> {
        let dir = self.session_dir(session_id)?;
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(dir.join(file), json)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, session_id: &str, file: &str) -> Result<T, ArtifactError> {
        let path = self.session_dir(session_id)?.join(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(path))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_request(&self, session_id: &str, doc: &RequestDocument) -> Result<(), ArtifactError> {
        self.write(session_id, REQUEST_FILE, doc)
    }

    pub fn read_request(&self, session_id: &str) -> Result<RequestDocument, ArtifactError> {
        self.read(session_id, REQUEST_FILE)
    }

    pub fn write_candidates(
        &self,
        session_id: &str,
        doc: &CandidatePlaceDocument,
    ) -> Result<(), ArtifactError> {
        self.write(session_id, CANDIDATES_FILE, doc)
    }

    pub fn read_candidates(&self, session_id: &str) -> Result<CandidatePlaceDocument, ArtifactError> {
        self.read(session_id, CANDIDATES_FILE)
    }

    pub fn write_options(
        &self,
        session_id: &str,
        options: &[RecommendedOption],
    ) -> Result<(), ArtifactError> {
        self.write(session_id, OPTIONS_FILE, &options)
    }

    pub fn read_options(&self, session_id: &str) -> Result<Vec<RecommendedOption>, ArtifactError> {
        self.read(session_id, OPTIONS_FILE)
    }

    pub fn write_keyword_reply(&self, session_id: &str, record: &ReplyRecord) -> Result<(), ArtifactError> {
        self.write(session_id, KEYWORD_REPLY_FILE, record)
    }

    pub fn write_recommendation_reply(
        &self,
        session_id: &str,
        record: &ReplyRecord,
    ) -> Result<(), ArtifactError> {
        self.write(session_id, RECOMMENDATION_REPLY_FILE, record)
    }

    /// Remove a previous round's `options.json`. Missing is fine.
    pub fn remove_options(&self, session_id: &str) -> Result<(), ArtifactError> {
        let path = self.session_dir(session_id)?.join(OPTIONS_FILE);
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Remove every document of a session. Missing is fine.
    pub fn remove_session(&self, session_id: &str) -> Result<(), ArtifactError> {
        let dir = self.session_dir(session_id)?;
        match fs::remove_dir_all(dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
