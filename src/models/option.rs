use serde::{Deserialize, Serialize};

/// One recommended destination, as written to `options.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedOption {
    pub place_name: String,
    pub category: String,
    pub time_range: String,
    pub rating: f64,
    pub tags: Vec<String>,
    pub ai_reason: String,
    pub distance_info: String,
    pub lat: f64,
    pub lng: f64,
    /// `false` when the name matched no candidate place and the coordinates
    /// are the (0, 0) placeholder.
    pub resolved: bool,
}
