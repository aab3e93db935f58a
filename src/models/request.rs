use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const DEFAULT_RADIUS_METERS: u32 = 1000;
// Google Nearby Search rejects anything above 50 km
const MAX_RADIUS_METERS: u32 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn zero() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }
}

/// Request document as written by the web layer (`request.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDocument {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub companion: String,
    #[serde(default)]
    pub category_selection: String,
    #[serde(default)]
    pub max_travel_distance: Option<String>,
    #[serde(default)]
    pub time_slot: String,
    pub coordinates: Coordinates,
}

/// Everything one recommendation round needs to know about the user.
///
/// Built once from a [`RequestDocument`] and only ever borrowed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub origin: Coordinates,
    pub need: String,
    pub companion: String,
    pub category: String,
    pub max_travel_distance: String,
    pub radius_meters: u32,
    pub time_slot: String,
}

impl RequestContext {
    pub fn from_document(doc: &RequestDocument) -> Self {
        let label = doc
            .max_travel_distance
            .clone()
            .unwrap_or_else(|| "1 km".to_string());
        let radius_meters = parse_radius_meters(&label);

        Self {
            origin: doc.coordinates,
            need: doc.prompt.trim().to_string(),
            companion: doc.companion.trim().to_string(),
            category: doc.category_selection.trim().to_string(),
            max_travel_distance: label,
            radius_meters,
            time_slot: doc.time_slot.clone(),
        }
    }

    pub fn to_document(&self) -> RequestDocument {
        RequestDocument {
            prompt: self.need.clone(),
            companion: self.companion.clone(),
            category_selection: self.category.clone(),
            max_travel_distance: Some(self.max_travel_distance.clone()),
            time_slot: self.time_slot.clone(),
            coordinates: self.origin,
        }
    }
}

fn distance_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(km|公里|m|公尺)?").expect("valid distance regex")
    })
}

/// Turn a label such as `"1 km"`, `"800m"` or `"1.5公里"` into a search radius.
///
/// A bare number is read as kilometers. Anything unreadable falls back to 1 km.
pub fn parse_radius_meters(label: &str) -> u32 {
    let Some(caps) = distance_pattern().captures(label) else {
        return DEFAULT_RADIUS_METERS;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return DEFAULT_RADIUS_METERS;
    };

    let meters = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit == "m" || unit == "公尺" => value,
        _ => value * 1000.0,
    };

    if meters <= 0.0 {
        return DEFAULT_RADIUS_METERS;
    }
    (meters.round() as u32).min(MAX_RADIUS_METERS)
}
