use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::models::request::Coordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: Coordinates,
}

/// One entry of a Places Nearby Search response, as Google returns it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPlace {
    pub place_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(rename = "place_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "vicinity")]
    pub address: String,
    pub rating: f64,
    pub types: BTreeSet<String>,
    /// Keyword whose search first surfaced this place.
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl Place {
    pub fn from_raw(raw: RawPlace, keyword: &str) -> Self {
        Self {
            id: raw.place_id,
            name: raw.name,
            address: raw.vicinity.unwrap_or_default(),
            rating: raw.rating.unwrap_or(0.0),
            types: raw.types.into_iter().collect(),
            tag: keyword.to_string(),
            geometry: raw.geometry,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.geometry.as_ref().map(|g| g.location)
    }
}

/// Deduplicated set of places gathered across keyword searches.
///
/// Places keep the order in which they were first seen; later sightings of the
/// same `place_id` are ignored, so the first keyword wins the tag.
#[derive(Debug, Clone, Default)]
pub struct CandidatePlaceSet {
    places: Vec<Place>,
    seen: HashSet<String>,
}

impl CandidatePlaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a place with the same id is already present.
    pub fn insert(&mut self, place: Place) -> bool {
        if !self.seen.insert(place.id.clone()) {
            return false;
        }
        self.places.push(place);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Place> {
        self.places.iter()
    }

    pub fn as_slice(&self) -> &[Place] {
        &self.places
    }
}

impl FromIterator<Place> for CandidatePlaceSet {
    fn from_iter<I: IntoIterator<Item = Place>>(iter: I) -> Self {
        let mut set = CandidatePlaceSet::new();
        for place in iter {
            set.insert(place);
        }
        set
    }
}

/// Candidate-place document (`data.json`), shared with the web layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePlaceDocument {
    pub html_attributions: Vec<String>,
    pub results: Vec<Place>,
    pub status: String,
}

impl CandidatePlaceDocument {
    pub fn from_set(set: &CandidatePlaceSet, html_attributions: Vec<String>) -> Self {
        Self {
            html_attributions,
            results: set.as_slice().to_vec(),
            status: if set.is_empty() { "ZERO_RESULTS" } else { "OK" }.to_string(),
        }
    }

    pub fn into_set(self) -> CandidatePlaceSet {
        self.results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str, name: &str, tag: &str) -> Place {
        Place {
            id: id.to_string(),
            name: name.to_string(),
            address: String::new(),
            rating: 0.0,
            types: BTreeSet::new(),
            tag: tag.to_string(),
            geometry: None,
        }
    }

    #[test]
    fn test_first_insert_wins() {
        let mut set = CandidatePlaceSet::new();
        assert!(set.insert(place("a", "Alpha", "咖啡")));
        assert!(!set.insert(place("a", "Alpha", "甜點")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a").unwrap().tag, "咖啡");
    }

    #[test]
    fn test_raw_place_defaults() {
        let raw: RawPlace = serde_json::from_value(serde_json::json!({
            "place_id": "xyz",
            "name": "老街咖啡"
        }))
        .unwrap();
        let p = Place::from_raw(raw, "咖啡廳");
        assert_eq!(p.rating, 0.0);
        assert_eq!(p.address, "");
        assert!(p.coordinates().is_none());
        assert_eq!(p.tag, "咖啡廳");
    }

    #[test]
    fn test_document_round_keeps_order_and_google_field_names() {
        let set: CandidatePlaceSet = vec![place("b", "Beta", "k1"), place("a", "Alpha", "k2")]
            .into_iter()
            .collect();
        let doc = CandidatePlaceDocument::from_set(&set, vec![]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["results"][0]["place_id"], "b");
        assert!(json["results"][0].get("vicinity").is_some());

        let back = doc.into_set();
        let ids: Vec<_> = back.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
