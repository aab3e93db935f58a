//! Resolution of model-written place names back to candidate places.

use std::str::FromStr;

use crate::models::place::{CandidatePlaceSet, Place};

/// Minimum normalized similarity for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.6;

pub trait PlaceResolver: Send + Sync {
    fn resolve<'a>(&self, name: &str, candidates: &'a CandidatePlaceSet) -> Option<&'a Place>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    Substring,
    Layered,
}

impl FromStr for ResolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(ResolverKind::Substring),
            "layered" => Ok(ResolverKind::Layered),
            other => Err(format!("unknown resolver: {}", other)),
        }
    }
}

impl ResolverKind {
    pub fn build(self) -> Box<dyn PlaceResolver> {
        match self {
            ResolverKind::Substring => Box::new(SubstringResolver),
            ResolverKind::Layered => Box::new(LayeredResolver::default()),
        }
    }
}

fn substring_match(name: &str, place: &Place) -> bool {
    !place.name.is_empty() && (name.contains(place.name.as_str()) || place.name.contains(name))
}

/// First candidate whose name contains, or is contained in, the parsed name.
/// Case-sensitive. An empty name never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringResolver;

impl PlaceResolver for SubstringResolver {
    fn resolve<'a>(&self, name: &str, candidates: &'a CandidatePlaceSet) -> Option<&'a Place> {
        if name.is_empty() {
            return None;
        }
        candidates.iter().find(|place| substring_match(name, place))
    }
}

/// Exact match first, then substring, then closest edit distance above a
/// similarity threshold.
#[derive(Debug, Clone, Copy)]
pub struct LayeredResolver {
    pub fuzzy_threshold: f64,
}

impl Default for LayeredResolver {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl PlaceResolver for LayeredResolver {
    fn resolve<'a>(&self, name: &str, candidates: &'a CandidatePlaceSet) -> Option<&'a Place> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(exact) = candidates.iter().find(|p| p.name == name) {
            return Some(exact);
        }
        if let Some(partial) = SubstringResolver.resolve(name, candidates) {
            return Some(partial);
        }

        // Strictly-greater comparison keeps the earliest candidate on ties.
        let mut best: Option<(&Place, f64)> = None;
        for place in candidates.iter().filter(|p| !p.name.is_empty()) {
            let score = similarity(name, &place.name);
            if score >= self.fuzzy_threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((place, score));
            }
        }
        best.map(|(place, _)| place)
    }
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// 1.0 for identical strings, 0.0 for completely different ones.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}
