//! Runs one nearby search per keyword and folds the hits into a
//! [`CandidatePlaceSet`].
//!
//! Searches run strictly one after another with a fixed cool-down between
//! calls. A keyword whose search fails contributes nothing; it is never retried.

use log::{info, warn};
use std::time::Duration;

use crate::models::{
    place::{CandidatePlaceSet, Place},
    request::Coordinates,
};
use crate::services::places_service::{PlaceSearch, SearchOutcome};

#[derive(Debug, Default)]
pub struct AggregationResult {
    pub candidates: CandidatePlaceSet,
    pub html_attributions: Vec<String>,
    /// Keywords whose search errored out.
    pub failed_keywords: Vec<String>,
}

pub struct PlaceAggregator<'a> {
    search: &'a dyn PlaceSearch,
    cooldown: Duration,
}

impl<'a> PlaceAggregator<'a> {
    pub fn new(search: &'a dyn PlaceSearch, cooldown: Duration) -> Self {
        Self { search, cooldown }
    }

    pub async fn aggregate(
        &self,
        origin: Coordinates,
        keywords: &[String],
        radius_meters: u32,
    ) -> AggregationResult {
        let mut result = AggregationResult::default();

        for (i, keyword) in keywords.iter().enumerate() {
            if i > 0 && !self.cooldown.is_zero() {
                tokio::time::sleep(self.cooldown).await;
            }

            info!("Searching nearby places for '{}'", keyword);
            match self.search.search(origin, keyword, radius_meters).await {
                Ok(SearchOutcome::Found {
                    places,
                    html_attributions,
                }) => {
                    let found = places.len();
                    let mut added = 0;
                    for raw in places {
                        if result.candidates.insert(Place::from_raw(raw, keyword)) {
                            added += 1;
                        }
                    }
                    info!("'{}': {} places, {} new", keyword, found, added);
                    for attribution in html_attributions {
                        if !result.html_attributions.contains(&attribution) {
                            result.html_attributions.push(attribution);
                        }
                    }
                }
                Ok(SearchOutcome::NoResults) => {
                    info!("'{}': no places found", keyword);
                }
                Err(e) => {
                    warn!("Search for '{}' failed, skipping keyword: {}", keyword, e);
                    result.failed_keywords.push(keyword.clone());
                }
            }
        }

        info!(
            "Aggregated {} candidate places from {} keywords",
            result.candidates.len(),
            keywords.len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::place::RawPlace;
    use crate::services::places_service::PlacesError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    fn raw(id: &str, name: &str) -> RawPlace {
        RawPlace {
            place_id: id.to_string(),
            name: name.to_string(),
            vicinity: None,
            rating: None,
            types: vec!["cafe".to_string()],
            geometry: None,
        }
    }

    /// Keyword → ids; keywords not in the map fail with a transport-style error.
    struct ScriptedSearch {
        script: HashMap<&'static str, Vec<RawPlace>>,
        attributions: Vec<String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedSearch {
        fn new(script: HashMap<&'static str, Vec<RawPlace>>) -> Self {
            Self {
                script,
                attributions: vec![],
                calls: Mutex::new(vec![]),
            }
        }

        fn called(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl PlaceSearch for ScriptedSearch {
        async fn search(
            &self,
            _origin: Coordinates,
            keyword: &str,
            _radius_meters: u32,
        ) -> Result<SearchOutcome, PlacesError> {
            self.calls
                .lock()
                .unwrap()
                .push((keyword.to_string(), Instant::now()));
            match self.script.get(keyword) {
                Some(places) if places.is_empty() => Ok(SearchOutcome::NoResults),
                Some(places) => Ok(SearchOutcome::Found {
                    places: places.clone(),
                    html_attributions: self.attributions.clone(),
                }),
                None => Err(PlacesError::ApiStatus {
                    status: "OVER_QUERY_LIMIT".to_string(),
                    message: None,
                }),
            }
        }
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[actix_rt::test]
    async fn test_failed_keyword_does_not_abort_others() {
        let search = ScriptedSearch::new(HashMap::from([
            ("咖啡", vec![raw("a", "A"), raw("b", "B")]),
            ("甜點", vec![raw("c", "C")]),
        ]));
        let aggregator = PlaceAggregator::new(&search, Duration::ZERO);
        let result = aggregator
            .aggregate(Coordinates::zero(), &keywords(&["咖啡", "壞掉", "甜點"]), 800)
            .await;

        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.failed_keywords, vec!["壞掉"]);
        assert_eq!(search.called(), vec!["咖啡", "壞掉", "甜點"]);
    }

    #[actix_rt::test]
    async fn test_overlap_is_deduplicated_and_first_tag_wins() {
        let search = ScriptedSearch::new(HashMap::from([
            ("咖啡", vec![raw("a", "A"), raw("b", "B")]),
            ("甜點", vec![raw("b", "B"), raw("c", "C")]),
            ("書店", vec![]),
        ]));
        let aggregator = PlaceAggregator::new(&search, Duration::ZERO);
        let result = aggregator
            .aggregate(Coordinates::zero(), &keywords(&["咖啡", "甜點", "書店", "咖啡"]), 800)
            .await;

        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.candidates.get("b").unwrap().tag, "咖啡");
        assert_eq!(result.candidates.get("c").unwrap().tag, "甜點");
        assert!(result.failed_keywords.is_empty());
    }

    #[actix_rt::test]
    async fn test_no_keywords_means_no_calls() {
        let search = ScriptedSearch::new(HashMap::new());
        let result = PlaceAggregator::new(&search, Duration::from_secs(5))
            .aggregate(Coordinates::zero(), &[], 800)
            .await;
        assert!(result.candidates.is_empty());
        assert!(search.called().is_empty());
    }

    #[actix_rt::test]
    async fn test_cooldown_only_between_searches() {
        let cooldown = Duration::from_millis(100);
        let search = ScriptedSearch::new(HashMap::from([
            ("咖啡", vec![raw("a", "A")]),
            ("甜點", vec![raw("b", "B")]),
            ("書店", vec![raw("c", "C")]),
        ]));

        let start = Instant::now();
        let result = PlaceAggregator::new(&search, cooldown)
            .aggregate(Coordinates::zero(), &keywords(&["咖啡", "甜點", "書店"]), 800)
            .await;
        let end = Instant::now();

        assert_eq!(result.candidates.len(), 3);
        let times = search.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[0] - start < cooldown, "waited before the first search");
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown, "searches closer than the cool-down");
        }
        assert!(end - times[2] < cooldown, "waited after the last search");
    }

    #[actix_rt::test]
    async fn test_attributions_are_kept_once() {
        let mut search = ScriptedSearch::new(HashMap::from([
            ("咖啡", vec![raw("a", "A")]),
            ("甜點", vec![raw("b", "B")]),
        ]));
        search.attributions = vec!["Listings by Google".to_string()];

        let result = PlaceAggregator::new(&search, Duration::ZERO)
            .aggregate(Coordinates::zero(), &keywords(&["咖啡", "甜點"]), 800)
            .await;

        assert_eq!(result.html_attributions, vec!["Listings by Google"]);
    }
}
