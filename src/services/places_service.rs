//! Google Places integration: Nearby Search for candidate places and the
//! Geocoding API for turning an address into an origin.
//!
//! ## Setup
//! 1. Enable the Places API and the Geocoding API in Google Cloud Console
//! 2. Set `GOOGLE_MAPS_API_KEY`
//!
//! Results are requested in Traditional Chinese (`zh-TW`) and nearby searches
//! only return places that are open right now.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::{fmt, time::Duration};
use url::Url;

use crate::models::{
    place::{Geometry, RawPlace},
    request::Coordinates,
};

const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const LANGUAGE: &str = "zh-TW";

#[derive(Debug)]
pub enum PlacesError {
    HttpError(reqwest::Error),
    UrlError(url::ParseError),
    /// Google answered, but with a status other than `OK` / `ZERO_RESULTS`.
    ApiStatus { status: String, message: Option<String> },
}

impl fmt::Display for PlacesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacesError::HttpError(err) => write!(f, "HTTP error: {}", err),
            PlacesError::UrlError(err) => write!(f, "URL error: {}", err),
            PlacesError::ApiStatus { status, message } => match message {
                Some(msg) => write!(f, "Google Places API error: {} ({})", status, msg),
                None => write!(f, "Google Places API error: {}", status),
            },
        }
    }
}

impl std::error::Error for PlacesError {}

impl From<reqwest::Error> for PlacesError {
    fn from(err: reqwest::Error) -> Self {
        PlacesError::HttpError(err)
    }
}

impl From<url::ParseError> for PlacesError {
    fn from(err: url::ParseError) -> Self {
        PlacesError::UrlError(err)
    }
}

/// Result of one keyword search.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found {
        places: Vec<RawPlace>,
        html_attributions: Vec<String>,
    },
    NoResults,
}

impl SearchOutcome {
    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::Found { places, .. } => places.len(),
            SearchOutcome::NoResults => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(
        &self,
        origin: Coordinates,
        keyword: &str,
        radius_meters: u32,
    ) -> Result<SearchOutcome, PlacesError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, PlacesError>;
}

#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<RawPlace>,
    #[serde(default)]
    html_attributions: Vec<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Clone)]
pub struct GooglePlacesService {
    http_client: Client,
    api_key: String,
}

impl GooglePlacesService {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, PlacesError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key: api_key.to_string(),
        })
    }

    fn nearby_url(
        &self,
        origin: Coordinates,
        keyword: &str,
        radius_meters: u32,
    ) -> Result<Url, PlacesError> {
        let location = format!("{},{}", origin.lat, origin.lng);
        let radius = radius_meters.to_string();
        let url = Url::parse_with_params(
            NEARBY_SEARCH_URL,
            &[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("keyword", keyword),
                ("key", self.api_key.as_str()),
                ("language", LANGUAGE),
                ("opennow", "true"),
            ],
        )?;
        Ok(url)
    }
}

fn nearby_outcome(response: NearbySearchResponse) -> Result<SearchOutcome, PlacesError> {
    match response.status.as_str() {
        "OK" => Ok(SearchOutcome::Found {
            places: response.results,
            html_attributions: response.html_attributions,
        }),
        "ZERO_RESULTS" => Ok(SearchOutcome::NoResults),
        _ => Err(PlacesError::ApiStatus {
            status: response.status,
            message: response.error_message,
        }),
    }
}

fn geocode_outcome(response: GeocodeResponse) -> Result<Option<Coordinates>, PlacesError> {
    match response.status.as_str() {
        "OK" => Ok(response.results.first().map(|r| r.geometry.location)),
        "ZERO_RESULTS" => Ok(None),
        _ => Err(PlacesError::ApiStatus {
            status: response.status,
            message: response.error_message,
        }),
    }
}

#[async_trait]
impl PlaceSearch for GooglePlacesService {
    async fn search(
        &self,
        origin: Coordinates,
        keyword: &str,
        radius_meters: u32,
    ) -> Result<SearchOutcome, PlacesError> {
        let url = self.nearby_url(origin, keyword, radius_meters)?;
        debug!(
            "Nearby search for '{}' around ({:.4}, {:.4}) within {} m",
            keyword, origin.lat, origin.lng, radius_meters
        );

        let response: NearbySearchResponse =
            self.http_client.get(url).send().await?.json().await?;
        nearby_outcome(response)
    }
}

#[async_trait]
impl Geocoder for GooglePlacesService {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, PlacesError> {
        if address.trim().is_empty() {
            return Ok(None);
        }

        let url = Url::parse_with_params(
            GEOCODE_URL,
            &[
                ("address", address),
                ("key", self.api_key.as_str()),
                ("language", LANGUAGE),
            ],
        )?;

        let response: GeocodeResponse = self.http_client.get(url).send().await?.json().await?;
        let location = geocode_outcome(response)?;
        if let Some(coords) = location {
            info!("Geocoded '{}' to ({}, {})", address, coords.lat, coords.lng);
        }
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_url_carries_search_constraints() {
        let service = GooglePlacesService::new("k3y", Duration::from_secs(5)).unwrap();
        let url = service
            .nearby_url(Coordinates::new(22.9973, 120.2125), "咖啡 廳", 800)
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("radius".to_string(), "800".to_string())));
        assert!(pairs.contains(&("opennow".to_string(), "true".to_string())));
        assert!(pairs.contains(&("keyword".to_string(), "咖啡 廳".to_string())));
        assert!(pairs.contains(&("location".to_string(), "22.9973,120.2125".to_string())));
        assert!(pairs.contains(&("language".to_string(), "zh-TW".to_string())));
    }

    #[test]
    fn test_statuses_are_distinguished() {
        let ok: NearbySearchResponse = serde_json::from_value(serde_json::json!({
            "status": "OK",
            "html_attributions": [],
            "results": [{ "place_id": "p1", "name": "老屋咖啡", "rating": 4.5 }]
        }))
        .unwrap();
        assert_eq!(nearby_outcome(ok).unwrap().len(), 1);

        let empty: NearbySearchResponse =
            serde_json::from_value(serde_json::json!({ "status": "ZERO_RESULTS" })).unwrap();
        assert!(matches!(nearby_outcome(empty), Ok(SearchOutcome::NoResults)));

        let denied: NearbySearchResponse = serde_json::from_value(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        }))
        .unwrap();
        assert!(matches!(
            nearby_outcome(denied),
            Err(PlacesError::ApiStatus { ref status, .. }) if status == "REQUEST_DENIED"
        ));
    }

    #[test]
    fn test_geocode_takes_first_result() {
        let response: GeocodeResponse = serde_json::from_value(serde_json::json!({
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 22.997, "lng": 120.212 } } },
                { "geometry": { "location": { "lat": 1.0, "lng": 2.0 } } }
            ]
        }))
        .unwrap();
        assert_eq!(
            geocode_outcome(response).unwrap(),
            Some(Coordinates::new(22.997, 120.212))
        );
    }
}
