//! Forward geocoding and the shipping map shown on a listing page.

#![allow(async_fn_in_trait)]

use serde::Deserialize;
use tracing::debug;

use crate::config::MarketConfig;
use crate::errors::Error;
use crate::types::LatLng;

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Centre of the contiguous United States.
pub const DEFAULT_CENTER: LatLng = LatLng::new(39.8283, -98.5795);
pub const ZOOM_LOCATED: u8 = 12;
pub const ZOOM_OVERVIEW: u8 = 4;

pub trait Geocoder {
    /// Coordinates for a free-text address, `None` when nothing matched.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>, Error>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeMatch {
    pub formatted_address: String,
    pub position: LatLng,
}

// ==================== HTTP ====================

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

/// Parses a Google Geocoding API JSON body.
pub fn parse_geocode_response(body: &str) -> Result<Option<GeocodeMatch>, Error> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| Error::Geocode(e.to_string()))?;
    match response.status.as_str() {
        "OK" => Ok(response.results.into_iter().next().map(|r| GeocodeMatch {
            formatted_address: r.formatted_address,
            position: r.geometry.location,
        })),
        "ZERO_RESULTS" => Ok(None),
        other => Err(Error::Geocode(match response.error_message {
            Some(msg) => format!("{}: {}", other, msg),
            None => other.to_string(),
        })),
    }
}

pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(GOOGLE_GEOCODE_URL, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Client for the configured Maps key. `None` without a usable key.
    pub fn from_config(config: &MarketConfig) -> Option<Self> {
        config
            .maps_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }
}

impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>, Error> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let found = parse_geocode_response(&body)?;
        debug!(address, found = found.is_some(), "geocoded");
        Ok(found)
    }
}

// ==================== Static ====================

/// Fixed lookup table matched by substring. Used offline and in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticGeocoder {
    entries: Vec<(String, LatLng)>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Knows Mountain View only.
    pub fn with_defaults() -> Self {
        Self::new().with_entry("Mountain View", LatLng::new(37.4221, -122.0841))
    }

    pub fn with_entry(mut self, needle: impl Into<String>, position: LatLng) -> Self {
        self.entries.push((needle.into(), position));
        self
    }
}

impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>, Error> {
        Ok(self
            .entries
            .iter()
            .find(|(needle, _)| address.contains(needle.as_str()))
            .map(|(_, position)| GeocodeMatch {
                formatted_address: address.to_string(),
                position: *position,
            }))
    }
}

// ==================== Map view ====================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Seller,
    Buyer,
}

impl MarkerKind {
    pub fn label(&self) -> &'static str {
        match self {
            MarkerKind::Seller => "Seller",
            MarkerKind::Buyer => "You",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: LatLng,
}

/// Seller and buyer positions for the shipping section of a listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShippingMap {
    pub seller: Option<LatLng>,
    pub buyer: Option<GeocodeMatch>,
}

impl ShippingMap {
    pub fn new(seller: Option<LatLng>) -> Self {
        Self { seller, buyer: None }
    }

    /// Geocodes the buyer's shipping address. Leaves the map unchanged
    /// when nothing matched.
    pub async fn set_buyer_address<G: Geocoder>(
        &mut self,
        geocoder: &G,
        address: &str,
    ) -> Result<Option<LatLng>, Error> {
        let found = geocoder.geocode(address).await?;
        let position = found.as_ref().map(|m| m.position);
        if found.is_some() {
            self.buyer = found;
        }
        Ok(position)
    }

    pub fn center(&self) -> LatLng {
        self.buyer
            .as_ref()
            .map(|b| b.position)
            .or(self.seller)
            .unwrap_or(DEFAULT_CENTER)
    }

    pub fn zoom(&self) -> u8 {
        if self.buyer.is_some() || self.seller.is_some() {
            ZOOM_LOCATED
        } else {
            ZOOM_OVERVIEW
        }
    }

    pub fn markers(&self) -> Vec<Marker> {
        let seller = self.seller.map(|position| Marker {
            kind: MarkerKind::Seller,
            position,
        });
        let buyer = self.buyer.as_ref().map(|b| Marker {
            kind: MarkerKind::Buyer,
            position: b.position,
        });
        seller.into_iter().chain(buyer).collect()
    }
}
