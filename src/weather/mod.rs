//! Dashboard endpoints.
//!
//! [`WeatherApi`] is a thin, typed layer over a [`RequestGateway`]. Every call
//! inherits the gateway's behavior: concurrent identical lookups share one
//! exchange and transient read failures are retried. Mutations (adding or
//! removing a favorite, AI analysis) are sent exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use meteo_client::weather::WeatherApi;
//!
//! let api = WeatherApi::new(gateway);
//!
//! let current = api.current_weather("Seattle").await?;
//! let week = api.forecast("Seattle", 7).await?;
//! let matches = api.search_locations("Spring").await;
//! ```

mod models;

pub use models::{Favorite, Location};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::clients::{ClassifiedError, HttpMethod, RequestGateway, RequestOptions};
use models::ListEnvelope;

/// Per-attempt timeout for AI analysis, which runs far longer than a lookup.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Typed client for the dashboard backend.
#[derive(Clone, Debug)]
pub struct WeatherApi {
    gateway: RequestGateway,
}

impl WeatherApi {
    /// Wraps a gateway.
    #[must_use]
    pub const fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Returns the underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// Fetches current conditions for `location`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn current_weather(&self, location: &str) -> Result<Value, ClassifiedError> {
        self.fetch(&format!("/weather/current/{}", segment(location)), &[])
            .await
    }

    /// Fetches a daily forecast for `location`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn forecast(&self, location: &str, days: u32) -> Result<Value, ClassifiedError> {
        self.fetch(
            &format!("/weather/forecast/{}", segment(location)),
            &[("days", days.to_string())],
        )
        .await
    }

    /// Fetches an hourly forecast for `location`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn hourly_forecast(
        &self,
        location: &str,
        hours: u32,
    ) -> Result<Value, ClassifiedError> {
        self.fetch(
            &format!("/weather/hourly/{}", segment(location)),
            &[("hours", hours.to_string())],
        )
        .await
    }

    /// Fetches climate normals for `location`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn climate_normals(&self, location: &str) -> Result<Value, ClassifiedError> {
        self.fetch(&format!("/climate/normals/{}", segment(location)), &[])
            .await
    }

    /// Searches locations by name.
    ///
    /// Never fails: any error is logged and yields an empty list, so a search
    /// box can keep working while the backend is degraded.
    pub async fn search_locations(&self, query: &str) -> Vec<Location> {
        match self
            .fetch_list::<Location>("/locations/search", &[("q", query.to_string())])
            .await
        {
            Ok(locations) => locations,
            Err(e) => {
                tracing::warn!(query, status = e.status(), "Location search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Lists stored locations, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the body
    /// is not a list of locations.
    pub async fn locations(&self, page: u32, limit: u32) -> Result<Vec<Location>, ClassifiedError> {
        self.fetch_list(
            "/locations",
            &[("page", page.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Resolves a free-form address to candidate locations.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the body
    /// is not a list of locations.
    pub async fn geocode(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<Location>, ClassifiedError> {
        self.fetch_list(
            "/locations/geocode",
            &[
                ("address", address.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Resolves coordinates to the nearest known location.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the body
    /// is not a location.
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Location, ClassifiedError> {
        self.fetch_typed(
            "/locations/reverse",
            &[("lat", lat.to_string()), ("lon", lon.to_string())],
        )
        .await
    }

    /// Lists frequently requested locations.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the body
    /// is not a list of locations.
    pub async fn popular_locations(&self) -> Result<Vec<Location>, ClassifiedError> {
        self.fetch_list("/locations/popular", &[]).await
    }

    /// Lists the signed-in user's favorites.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the body
    /// is not a list of favorites.
    pub async fn favorites(&self) -> Result<Vec<Favorite>, ClassifiedError> {
        self.fetch_list("/favorites", &[]).await
    }

    /// Saves `name` as a favorite.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`], or `Malformed` if the
    /// created record cannot be decoded.
    pub async fn add_favorite(&self, name: &str) -> Result<Favorite, ClassifiedError> {
        let options = RequestOptions {
            method: HttpMethod::Post,
            body: Some(json!({ "name": name })),
            ..RequestOptions::default()
        };
        self.gateway.request_json("/favorites", options).await
    }

    /// Removes the favorite with `id`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn remove_favorite(&self, id: u64) -> Result<(), ClassifiedError> {
        self.gateway.delete(&format!("/favorites/{id}")).await?;
        Ok(())
    }

    /// Asks the backend's AI service to analyze conditions at `location`.
    ///
    /// Sent once with a longer per-attempt timeout ([`ANALYZE_TIMEOUT`]).
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn analyze_weather(
        &self,
        location: &str,
        prompt: &str,
    ) -> Result<Value, ClassifiedError> {
        let options = RequestOptions {
            method: HttpMethod::Post,
            body: Some(json!({ "location": location, "prompt": prompt })),
            timeout: Some(ANALYZE_TIMEOUT),
            ..RequestOptions::default()
        };
        Ok(self.gateway.request("/ai/analyze", options).await?.into_json())
    }

    /// Probes backend liveness. Unauthenticated and never retried.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ClassifiedError`].
    pub async fn health(&self) -> Result<Value, ClassifiedError> {
        let options = RequestOptions {
            skip_auth: true,
            skip_retry: true,
            ..RequestOptions::default()
        };
        Ok(self.gateway.request("/health", options).await?.into_json())
    }

    async fn fetch(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ClassifiedError> {
        Ok(self
            .gateway
            .request(endpoint, read_options(query))
            .await?
            .into_json())
    }

    async fn fetch_typed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClassifiedError> {
        self.gateway
            .request_json(endpoint, read_options(query))
            .await
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ClassifiedError> {
        self.fetch_typed::<ListEnvelope<T>>(endpoint, query)
            .await
            .map(ListEnvelope::into_vec)
    }
}

fn read_options(query: &[(&str, String)]) -> RequestOptions {
    RequestOptions {
        query: query
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect(),
        ..RequestOptions::default()
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value.trim()).into_owned()
}
