//! Typed payloads returned by the dashboard backend.
//!
//! Weather payloads themselves are left as JSON; their shape depends on the
//! upstream provider. Location and favorite records are stable enough to type.

use serde::{Deserialize, Serialize};

/// A place that weather can be looked up for.
///
/// Coordinates are accepted both as `latitude`/`longitude` and as the short
/// `lat`/`lon` forms.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Location {
    /// Backend identifier, when the location is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Display name (e.g. "Seattle").
    pub name: String,

    /// Latitude in decimal degrees.
    #[serde(alias = "lat")]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,

    /// Country name or ISO code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// State, province or region.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "state")]
    pub region: Option<String>,
}

/// A location the signed-in user saved.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Favorite {
    /// Backend identifier, used to remove the favorite.
    pub id: u64,

    /// The saved location name.
    pub name: String,

    /// Full location record, when the backend embeds it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Wire shape for lists that may come bare or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Locations { locations: Vec<T> },
    Favorites { favorites: Vec<T> },
    Results { results: Vec<T> },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items)
            | Self::Locations { locations: items }
            | Self::Favorites { favorites: items }
            | Self::Results { results: items } => items,
        }
    }
}
