use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, info, warn};
use ureq::Agent;

use crate::error::{PoiError, Result};
use crate::settings::DEFAULT_USER_AGENT;
use crate::types::GeoPoint;

// https://nominatim.openstreetmap.org/search?q=Cambridge&format=json&limit=1

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(15);
const CACHE_FILE_NAME: &str = "geocode.json";

//------------------------------------------------------------------------------
// Geocoders
//------------------------------------------------------------------------------

/// Resolves a free-form address to a single point.
pub trait Geocoder {
    /// `Ok(None)` when the service answered but found nothing.
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>>;
}

/// Like [`Geocoder::geocode`], but no match is an error.
pub fn resolve_address<G: Geocoder + ?Sized>(geocoder: &mut G, address: &str) -> Result<GeoPoint> {
    let point = geocoder
        .geocode(address)?
        .ok_or_else(|| PoiError::GeocodeNotFound(address.to_string()))?;
    point.validate()?;
    Ok(point)
}

pub struct NominatimGeocoder {
    url: String,
    agent: Agent,
    user_agent: String,
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        NominatimGeocoder::new(DEFAULT_NOMINATIM_URL)
    }
}

impl NominatimGeocoder {
    pub fn new(url: &str) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(GEOCODE_TIMEOUT))
            .http_status_as_error(false)
            .build();
        NominatimGeocoder {
            url: url.to_string(),
            agent: config.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>> {
        let mut response = self
            .agent
            .get(&self.url)
            .query("q", address)
            .query("format", "json")
            .query("limit", "1")
            .header("User-Agent", self.user_agent.as_str())
            .call()?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(PoiError::HttpStatus {
                status,
                url: self.url.clone(),
            });
        }

        let body = response.body_mut().read_to_string()?;
        let places: Vec<Place> = serde_json::from_str(&body)?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };
        let point = place.to_point()?;
        debug!(address, lat = point.lat, lon = point.lon, name = ?place.display_name, "geocoded");
        Ok(Some(point))
    }
}

/// Serves answers from a [`GeocodeCache`] and only asks `inner` on a miss.
pub struct CachedGeocoder<G> {
    inner: G,
    cache: GeocodeCache,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: GeocodeCache) -> Self {
        CachedGeocoder { inner, cache }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>> {
        if let Some(point) = self.cache.lookup(address) {
            debug!(address, "geocode cache hit");
            return Ok(Some(point));
        }
        let found = self.inner.geocode(address)?;
        if let Some(point) = found {
            self.cache.insert(address, point);
            self.cache.flush()?;
        }
        Ok(found)
    }
}

//------------------------------------------------------------------------------
// Cache
//------------------------------------------------------------------------------

/// Address → `[lat, lon]` map persisted as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<String, [f64; 2]>,
    dirty: bool,
}

impl GeocodeCache {
    /// Opens the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring unreadable geocode cache");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        GeocodeCache {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        }
    }

    /// `<cache dir>/geocode.json` under the platform's per-user cache directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "poi-extract", "poiextract")
            .map(|dirs| dirs.cache_dir().join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, address: &str) -> Option<GeoPoint> {
        self.entries
            .get(address.trim())
            .map(|[lat, lon]| GeoPoint::new(*lat, *lon))
    }

    pub fn insert(&mut self, address: &str, point: GeoPoint) {
        self.entries
            .insert(address.trim().to_string(), [point.lat, point.lon]);
        self.dirty = true;
    }

    /// Writes the cache back if anything was inserted since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        info!(path = %self.path.display(), entries = self.entries.len(), "geocode cache saved");
        Ok(())
    }
}

//------------------------------------------------------------------------------
// Types
//------------------------------------------------------------------------------

/// One Nominatim search hit. Coordinates arrive as strings.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl Place {
    fn to_point(&self) -> Result<GeoPoint> {
        let parse = |raw: &str| {
            raw.trim().parse::<f64>().map_err(|err| {
                PoiError::IncompleteResponse(format!("geocoder returned coordinate {raw:?}: {err}"))
            })
        };
        Ok(GeoPoint::new(parse(&self.lat)?, parse(&self.lon)?))
    }
}
