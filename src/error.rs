//! Error type shared by every stage of the extraction pipeline.
//!
//! Input errors (`InvalidCoordinate`, `InvalidSide`, `UnsupportedArea`,
//! `Config`) are raised before any network traffic and never retried.
//! Upstream errors are retried inside the Overpass client and only reach the
//! caller wrapped in `FetchExhausted` once the retry budget is spent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoiError {
    #[error("invalid coordinate ({lat}, {lon}): {reason}")]
    InvalidCoordinate {
        lat: f64,
        lon: f64,
        reason: &'static str,
    },

    #[error("invalid square side {0} m: expected a positive, finite length")]
    InvalidSide(f64),

    /// The square cannot be represented inside a single UTM zone.
    #[error("unsupported area around ({lat}, {lon}): {reason}")]
    UnsupportedArea {
        lat: f64,
        lon: f64,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("overpass fetch failed after {attempts} attempts: {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: Box<PoiError>,
    },

    /// The upstream answered, but the payload is truncated or missing data.
    #[error("incomplete overpass response: {0}")]
    IncompleteResponse(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no geocoding match for {0:?}")]
    GeocodeNotFound(String),
}

impl PoiError {
    /// Whether a single fetch attempt failing with this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            PoiError::Transport(_) | PoiError::IncompleteResponse(_) | PoiError::Json(_) => true,
            PoiError::HttpStatus { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

pub type Result<T, E = PoiError> = std::result::Result<T, E>;
